//! Last-known-good payloads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::warn;

use driveup_common::Result;

use crate::{ContentSource, SourcedContent};

/// A stored payload and when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub content: SourcedContent,
    pub fetched_at: DateTime<Utc>,
}

/// In-memory store of the last successfully loaded payload.
///
/// Owned by the caller and shared explicitly; nothing is global.
#[derive(Debug, Default)]
pub struct LastKnownGood {
    snapshot: Mutex<Option<Snapshot>>,
}

impl LastKnownGood {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored payload, if any.
    pub fn get(&self) -> Option<Snapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the stored payload, stamped with the current time.
    pub fn set(&self, content: SourcedContent) {
        let snapshot = Snapshot {
            content,
            fetched_at: Utc::now(),
        };
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
    }
}

/// Serves the last good payload when the wrapped source fails.
pub struct FallbackSource<S> {
    inner: S,
    store: Arc<LastKnownGood>,
}

impl<S: ContentSource> FallbackSource<S> {
    pub fn new(inner: S, store: Arc<LastKnownGood>) -> Self {
        Self { inner, store }
    }
}

#[async_trait]
impl<S: ContentSource> ContentSource for FallbackSource<S> {
    fn describe(&self) -> String {
        format!("{} (with fallback)", self.inner.describe())
    }

    async fn load(&self) -> Result<SourcedContent> {
        match self.inner.load().await {
            Ok(content) => {
                self.store.set(content.clone());
                Ok(content)
            }
            Err(e) => match self.store.get() {
                Some(snapshot) => {
                    warn!(
                        "Loading {} failed ({}), using payload from {}",
                        self.inner.describe(),
                        e,
                        snapshot.fetched_at.to_rfc3339()
                    );
                    Ok(snapshot.content)
                }
                None => Err(e),
            },
        }
    }
}
