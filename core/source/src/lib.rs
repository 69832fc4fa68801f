//! Where upload content comes from.
//!
//! The upsert core only needs "bytes or a JSON value with a name". This
//! crate provides the usual origins for that content: a local file, every
//! JSON file in a directory, an upstream HTTP API and a raw request body,
//! plus a caller-owned last-known-good store for falling back when a live
//! fetch fails.

use async_trait::async_trait;

use driveup_common::{Result, UploadContent};

pub mod fallback;
pub mod file;
pub mod http;

pub use fallback::{FallbackSource, LastKnownGood, Snapshot};
pub use file::{json_files_in, LocalFileSource};
pub use http::{HttpJsonSource, DEFAULT_TIMEOUT};

/// Content together with the remote file name it should be stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedContent {
    pub name: String,
    pub content: UploadContent,
}

impl SourcedContent {
    pub fn new(name: impl Into<String>, content: impl Into<UploadContent>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A producer of upload content.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Produce the content once.
    async fn load(&self) -> Result<SourcedContent>;
}

#[async_trait]
impl<S: ContentSource + ?Sized> ContentSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn load(&self) -> Result<SourcedContent> {
        (**self).load().await
    }
}

/// An inbound request body.
#[derive(Debug, Clone)]
pub struct BodySource {
    name: String,
    body: Vec<u8>,
}

impl BodySource {
    pub fn new(name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
impl ContentSource for BodySource {
    fn describe(&self) -> String {
        format!("request body ({} bytes)", self.body.len())
    }

    async fn load(&self) -> Result<SourcedContent> {
        Ok(SourcedContent::new(
            self.name.clone(),
            UploadContent::Bytes(self.body.clone()),
        ))
    }
}
