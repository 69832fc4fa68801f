//! Command implementations.
//!
//! Every command resolves credentials itself, so each run (and each `watch`
//! tick) authenticates afresh.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

use driveup_common::{Error, Result, UploadResult};
use driveup_source::{
    json_files_in, ContentSource, FallbackSource, HttpJsonSource, LastKnownGood, LocalFileSource,
};
use driveup_storage::{CredentialResolver, DriveConfig, DriveHandle, DriveUpsert};

use crate::report;

/// Name used for uploads that do not come from a named file.
pub const DEFAULT_FILE_NAME: &str = "data.json";

/// How upstream JSON APIs are fetched.
#[derive(Debug, Clone, Copy)]
pub struct Upstream {
    pub follow_redirects: bool,
    pub timeout: Duration,
}

impl Upstream {
    /// Zero seconds is raised to one.
    pub fn new(follow_redirects: bool, timeout_secs: u64) -> Self {
        Self {
            follow_redirects,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    fn source(&self, url: &str, name: &str) -> Result<HttpJsonSource> {
        Ok(HttpJsonSource::new(url, name)?
            .follow_redirects(self.follow_redirects)
            .with_timeout(self.timeout))
    }
}

/// Upload one local file.
pub async fn backup(config: &DriveConfig, file: &Path) -> Result<Value> {
    let source = LocalFileSource::new(file);
    let result = upload_from(config, &source).await?;
    to_body(&result)
}

/// Upload every JSON file in `dir`.
pub async fn bulk(config: &DriveConfig, dir: &Path) -> Result<Value> {
    let target = config.target(DEFAULT_FILE_NAME)?;
    let sources = json_files_in(dir).await?;
    if sources.is_empty() {
        return Err(Error::NotFound(format!(
            "No .json files in {}",
            dir.display()
        )));
    }
    info!("Uploading {} files from {}", sources.len(), dir.display());

    let mut items = Vec::with_capacity(sources.len());
    for source in &sources {
        let loaded = source.load().await?;
        items.push((loaded.name, loaded.content));
    }

    let handle = resolve(config).await?;
    let outcomes = DriveUpsert::new(config.policy())
        .upsert_many(&handle, &target, items)
        .await?;
    Ok(report::bulk_summary(&target.folder_id, &outcomes))
}

/// Fetch upstream JSON and upload it.
pub async fn fetch(
    config: &DriveConfig,
    url: Option<&str>,
    name: &str,
    upstream: Upstream,
) -> Result<Value> {
    let source = http_source(url, name, upstream)?;
    let result = upload_from(config, &source).await?;
    to_body(&result)
}

/// Upload from `source` every `interval` until Ctrl-C.
///
/// The first run is immediate. A failed run is reported and the loop
/// continues; a failed fetch falls back to the last payload that loaded.
pub async fn watch(
    config: &DriveConfig,
    source: Box<dyn ContentSource>,
    interval: Duration,
) -> Result<Value> {
    let store = Arc::new(LastKnownGood::new());
    let source = FallbackSource::new(source, store.clone());
    let mut ticker = schedule(interval);
    let (mut runs, mut failures) = (0u64, 0u64);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Watching {} every {}s (Ctrl-C to stop)",
        source.describe(),
        interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                runs += 1;
                match upload_from(config, &source).await {
                    Ok(result) => emit(&report::success("watch", &result)),
                    Err(e) => {
                        failures += 1;
                        warn!("Scheduled upload failed: {}", e);
                        emit(&report::failure("watch", &e));
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Stopping after {} runs", runs);
                break;
            }
        }
    }

    Ok(json!({
        "runs": runs,
        "failures": failures,
        "lastSuccessAt": store.get().map(|s| s.fetched_at.to_rfc3339()),
    }))
}

/// Ticks immediately, then every `interval`. A run longer than the interval
/// postpones the next one instead of queueing catch-up runs.
fn schedule(interval: Duration) -> Interval {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Resolve credentials, preflight the folder and list one file.
pub async fn test_connection(config: &DriveConfig) -> Result<Value> {
    let target = config.target(DEFAULT_FILE_NAME)?;
    let handle = resolve(config).await?;
    let check = DriveUpsert::new(config.policy())
        .test_connection(&handle, &target)
        .await?;
    to_body(&check)
}

/// Print folder metadata and Shared-Drive status.
pub async fn folder(config: &DriveConfig, id: Option<&str>) -> Result<Value> {
    let folder_id = match id {
        Some(id) => id,
        None => config.folder_id()?,
    };
    let handle = resolve(config).await?;
    let check = DriveUpsert::new(config.policy())
        .check_folder(&handle, folder_id)
        .await?;
    to_body(&check)
}

/// Source for `watch`: a URL when given, the local file otherwise.
pub fn watch_source(
    url: Option<&str>,
    file: PathBuf,
    upstream: Upstream,
) -> Result<Box<dyn ContentSource>> {
    Ok(match url {
        Some(url) => Box::new(upstream.source(url, DEFAULT_FILE_NAME)?),
        None => Box::new(LocalFileSource::new(file)),
    })
}

fn http_source(url: Option<&str>, name: &str, upstream: Upstream) -> Result<HttpJsonSource> {
    let url = url.ok_or_else(|| {
        Error::Configuration("No source URL given (--url or SOURCE_URL)".to_string())
    })?;
    upstream.source(url, name)
}

async fn resolve(config: &DriveConfig) -> Result<DriveHandle> {
    CredentialResolver::new()?
        .resolve(&config.credentials)
        .await
}

async fn upload_from<S: ContentSource + ?Sized>(
    config: &DriveConfig,
    source: &S,
) -> Result<UploadResult> {
    // Fail on a missing folder before touching the source or the network.
    config.folder_id()?;
    let loaded = source.load().await?;
    let target = config.target(loaded.name.as_str())?;
    let handle = resolve(config).await?;
    DriveUpsert::new(config.policy())
        .upsert(&handle, &target, &loaded.content)
        .await
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))
}

/// Print one compact report line.
fn emit<T: serde::Serialize>(report: &T) {
    match serde_json::to_string(report) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to serialize report: {}", e),
    }
}
