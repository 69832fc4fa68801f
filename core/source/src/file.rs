//! Local file sources.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use driveup_common::{Error, Result, UploadContent};

use crate::{ContentSource, SourcedContent};

/// A file on local disk, uploaded under its base name.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Remote name: the base name of the path.
    pub fn file_name(&self) -> Result<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidInput(format!("{} has no file name", self.path.display()))
            })
    }
}

#[async_trait]
impl ContentSource for LocalFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<SourcedContent> {
        let name = self.file_name()?;
        let data = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                Error::NotFound(format!("Local file {} does not exist", self.path.display()))
            }
            _ => Error::Io(e),
        })?;
        debug!("Read {} bytes from {}", data.len(), self.path.display());
        Ok(SourcedContent::new(name, UploadContent::Bytes(data)))
    }
}

/// Regular `*.json` files directly inside `dir`, sorted by name.
///
/// The extension match is case-insensitive; subdirectories are not visited.
pub async fn json_files_in(dir: impl AsRef<Path>) -> Result<Vec<LocalFileSource>> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::NotFound(format!("Directory {} does not exist", dir.display())),
        _ => Error::Io(e),
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths.into_iter().map(LocalFileSource::new).collect())
}
