//! Drive API seam and the metadata types it exchanges.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use driveup_common::Result;

use crate::params::DriveScope;

/// MIME type every upload is written with.
pub const JSON_MIME_TYPE: &str = "application/json";

/// Drive file metadata from API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    #[serde(default)]
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// File size in bytes, as Drive reports it (a decimal string).
    #[serde(default)]
    pub size: Option<String>,
    /// MD5 checksum of the stored content.
    #[serde(default)]
    pub md5_checksum: Option<String>,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Owner entry of a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// Folder metadata used for the Shared-Drive preflight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMeta {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Shared Drive the folder belongs to, absent in My Drive.
    #[serde(default)]
    pub drive_id: Option<String>,
    /// Legacy Team Drive field, still returned for some folders.
    #[serde(default)]
    pub team_drive_id: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub owners: Vec<Owner>,
}

impl FolderMeta {
    /// Check if the folder lives in a Shared Drive.
    pub fn is_shared_drive(&self) -> bool {
        self.drive_id.as_deref().is_some_and(|id| !id.is_empty())
            || self.team_drive_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// The four Drive v3 operations the upsert needs.
///
/// Implementations report failures as `RemoteApi` errors carrying the
/// provider status and message. They never retry.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// `files.get` on a folder (id, name, driveId, teamDriveId, parents, owners).
    async fn get_folder(&self, folder_id: &str) -> Result<FolderMeta>;

    /// `files.list` filtered by exact name, parent and non-trashed status.
    ///
    /// Returns the first match; further matches are ignored.
    async fn find_file(
        &self,
        name: &str,
        folder_id: &str,
        scope: &DriveScope,
    ) -> Result<Option<DriveFile>>;

    /// `files.list` of non-trashed children, at most `page_size` items.
    async fn list_folder(
        &self,
        folder_id: &str,
        scope: &DriveScope,
        page_size: u32,
    ) -> Result<Vec<DriveFile>>;

    /// `files.create` with metadata and media body; `folder_id` is the sole parent.
    async fn create_file(
        &self,
        name: &str,
        folder_id: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile>;

    /// `files.update` of content, re-asserting name and MIME type.
    async fn update_file(
        &self,
        file_id: &str,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile>;
}
