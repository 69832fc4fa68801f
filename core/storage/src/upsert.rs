//! Find-or-create-then-update of a JSON file in a Drive folder.
//!
//! One upsert runs these stages, any of which may fail:
//! 1. format the content (best-effort pretty-printing)
//! 2. preflight the folder, unless an explicit file ID is given
//! 3. resolve the file by ID, or search for it by name
//! 4. create it (unless the strict policy forbids it) or update it
//!
//! Nothing is retried. Failures carry the provider status and message.

use serde::Serialize;
use tracing::{debug, info, warn};

use driveup_common::{
    AuthStrategy, ContentHash, Error, Result, UploadAction, UploadContent, UploadResult,
    UploadTarget,
};

use crate::api::{DriveApi, DriveFile, FolderMeta, JSON_MIME_TYPE};
use crate::format::format_for_upload;
use crate::gdrive::DriveHandle;
use crate::params::DriveScope;

/// Whether an upsert may create files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertPolicy {
    /// Fail with `NotFound` instead of creating a missing file.
    pub require_existing: bool,
}

impl UpsertPolicy {
    /// Never create; only update files that already exist.
    pub fn strict() -> Self {
        Self {
            require_existing: true,
        }
    }
}

/// Result of inspecting a destination folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderCheck {
    pub meta: FolderMeta,
    pub is_shared_drive: bool,
}

/// Result of a connection test.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheck {
    pub strategy: AuthStrategy,
    pub identity: String,
    pub folder: FolderCheck,
    /// At most one file from the folder, proving list access.
    pub sample: Vec<DriveFile>,
}

/// Per-item outcome of a bulk upload.
#[derive(Debug)]
pub struct BulkOutcome {
    pub file_name: String,
    pub result: Result<UploadResult>,
}

/// Performs upserts under a fixed policy.
#[derive(Debug, Clone, Default)]
pub struct DriveUpsert {
    policy: UpsertPolicy,
}

impl DriveUpsert {
    pub fn new(policy: UpsertPolicy) -> Self {
        Self { policy }
    }

    /// Fetch folder metadata and classify its location.
    pub async fn check_folder<C: DriveApi>(
        &self,
        handle: &DriveHandle<C>,
        folder_id: &str,
    ) -> Result<FolderCheck> {
        let meta = handle.client.get_folder(folder_id).await?;
        let is_shared_drive = meta.is_shared_drive();
        info!(
            "Folder {} ({}) is in {}",
            meta.name.as_deref().unwrap_or("?"),
            meta.id,
            if is_shared_drive { "a Shared Drive" } else { "My Drive" }
        );
        Ok(FolderCheck {
            meta,
            is_shared_drive,
        })
    }

    /// Shared-Drive preflight.
    ///
    /// Returns `None` without any remote call when the target names an
    /// explicit file.
    ///
    /// # Errors
    /// - `Quota` if a service account targets a folder outside a Shared Drive
    /// - `RemoteApi` if the folder cannot be fetched
    pub async fn preflight<C: DriveApi>(
        &self,
        handle: &DriveHandle<C>,
        target: &UploadTarget,
    ) -> Result<Option<FolderCheck>> {
        if target.file_id.is_some() {
            debug!("Explicit file ID set, skipping folder preflight");
            return Ok(None);
        }

        let check = self.check_folder(handle, &target.folder_id).await?;
        if handle.strategy == AuthStrategy::ServiceAccount && !check.is_shared_drive {
            return Err(Error::Quota(format!(
                "Service accounts have no storage quota in My Drive. Folder '{}' ({}) is not in a Shared Drive, so {} cannot create files there.",
                check.meta.name.as_deref().unwrap_or("?"),
                check.meta.id,
                handle.identity
            )));
        }
        Ok(Some(check))
    }

    /// Ensure `target` holds `content`, creating the file if needed.
    ///
    /// # Errors
    /// - `Quota` from the preflight
    /// - `NotFound` if no file matches and the policy forbids creation
    /// - `RemoteApi` if any Drive call fails
    pub async fn upsert<C: DriveApi>(
        &self,
        handle: &DriveHandle<C>,
        target: &UploadTarget,
        content: &UploadContent,
    ) -> Result<UploadResult> {
        self.preflight(handle, target).await?;
        self.write(handle, target, content).await
    }

    /// Upsert several named items into one folder.
    ///
    /// The folder is preflighted once and every item is keyed by name, so
    /// `target.file_id` is ignored. A failing item does not stop the rest.
    ///
    /// # Errors
    /// - Preflight errors fail the whole call
    pub async fn upsert_many<C, I>(
        &self,
        handle: &DriveHandle<C>,
        target: &UploadTarget,
        items: I,
    ) -> Result<Vec<BulkOutcome>>
    where
        C: DriveApi,
        I: IntoIterator<Item = (String, UploadContent)>,
    {
        let folder = target.clone().with_file_id(None);
        self.preflight(handle, &folder).await?;

        let mut outcomes = Vec::new();
        for (file_name, content) in items {
            let result = match folder.for_name(file_name.as_str()) {
                Ok(item) => self.write(handle, &item, &content).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!("Upload of {} failed: {}", file_name, e);
            }
            outcomes.push(BulkOutcome { file_name, result });
        }
        Ok(outcomes)
    }

    /// Preflight plus a one-item list of the folder.
    pub async fn test_connection<C: DriveApi>(
        &self,
        handle: &DriveHandle<C>,
        target: &UploadTarget,
    ) -> Result<ConnectionCheck> {
        let folder = match self.preflight(handle, target).await? {
            Some(check) => check,
            None => self.check_folder(handle, &target.folder_id).await?,
        };
        let scope = DriveScope::new(target.shared_drive_id.clone());
        let sample = handle
            .client
            .list_folder(&target.folder_id, &scope, 1)
            .await?;

        Ok(ConnectionCheck {
            strategy: handle.strategy,
            identity: handle.identity.clone(),
            folder,
            sample,
        })
    }

    /// Resolve and write, without the preflight.
    async fn write<C: DriveApi>(
        &self,
        handle: &DriveHandle<C>,
        target: &UploadTarget,
        content: &UploadContent,
    ) -> Result<UploadResult> {
        let data = format_for_upload(content);
        let content_hash = ContentHash::of(&data);
        let byte_size = data.len() as u64;

        let existing = match &target.file_id {
            Some(file_id) => Some(file_id.clone()),
            None => {
                let scope = DriveScope::new(target.shared_drive_id.clone());
                handle
                    .client
                    .find_file(&target.file_name, &target.folder_id, &scope)
                    .await?
                    .map(|file| file.id)
            }
        };

        let (action, file) = match existing {
            Some(file_id) => {
                debug!("Updating {} ({})", target.file_name, file_id);
                let mut file = handle
                    .client
                    .update_file(&file_id, &target.file_name, JSON_MIME_TYPE, data)
                    .await?;
                if file.id.is_empty() {
                    file.id = file_id;
                }
                (UploadAction::Updated, file)
            }
            None if self.policy.require_existing => {
                return Err(Error::NotFound(format!(
                    "No file named '{}' in folder {} and creating files is disabled (REQUIRE_EXISTING_FILE)",
                    target.file_name, target.folder_id
                )));
            }
            None => {
                debug!("Creating {} in {}", target.file_name, target.folder_id);
                let file = handle
                    .client
                    .create_file(&target.file_name, &target.folder_id, JSON_MIME_TYPE, data)
                    .await?;
                (UploadAction::Created, file)
            }
        };

        if let Some(checksum) = &file.md5_checksum {
            if !content_hash.matches(checksum) {
                warn!(
                    "Checksum mismatch for {}: local {}, Drive {}",
                    file.id, content_hash, checksum
                );
            }
        }

        info!(
            "{} {} ({} bytes, md5 {})",
            action, target.file_name, byte_size, content_hash
        );

        Ok(UploadResult {
            action,
            remote_file_id: file.id,
            file_name: target.file_name.clone(),
            content_hash,
            byte_size,
        })
    }
}
