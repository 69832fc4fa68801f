//! In-memory Drive for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use driveup_common::{ContentHash, Error, Result};

use crate::api::{DriveApi, DriveFile, FolderMeta};
use crate::params::DriveScope;

/// Number of calls made per Drive operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_folder: usize,
    pub list: usize,
    pub create: usize,
    pub update: usize,
}

impl CallCounts {
    /// Calls that read or write files, i.e. everything except the folder lookup.
    pub fn file_calls(&self) -> usize {
        self.list + self.create + self.update
    }
}

/// Stored file entry.
#[derive(Debug, Clone)]
struct Entry {
    file: DriveFile,
    data: Vec<u8>,
    trashed: bool,
}

#[derive(Debug, Default)]
struct State {
    folders: HashMap<String, FolderMeta>,
    /// Insertion order doubles as Drive's list order.
    files: Vec<Entry>,
    calls: CallCounts,
    update_failure: Option<(u16, String)>,
}

/// In-memory Drive.
///
/// Folders are registered up front, either in My Drive or in a Shared
/// Drive. Every operation is counted so tests can assert which remote calls
/// an upsert made.
pub struct MemoryDrive {
    state: RwLock<State>,
}

impl MemoryDrive {
    /// Create an empty drive with no folders.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a folder in My Drive.
    pub fn add_folder(&self, folder_id: &str, name: &str) {
        self.insert_folder(folder_id, name, None);
    }

    /// Register a folder inside the Shared Drive `drive_id`.
    pub fn add_shared_folder(&self, folder_id: &str, name: &str, drive_id: &str) {
        self.insert_folder(folder_id, name, Some(drive_id.to_string()));
    }

    fn insert_folder(&self, folder_id: &str, name: &str, drive_id: Option<String>) {
        let meta = FolderMeta {
            id: folder_id.to_string(),
            name: Some(name.to_string()),
            drive_id,
            ..Default::default()
        };
        self.write().folders.insert(folder_id.to_string(), meta);
    }

    /// Place a file directly, bypassing call counting. Returns its ID.
    pub fn add_file(&self, folder_id: &str, name: &str, data: &[u8]) -> String {
        let id = Uuid::new_v4().to_string();
        let entry = Entry {
            file: Self::describe(&id, name, folder_id, data),
            data: data.to_vec(),
            trashed: false,
        };
        self.write().files.push(entry);
        id
    }

    /// Move a file to the trash.
    pub fn trash(&self, file_id: &str) {
        let mut state = self.write();
        if let Some(entry) = state.files.iter_mut().find(|e| e.file.id == file_id) {
            entry.trashed = true;
        }
    }

    /// Make every subsequent update fail with the given status.
    pub fn fail_updates(&self, status: u16, message: &str) {
        self.write().update_failure = Some((status, message.to_string()));
    }

    /// Current content of a file.
    pub fn content(&self, file_id: &str) -> Option<Vec<u8>> {
        self.read()
            .files
            .iter()
            .find(|e| e.file.id == file_id)
            .map(|e| e.data.clone())
    }

    /// Non-trashed files named `name` in `folder_id`.
    pub fn files_named(&self, folder_id: &str, name: &str) -> Vec<DriveFile> {
        self.read()
            .files
            .iter()
            .filter(|e| !e.trashed && e.file.name == name && e.file.parents.iter().any(|p| p == folder_id))
            .map(|e| e.file.clone())
            .collect()
    }

    /// Snapshot of call counters.
    pub fn calls(&self) -> CallCounts {
        self.read().calls
    }

    fn describe(id: &str, name: &str, folder_id: &str, data: &[u8]) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: Some(crate::api::JSON_MIME_TYPE.to_string()),
            size: Some(data.len().to_string()),
            md5_checksum: Some(ContentHash::of(data).as_str().to_string()),
            parents: vec![folder_id.to_string()],
        }
    }

    fn in_scope(state: &State, entry: &Entry, scope: &DriveScope) -> bool {
        match &scope.shared_drive_id {
            None => true,
            Some(drive_id) => entry.file.parents.iter().any(|p| {
                state
                    .folders
                    .get(p)
                    .and_then(|f| f.drive_id.as_deref())
                    == Some(drive_id.as_str())
            }),
        }
    }

    fn not_found(id: &str) -> Error {
        Error::remote(Some(404), format!("File not found: {}.", id))
    }
}

impl Default for MemoryDrive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriveApi for MemoryDrive {
    async fn get_folder(&self, folder_id: &str) -> Result<FolderMeta> {
        let mut state = self.write();
        state.calls.get_folder += 1;
        state
            .folders
            .get(folder_id)
            .cloned()
            .ok_or_else(|| Self::not_found(folder_id))
    }

    async fn find_file(
        &self,
        name: &str,
        folder_id: &str,
        scope: &DriveScope,
    ) -> Result<Option<DriveFile>> {
        let mut state = self.write();
        state.calls.list += 1;
        let found = state
            .files
            .iter()
            .filter(|e| !e.trashed)
            .filter(|e| e.file.name == name)
            .filter(|e| e.file.parents.iter().any(|p| p == folder_id))
            .find(|e| Self::in_scope(&state, e, scope))
            .map(|e| e.file.clone());
        Ok(found)
    }

    async fn list_folder(
        &self,
        folder_id: &str,
        scope: &DriveScope,
        page_size: u32,
    ) -> Result<Vec<DriveFile>> {
        let mut state = self.write();
        state.calls.list += 1;
        if !state.folders.contains_key(folder_id) {
            return Err(Self::not_found(folder_id));
        }
        let files = state
            .files
            .iter()
            .filter(|e| !e.trashed)
            .filter(|e| e.file.parents.iter().any(|p| p == folder_id))
            .filter(|e| Self::in_scope(&state, e, scope))
            .take(page_size as usize)
            .map(|e| e.file.clone())
            .collect();
        Ok(files)
    }

    async fn create_file(
        &self,
        name: &str,
        folder_id: &str,
        _mime_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let mut state = self.write();
        state.calls.create += 1;
        if !state.folders.contains_key(folder_id) {
            return Err(Self::not_found(folder_id));
        }
        let id = Uuid::new_v4().to_string();
        let file = Self::describe(&id, name, folder_id, &data);
        state.files.push(Entry {
            file: file.clone(),
            data,
            trashed: false,
        });
        Ok(file)
    }

    async fn update_file(
        &self,
        file_id: &str,
        name: &str,
        _mime_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let mut state = self.write();
        state.calls.update += 1;
        if let Some((status, message)) = &state.update_failure {
            return Err(Error::remote(Some(*status), message.clone()));
        }
        let entry = state
            .files
            .iter_mut()
            .find(|e| e.file.id == file_id)
            .ok_or_else(|| Self::not_found(file_id))?;
        let parent = entry.file.parents.first().cloned().unwrap_or_default();
        entry.file = Self::describe(file_id, name, &parent, &data);
        entry.data = data;
        Ok(entry.file.clone())
    }
}
