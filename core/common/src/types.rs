//! Common types used throughout driveup.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Authentication strategy that produced a Drive handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStrategy {
    /// Signed JWT assertion from a service-account key.
    ServiceAccount,
    /// OAuth2 refresh token on behalf of a consenting user.
    #[serde(rename = "oauth2")]
    OAuth2,
}

impl AuthStrategy {
    /// Stable name used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStrategy::ServiceAccount => "service_account",
            AuthStrategy::OAuth2 => "oauth2",
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an upload should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    /// Destination folder ID.
    pub folder_id: String,
    /// Explicit destination file; bypasses the name search when set.
    #[serde(default)]
    pub file_id: Option<String>,
    /// File name to search for, and to assert on create/update.
    pub file_name: String,
    /// Shared Drive that scopes the name search.
    #[serde(default)]
    pub shared_drive_id: Option<String>,
}

impl UploadTarget {
    /// Create a target for `file_name` inside `folder_id`.
    ///
    /// # Errors
    /// - `Configuration` if the folder ID is empty
    /// - `InvalidInput` if the file name is empty
    pub fn new(folder_id: impl Into<String>, file_name: impl Into<String>) -> crate::Result<Self> {
        let folder_id = folder_id.into();
        let file_name = file_name.into();
        if folder_id.trim().is_empty() {
            return Err(crate::Error::Configuration(
                "Destination folder ID is missing (GOOGLE_DRIVE_FOLDER_ID)".to_string(),
            ));
        }
        if file_name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "File name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            folder_id,
            file_id: None,
            file_name,
            shared_drive_id: None,
        })
    }

    /// Set an explicit destination file ID.
    pub fn with_file_id(mut self, file_id: Option<String>) -> Self {
        self.file_id = file_id.filter(|id| !id.is_empty());
        self
    }

    /// Scope searches to a Shared Drive.
    pub fn with_shared_drive(mut self, drive_id: Option<String>) -> Self {
        self.shared_drive_id = drive_id.filter(|id| !id.is_empty());
        self
    }

    /// Same folder and drive, different file name, no explicit file ID.
    pub fn for_name(&self, file_name: impl Into<String>) -> crate::Result<Self> {
        Ok(Self::new(self.folder_id.clone(), file_name)?
            .with_shared_drive(self.shared_drive_id.clone()))
    }
}

/// Content handed to an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadContent {
    /// Structured data, always pretty-printed.
    Json(serde_json::Value),
    /// Text that is pretty-printed when it parses as JSON.
    Text(String),
    /// Raw bytes that are pretty-printed when they are JSON in UTF-8.
    Bytes(Vec<u8>),
}

impl From<serde_json::Value> for UploadContent {
    fn from(value: serde_json::Value) -> Self {
        UploadContent::Json(value)
    }
}

impl From<String> for UploadContent {
    fn from(text: String) -> Self {
        UploadContent::Text(text)
    }
}

impl From<Vec<u8>> for UploadContent {
    fn from(bytes: Vec<u8>) -> Self {
        UploadContent::Bytes(bytes)
    }
}

/// Lowercase hex MD5 of uploaded bytes, comparable with Drive's `md5Checksum`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Digest the exact bytes that are uploaded.
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(bytes)))
    }

    /// Get the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a checksum reported by Drive.
    pub fn matches(&self, checksum: &str) -> bool {
        self.0.eq_ignore_ascii_case(checksum)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an upload did to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadAction {
    Created,
    Updated,
}

impl fmt::Display for UploadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadAction::Created => f.write_str("created"),
            UploadAction::Updated => f.write_str("updated"),
        }
    }
}

/// Outcome of a single upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub action: UploadAction,
    pub remote_file_id: String,
    pub file_name: String,
    pub content_hash: ContentHash,
    pub byte_size: u64,
}

/// Secret text that zeroizes on drop and never prints.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, Deserialize)]
#[zeroize(drop)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED; {} bytes])", self.0.len())
    }
}
