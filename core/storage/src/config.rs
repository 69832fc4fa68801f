//! Configuration surface read from the environment.
//!
//! Values come from process environment variables, after loading a `.env`
//! file when one exists. Empty values are treated as absent. Parsing goes
//! through a lookup function so callers and tests can supply their own source.

use std::path::PathBuf;

use driveup_common::{Error, Result, SecretString, UploadTarget};

use crate::params::DriveScope;
use crate::upsert::UpsertPolicy;

pub const FOLDER_ID_VAR: &str = "GOOGLE_DRIVE_FOLDER_ID";
pub const FILE_ID_VAR: &str = "GOOGLE_DRIVE_FILE_ID";
pub const SHARED_DRIVE_ID_VAR: &str = "GOOGLE_DRIVE_ID";
pub const REQUIRE_EXISTING_VAR: &str = "REQUIRE_EXISTING_FILE";
pub const CREDENTIALS_JSON_VAR: &str = "GOOGLE_CREDENTIALS_JSON";
pub const CLIENT_EMAIL_VAR: &str = "GOOGLE_CLIENT_EMAIL";
pub const PRIVATE_KEY_VAR: &str = "GOOGLE_PRIVATE_KEY";
pub const CREDENTIALS_FILE_VAR: &str = "GOOGLE_CREDENTIALS_FILE";
pub const IMPERSONATE_VAR: &str = "GOOGLE_IMPERSONATE_EMAIL";
pub const OAUTH_CLIENT_ID_VAR: &str = "GOOGLE_OAUTH_CLIENT_ID";
pub const OAUTH_CLIENT_SECRET_VAR: &str = "GOOGLE_OAUTH_CLIENT_SECRET";
pub const OAUTH_REFRESH_TOKEN_VAR: &str = "GOOGLE_OAUTH_REFRESH_TOKEN";
pub const TOKEN_URI_VAR: &str = "GOOGLE_TOKEN_URI";

/// Default service-account key file, relative to the working directory.
pub const DEFAULT_CREDENTIALS_FILE: &str = "google.json";

/// Raw credential material for both strategies.
///
/// Nothing here is validated; the credential chain decides which strategy
/// applies and whether the material is complete.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Full service-account JSON key.
    pub credentials_json: Option<SecretString>,
    /// Service-account email (paired with `private_key`).
    pub client_email: Option<String>,
    /// Service-account PEM key, possibly with literal `\n` sequences.
    pub private_key: Option<SecretString>,
    /// Service-account key file checked last.
    pub credentials_file: PathBuf,
    /// Domain-wide delegation subject.
    pub impersonate: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<SecretString>,
    pub oauth_refresh_token: Option<SecretString>,
    /// Token endpoint override.
    pub token_uri: Option<String>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            credentials_json: None,
            client_email: None,
            private_key: None,
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            impersonate: None,
            oauth_client_id: None,
            oauth_client_secret: None,
            oauth_refresh_token: None,
            token_uri: None,
        }
    }
}

impl CredentialConfig {
    /// Read credential variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            credentials_json: get(CREDENTIALS_JSON_VAR).map(SecretString::from),
            client_email: get(CLIENT_EMAIL_VAR),
            private_key: get(PRIVATE_KEY_VAR).map(SecretString::from),
            credentials_file: get(CREDENTIALS_FILE_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE)),
            impersonate: get(IMPERSONATE_VAR),
            oauth_client_id: get(OAUTH_CLIENT_ID_VAR),
            oauth_client_secret: get(OAUTH_CLIENT_SECRET_VAR).map(SecretString::from),
            oauth_refresh_token: get(OAUTH_REFRESH_TOKEN_VAR).map(SecretString::from),
            token_uri: get(TOKEN_URI_VAR),
        }
    }

    /// Check if the full OAuth2 triple is present and non-empty.
    pub fn has_oauth2(&self) -> bool {
        self.oauth_client_id.as_deref().is_some_and(|v| !v.is_empty())
            && self.oauth_client_secret.as_ref().is_some_and(|v| !v.is_empty())
            && self.oauth_refresh_token.as_ref().is_some_and(|v| !v.is_empty())
    }
}

/// Everything an upload invocation needs besides the content.
#[derive(Debug, Clone, Default)]
pub struct DriveConfig {
    pub folder_id: Option<String>,
    pub file_id: Option<String>,
    pub shared_drive_id: Option<String>,
    /// Refuse to create files that do not exist yet.
    pub require_existing: bool,
    pub credentials: CredentialConfig,
}

impl DriveConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`.
    ///
    /// # Errors
    /// - `Configuration` if `REQUIRE_EXISTING_FILE` is not a boolean
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let require_existing = match get(REQUIRE_EXISTING_VAR) {
            Some(value) => parse_bool(REQUIRE_EXISTING_VAR, &value)?,
            None => false,
        };

        Ok(Self {
            folder_id: get(FOLDER_ID_VAR),
            file_id: get(FILE_ID_VAR),
            shared_drive_id: get(SHARED_DRIVE_ID_VAR),
            require_existing,
            credentials: CredentialConfig::from_lookup(&lookup),
        })
    }

    /// Folder ID, or a configuration error naming the variable.
    pub fn folder_id(&self) -> Result<&str> {
        self.folder_id
            .as_deref()
            .ok_or_else(|| Error::Configuration(format!("{} is not set", FOLDER_ID_VAR)))
    }

    /// Upload target for `file_name` with the configured file and drive IDs.
    pub fn target(&self, file_name: impl Into<String>) -> Result<UploadTarget> {
        Ok(UploadTarget::new(self.folder_id()?, file_name)?
            .with_file_id(self.file_id.clone())
            .with_shared_drive(self.shared_drive_id.clone()))
    }

    /// List scope derived from the configured Shared Drive.
    pub fn scope(&self) -> DriveScope {
        DriveScope::new(self.shared_drive_id.clone())
    }

    /// Upsert policy derived from the configuration.
    pub fn policy(&self) -> UpsertPolicy {
        UpsertPolicy {
            require_existing: self.require_existing,
        }
    }
}

/// Parse a boolean switch such as `true`, `1`, `yes` (case-insensitive).
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(Error::Configuration(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}
