//! Google Drive backend.
//!
//! - Credential selection across OAuth2 and service-account sources
//! - Token acquisition with automatic refresh
//! - A REST client implementing [`crate::DriveApi`]

pub mod auth;
pub mod client;
pub mod credentials;
pub mod resolver;

pub use auth::{AccessToken, AuthManager, TokenManager, DEFAULT_TOKEN_URI, DRIVE_SCOPE};
pub use client::{DriveClient, DriveEndpoints};
pub use credentials::{
    default_chain, normalize_private_key, select_credentials, CredentialBundle, CredentialSource,
    OAuth2Credentials, ServiceAccountCredentials,
};
pub use resolver::{CredentialResolver, DriveHandle};
