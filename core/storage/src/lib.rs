//! Google Drive upload core for driveup.
//!
//! This crate resolves credentials into an authorized Drive handle and
//! performs the "ensure remote file X contains content Y" upsert against a
//! Drive folder.
//!
//! # Design Principles
//! - One seam: every Drive call goes through the [`DriveApi`] trait, so the
//!   upsert logic runs unchanged against the REST client or [`MemoryDrive`]
//! - No hidden state: handles live for one invocation, nothing is cached
//!   between calls, and nothing is retried
//! - Classified failures: every error carries a kind from
//!   [`driveup_common::ErrorKind`]

pub mod api;
pub mod config;
pub mod format;
pub mod gdrive;
pub mod memory;
pub mod params;
pub mod upsert;

pub use api::{DriveApi, DriveFile, FolderMeta, Owner};
pub use config::{CredentialConfig, DriveConfig};
pub use gdrive::{
    CredentialBundle, CredentialResolver, DriveClient, DriveEndpoints, DriveHandle,
};
pub use memory::{CallCounts, MemoryDrive};
pub use params::DriveScope;
pub use upsert::{BulkOutcome, ConnectionCheck, DriveUpsert, FolderCheck, UpsertPolicy};
