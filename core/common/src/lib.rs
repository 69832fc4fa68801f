//! Common utilities and types shared across the driveup crates.
//!
//! This module provides the error taxonomy every operation reports through,
//! the remediation hints attached to it, and the value types that flow
//! between content sources, the credential resolver and the Drive upsert.

pub mod error;
pub mod hints;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{
    AuthStrategy, ContentHash, SecretString, UploadAction, UploadContent, UploadResult,
    UploadTarget,
};
