//! Common error types for driveup.

use thiserror::Error;

use crate::hints;
use crate::types::AuthStrategy;

/// Top-level error type for credential resolution and Drive uploads.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable credential material, or a required setting is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The identity provider rejected the credential.
    #[error("Authentication error ({strategy}): {message}")]
    Authentication {
        /// Strategy that was active when the credential was rejected.
        strategy: AuthStrategy,
        /// Provider message, e.g. `invalid_grant: Bad Request`.
        message: String,
        /// HTTP status returned by the token endpoint, if any.
        status: Option<u16>,
    },

    /// Service account targeting a folder outside a Shared Drive.
    #[error("Quota error: {0}")]
    Quota(String),

    /// No existing file matched and implicit creation is disabled.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other Drive API or transport failure.
    #[error("Remote API error{}: {message}", status_suffix(.status))]
    RemoteApi {
        /// HTTP status returned by the provider, if a response was received.
        status: Option<u16>,
        /// Provider message or transport error text.
        message: String,
    },

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Coarse classification of an [`Error`], suitable for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    Quota,
    NotFound,
    RemoteApi,
    Io,
    Serialization,
    InvalidInput,
}

impl ErrorKind {
    /// Stable name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::Quota => "QuotaError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::RemoteApi => "RemoteApiError",
            ErrorKind::Io => "IoError",
            ErrorKind::Serialization => "SerializationError",
            ErrorKind::InvalidInput => "InvalidInputError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Build a remote API error from a status code and message.
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::RemoteApi {
            status,
            message: message.into(),
        }
    }

    /// Build an authentication error for the given strategy.
    pub fn auth(strategy: AuthStrategy, status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Authentication {
            strategy,
            message: message.into(),
            status,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Quota(_) => ErrorKind::Quota,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::RemoteApi { .. } => ErrorKind::RemoteApi,
            Error::Io(_) => ErrorKind::Io,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Numeric status reported by the provider, when one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Authentication { status, .. } | Error::RemoteApi { status, .. } => *status,
            _ => None,
        }
    }

    /// HTTP status an outer adapter should answer with.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Configuration | ErrorKind::InvalidInput => 400,
            ErrorKind::Authentication => 401,
            ErrorKind::Quota => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RemoteApi => 502,
            ErrorKind::Io | ErrorKind::Serialization => 500,
        }
    }

    /// Operator-facing remediation hints, if any apply to this error.
    ///
    /// Authentication failures only carry hints when the provider message
    /// matches a known auth-failure pattern; the list depends on the strategy
    /// that was active.
    pub fn hints(&self) -> Option<&'static [&'static str]> {
        match self {
            Error::Authentication {
                strategy, message, ..
            } if hints::is_auth_failure(message) => Some(hints::for_strategy(*strategy)),
            Error::Quota(_) => Some(hints::QUOTA),
            _ => None,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
