//! Remediation hints for authentication and quota failures.

use crate::types::AuthStrategy;

/// Substrings (lowercase) that mark a provider message as an auth failure.
const AUTH_FAILURE_PATTERNS: &[&str] = &[
    "invalid_grant",
    "unauthorized_client",
    "jwt",
    "signature",
    "malformed",
];

/// Hints for a rejected OAuth2 refresh token.
pub const OAUTH2: &[&str] = &[
    "OAuth2: revoke access and grant consent again to obtain a new refresh token.",
    "Make sure the OAuth consent screen is published (In production); testing apps expire refresh tokens.",
    "Check that the refresh token was not revoked manually (Security > Third-party access).",
    "Check that GOOGLE_OAUTH_CLIENT_ID/GOOGLE_OAUTH_CLIENT_SECRET belong to the project that issued the refresh token.",
];

/// Hints for a rejected service-account assertion.
pub const SERVICE_ACCOUNT: &[&str] = &[
    "Service account: rotate the key and download a fresh JSON key (IAM & Admin > Service Accounts).",
    "Check that private_key keeps its line breaks; in an env var, replace literal \\n with real newlines.",
    "Share the destination Drive folder with the service account email as Editor.",
    "For domain-wide delegation, set GOOGLE_IMPERSONATE_EMAIL to a domain user and allow the Drive scope.",
    "Make sure the server clock is not skewed by more than 5 minutes (NTP).",
];

/// Ways out of the service-account "no quota in My Drive" restriction.
pub const QUOTA: &[&str] = &[
    "Create a Shared Drive and add the service account as Content manager.",
    "Or use OAuth2 (GOOGLE_OAUTH_CLIENT_ID/SECRET/REFRESH_TOKEN) to upload into your own My Drive.",
    "Or pre-create the file, share it with the service account and set GOOGLE_DRIVE_FILE_ID.",
];

/// Whether a provider message looks like a credential rejection.
pub fn is_auth_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    AUTH_FAILURE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Hint list for the given strategy.
pub fn for_strategy(strategy: AuthStrategy) -> &'static [&'static str] {
    match strategy {
        AuthStrategy::OAuth2 => OAUTH2,
        AuthStrategy::ServiceAccount => SERVICE_ACCOUNT,
    }
}
