//! Credential material and the priority-ordered chain that selects it.
//!
//! Sources are tried in order and the first one that yields complete
//! material wins:
//! 1. OAuth2 client ID + secret + refresh token
//! 2. Service-account JSON key in `GOOGLE_CREDENTIALS_JSON`
//! 3. Service-account email + private key pair
//! 4. Service-account key file on disk (`google.json` by default)

use serde::Deserialize;
use tracing::debug;

use driveup_common::{AuthStrategy, Error, Result, SecretString};

use crate::config::CredentialConfig;

/// Identity label used for OAuth2 handles.
pub const OAUTH2_IDENTITY: &str = "OAuth2 (refresh token)";

/// Service-account key material.
#[derive(Debug, Clone)]
pub struct ServiceAccountCredentials {
    pub email: String,
    /// PEM key with real newlines.
    pub private_key: SecretString,
    /// Subject for domain-wide delegation.
    pub impersonate: Option<String>,
    /// Token endpoint to send the assertion to.
    pub token_uri: Option<String>,
}

/// OAuth2 refresh-token material.
#[derive(Debug, Clone)]
pub struct OAuth2Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    /// Token endpoint to exchange the refresh token at.
    pub token_uri: Option<String>,
}

/// Credential material for exactly one strategy.
#[derive(Debug, Clone)]
pub enum CredentialBundle {
    ServiceAccount(ServiceAccountCredentials),
    OAuth2(OAuth2Credentials),
}

impl CredentialBundle {
    /// Strategy this material authenticates with.
    pub fn strategy(&self) -> AuthStrategy {
        match self {
            CredentialBundle::ServiceAccount(_) => AuthStrategy::ServiceAccount,
            CredentialBundle::OAuth2(_) => AuthStrategy::OAuth2,
        }
    }

    /// Human-readable identity, for diagnostics only.
    pub fn identity_label(&self) -> String {
        match self {
            CredentialBundle::ServiceAccount(sa) => sa.email.clone(),
            CredentialBundle::OAuth2(_) => OAUTH2_IDENTITY.to_string(),
        }
    }
}

/// Replace literal `\n` sequences with newlines in keys that have none.
///
/// Keys that already contain a real newline are returned unchanged, which
/// makes the function idempotent.
pub fn normalize_private_key(key: &str) -> String {
    if key.contains('\n') {
        key.to_string()
    } else {
        key.replace("\\n", "\n")
    }
}

/// The subset of a service-account JSON key this crate reads.
#[derive(Deserialize)]
struct ServiceAccountKey {
    #[serde(default)]
    client_email: Option<String>,
    #[serde(default)]
    private_key: Option<SecretString>,
    #[serde(default)]
    token_uri: Option<String>,
}

impl ServiceAccountKey {
    fn parse(json: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Configuration(format!("{} is not a valid service-account key: {}", origin, e))
        })
    }

    fn into_bundle(self, config: &CredentialConfig) -> Option<CredentialBundle> {
        service_account(
            self.client_email?,
            self.private_key?.expose(),
            config,
            self.token_uri,
        )
    }
}

fn service_account(
    email: String,
    private_key: &str,
    config: &CredentialConfig,
    key_token_uri: Option<String>,
) -> Option<CredentialBundle> {
    if email.is_empty() || private_key.is_empty() {
        return None;
    }
    Some(CredentialBundle::ServiceAccount(ServiceAccountCredentials {
        email,
        private_key: SecretString::new(normalize_private_key(private_key)),
        impersonate: config.impersonate.clone(),
        token_uri: config.token_uri.clone().or(key_token_uri),
    }))
}

/// One entry of the credential chain.
pub trait CredentialSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Complete material from this source, `None` when it does not apply.
    ///
    /// # Errors
    /// - `Configuration` when the source is present but unreadable
    fn load(&self, config: &CredentialConfig) -> Result<Option<CredentialBundle>>;
}

/// OAuth2 triple from configuration.
pub struct OAuth2Source;

impl CredentialSource for OAuth2Source {
    fn name(&self) -> &'static str {
        "oauth2"
    }

    fn load(&self, config: &CredentialConfig) -> Result<Option<CredentialBundle>> {
        if !config.has_oauth2() {
            return Ok(None);
        }
        let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            config.oauth_client_id.clone(),
            config.oauth_client_secret.clone(),
            config.oauth_refresh_token.clone(),
        ) else {
            return Ok(None);
        };
        Ok(Some(CredentialBundle::OAuth2(OAuth2Credentials {
            client_id,
            client_secret,
            refresh_token,
            token_uri: config.token_uri.clone(),
        })))
    }
}

/// Full service-account JSON key held in configuration.
pub struct ServiceAccountJsonSource;

impl CredentialSource for ServiceAccountJsonSource {
    fn name(&self) -> &'static str {
        "service_account_json"
    }

    fn load(&self, config: &CredentialConfig) -> Result<Option<CredentialBundle>> {
        let Some(json) = &config.credentials_json else {
            return Ok(None);
        };
        let key = ServiceAccountKey::parse(json.expose(), crate::config::CREDENTIALS_JSON_VAR)?;
        Ok(key.into_bundle(config))
    }
}

/// Separate service-account email and private key.
pub struct ServiceAccountPairSource;

impl CredentialSource for ServiceAccountPairSource {
    fn name(&self) -> &'static str {
        "service_account_pair"
    }

    fn load(&self, config: &CredentialConfig) -> Result<Option<CredentialBundle>> {
        match (&config.client_email, &config.private_key) {
            (Some(email), Some(key)) => Ok(service_account(email.clone(), key.expose(), config, None)),
            _ => Ok(None),
        }
    }
}

/// Service-account key file on disk.
pub struct ServiceAccountFileSource;

impl CredentialSource for ServiceAccountFileSource {
    fn name(&self) -> &'static str {
        "service_account_file"
    }

    fn load(&self, config: &CredentialConfig) -> Result<Option<CredentialBundle>> {
        let path = &config.credentials_file;
        if !path.is_file() {
            return Ok(None);
        }
        let json = SecretString::new(std::fs::read_to_string(path)?);
        let key = ServiceAccountKey::parse(json.expose(), &path.display().to_string())?;
        Ok(key.into_bundle(config))
    }
}

/// The default chain: OAuth2 first, then the three service-account sources.
pub fn default_chain() -> Vec<Box<dyn CredentialSource>> {
    vec![
        Box::new(OAuth2Source),
        Box::new(ServiceAccountJsonSource),
        Box::new(ServiceAccountPairSource),
        Box::new(ServiceAccountFileSource),
    ]
}

/// Walk `chain` in order and return the first complete bundle.
///
/// # Errors
/// - `Configuration` if no source yields complete material, or a present
///   source cannot be read
pub fn select_credentials(
    chain: &[Box<dyn CredentialSource>],
    config: &CredentialConfig,
) -> Result<CredentialBundle> {
    for source in chain {
        match source.load(config)? {
            Some(bundle) => {
                debug!("Credentials selected from {}", source.name());
                return Ok(bundle);
            }
            None => debug!("Credential source {} not applicable", source.name()),
        }
    }
    Err(Error::Configuration(
        "No credentials found. Set OAuth2 (GOOGLE_OAUTH_CLIENT_ID/SECRET/REFRESH_TOKEN) or a service account (GOOGLE_CREDENTIALS_JSON, GOOGLE_CLIENT_EMAIL + GOOGLE_PRIVATE_KEY, or a google.json key file).".to_string(),
    ))
}
