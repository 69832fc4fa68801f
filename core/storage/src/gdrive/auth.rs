//! Access-token acquisition and caching for both credential strategies.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use oauth2::{
    basic::BasicClient, AsyncHttpClient, ClientId, ClientSecret, RefreshToken, RequestTokenError,
    TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info};

use driveup_common::{AuthStrategy, Error, Result, SecretString};

use super::credentials::{CredentialBundle, OAuth2Credentials, ServiceAccountCredentials};

/// Google OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Full Drive scope.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for signed assertions.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Access token with expiration tracking.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Token valid for `expires_in_secs` from now.
    ///
    /// A lifetime that does not fit a timestamp falls back to one hour.
    pub fn expiring_in(secret: impl Into<String>, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        let expires_at = Duration::try_seconds(expires_in_secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or_else(|| now + Duration::seconds(ASSERTION_LIFETIME_SECS));
        Self {
            secret: SecretString::new(secret),
            expires_at,
        }
    }

    /// Check if the token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expires_at < Utc::now() + Duration::minutes(5)
    }
}

/// Claims of a service-account assertion.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
    /// Impersonated user for domain-wide delegation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenEndpointError {
    fn message(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error.clone(),
        }
    }
}

/// Exchanges credential material for access tokens.
pub struct AuthManager {
    bundle: CredentialBundle,
    http: Client,
}

impl AuthManager {
    /// Create an authentication manager for `bundle`.
    pub fn new(bundle: CredentialBundle, http: Client) -> Self {
        Self { bundle, http }
    }

    /// Strategy of the underlying credential.
    pub fn strategy(&self) -> AuthStrategy {
        self.bundle.strategy()
    }

    /// Human-readable identity of the underlying credential.
    pub fn identity(&self) -> String {
        self.bundle.identity_label()
    }

    /// Obtain a fresh access token from the token endpoint.
    ///
    /// # Errors
    /// - `Authentication` if the key cannot sign or the endpoint rejects
    ///   the credential
    /// - `RemoteApi` if the endpoint is unreachable or fails server-side
    pub async fn fetch_token(&self) -> Result<AccessToken> {
        match &self.bundle {
            CredentialBundle::ServiceAccount(sa) => self.service_account_token(sa).await,
            CredentialBundle::OAuth2(creds) => oauth2_token(creds).await,
        }
    }

    async fn service_account_token(&self, sa: &ServiceAccountCredentials) -> Result<AccessToken> {
        let token_uri = sa.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let assertion = signed_assertion(sa, token_uri, Utc::now().timestamp())?;
        debug!("Requesting service-account token for {}", sa.email);

        let response = self
            .http
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|e| Error::remote(None, format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::remote(None, format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenEndpointError>(&body)
                .map(|e| e.message())
                .unwrap_or(body);
            return Err(if status.is_server_error() {
                Error::remote(Some(status.as_u16()), message)
            } else {
                Error::auth(AuthStrategy::ServiceAccount, Some(status.as_u16()), message)
            });
        }

        let token: TokenEndpointResponse = serde_json::from_str(&body).map_err(|e| {
            Error::auth(
                AuthStrategy::ServiceAccount,
                Some(status.as_u16()),
                format!("Unexpected token response: {}", e),
            )
        })?;
        Ok(AccessToken::expiring_in(
            token.access_token,
            token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS),
        ))
    }
}

/// Sign an RS256 assertion for the Drive scope.
fn signed_assertion(sa: &ServiceAccountCredentials, token_uri: &str, now: i64) -> Result<String> {
    let claims = Claims {
        iss: sa.email.clone(),
        scope: DRIVE_SCOPE.to_string(),
        aud: token_uri.to_string(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
        sub: sa.impersonate.clone(),
    };

    let key = EncodingKey::from_rsa_pem(sa.private_key.expose().as_bytes()).map_err(|e| {
        Error::auth(
            AuthStrategy::ServiceAccount,
            None,
            format!("malformed private key: {}", e),
        )
    })?;

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| {
        Error::auth(
            AuthStrategy::ServiceAccount,
            None,
            format!("JWT signature failed: {}", e),
        )
    })
}

async fn oauth2_token(creds: &OAuth2Credentials) -> Result<AccessToken> {
    let token_uri = creds.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
    let client = BasicClient::new(ClientId::new(creds.client_id.clone()))
        .set_client_secret(ClientSecret::new(creds.client_secret.expose().to_string()))
        .set_token_uri(
            TokenUrl::new(token_uri.to_string())
                .map_err(|e| Error::Configuration(format!("Invalid token URL: {}", e)))?,
        );

    let http = oauth2::reqwest::ClientBuilder::new()
        .redirect(oauth2::reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::remote(None, format!("Failed to create HTTP client: {}", e)))?;

    // The oauth2 crate drops the HTTP status of a rejected exchange, so the
    // sender records it on the way through.
    let status = std::sync::Arc::new(OnceLock::new());
    let send = {
        let status = status.clone();
        move |request: oauth2::HttpRequest| {
            let (http, status) = (http.clone(), status.clone());
            async move {
                let response = http.call(request).await?;
                let _ = status.set(response.status().as_u16());
                Ok::<_, oauth2::HttpClientError<oauth2::reqwest::Error>>(response)
            }
        }
    };

    debug!("Exchanging OAuth2 refresh token");
    let token_result = client
        .exchange_refresh_token(&RefreshToken::new(creds.refresh_token.expose().to_string()))
        .request_async(&send)
        .await
        .map_err(|e| match e {
            RequestTokenError::ServerResponse(resp) => {
                let message = match resp.error_description() {
                    Some(description) => format!("{}: {}", resp.error(), description),
                    None => resp.error().to_string(),
                };
                match status.get().copied() {
                    Some(code) if code >= 500 => Error::remote(Some(code), message),
                    code => Error::auth(AuthStrategy::OAuth2, code, message),
                }
            }
            RequestTokenError::Request(e) => {
                Error::remote(None, format!("Token refresh failed: {}", e))
            }
            RequestTokenError::Parse(e, _) => Error::remote(
                status.get().copied(),
                format!("Unexpected token response: {}", e),
            ),
            RequestTokenError::Other(message) => {
                Error::auth(AuthStrategy::OAuth2, status.get().copied(), message)
            }
        })?;

    let expires_in = token_result
        .expires_in()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(ASSERTION_LIFETIME_SECS);

    Ok(AccessToken::expiring_in(
        token_result.access_token().secret().clone(),
        expires_in,
    ))
}

/// Token manager that automatically refreshes expired tokens.
pub struct TokenManager {
    auth_manager: AuthManager,
    token: tokio::sync::RwLock<Option<AccessToken>>,
}

impl TokenManager {
    /// Create a token manager and fetch its first token right away.
    ///
    /// # Errors
    /// - Same as [`AuthManager::fetch_token`]
    pub async fn authorized(auth_manager: AuthManager) -> Result<Self> {
        let token = auth_manager.fetch_token().await?;
        info!(
            "Authenticated via {} as {}",
            auth_manager.strategy(),
            auth_manager.identity()
        );
        Ok(Self::with_token(auth_manager, token))
    }

    /// Create a token manager seeded with an existing token.
    pub fn with_token(auth_manager: AuthManager, token: AccessToken) -> Self {
        Self {
            auth_manager,
            token: tokio::sync::RwLock::new(Some(token)),
        }
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.auth_manager.strategy()
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<SecretString> {
        let token = self.token.read().await;
        if let Some(token) = token.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.secret.clone());
        }
        drop(token);

        let mut token = self.token.write().await;

        // Double-check after acquiring write lock
        if let Some(token) = token.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.secret.clone());
        }

        info!("Refreshing expired access token");
        let fresh = self.auth_manager.fetch_token().await?;
        let secret = fresh.secret.clone();
        *token = Some(fresh);
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};
    use mockito::{Matcher, Server};

    const TEST_KEY: &str = include_str!("../../testdata/test_service_account.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../../testdata/test_service_account.pub.pem");

    fn service_account(token_uri: &str, key: &str) -> CredentialBundle {
        CredentialBundle::ServiceAccount(ServiceAccountCredentials {
            email: "uploader@project.iam.gserviceaccount.com".to_string(),
            private_key: SecretString::new(key),
            impersonate: None,
            token_uri: Some(token_uri.to_string()),
        })
    }

    fn oauth2(token_uri: &str) -> CredentialBundle {
        CredentialBundle::OAuth2(OAuth2Credentials {
            client_id: "client-id".to_string(),
            client_secret: SecretString::new("client-secret"),
            refresh_token: SecretString::new("1//refresh"),
            token_uri: Some(token_uri.to_string()),
        })
    }

    #[test]
    fn test_token_expiration() {
        let expired = AccessToken {
            secret: SecretString::new("t"),
            expires_at: Utc::now() - Duration::hours(1),
        };
        assert!(expired.is_expired());

        let valid = AccessToken {
            secret: SecretString::new("t"),
            expires_at: Utc::now() + Duration::hours(1),
        };
        assert!(!valid.is_expired());
    }

    #[test]
    fn test_token_near_expiration() {
        // Token expiring in 4 minutes should be considered expired (5 min buffer)
        let token = AccessToken {
            secret: SecretString::new("t"),
            expires_at: Utc::now() + Duration::minutes(4),
        };
        assert!(token.is_expired());
    }

    #[test]
    fn test_assertion_claims() {
        let sa = ServiceAccountCredentials {
            email: "uploader@project.iam.gserviceaccount.com".to_string(),
            private_key: SecretString::new(TEST_KEY),
            impersonate: Some("owner@example.com".to_string()),
            token_uri: None,
        };
        let now = Utc::now().timestamp();
        let jwt = signed_assertion(&sa, DEFAULT_TOKEN_URI, now).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[DEFAULT_TOKEN_URI]);
        let decoded = jsonwebtoken::decode::<Claims>(
            &jwt,
            &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        let claims = decoded.claims;
        assert_eq!(claims.iss, sa.email);
        assert_eq!(claims.scope, DRIVE_SCOPE);
        assert_eq!(claims.iat, now);
        assert_eq!(claims.exp, now + 3600);
        assert_eq!(claims.sub.as_deref(), Some("owner@example.com"));
    }

    #[tokio::test]
    async fn test_malformed_key_fails_before_any_request() {
        let mut server = Server::new_async().await;
        let endpoint = server.mock("POST", "/token").expect(0).create_async().await;

        let manager = AuthManager::new(
            service_account(&format!("{}/token", server.url()), "not a pem"),
            Client::new(),
        );
        let err = manager.fetch_token().await.unwrap_err();

        assert!(matches!(
            &err,
            Error::Authentication { strategy: AuthStrategy::ServiceAccount, message, .. }
                if message.contains("malformed")
        ));
        assert!(err.hints().is_some());
        endpoint.assert_async().await;
    }

    #[tokio::test]
    async fn test_service_account_token_exchange() {
        let mut server = Server::new_async().await;
        let endpoint = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), JWT_BEARER_GRANT.into()),
                Matcher::Regex("assertion=".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.sa","expires_in":3599,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let manager = AuthManager::new(
            service_account(&format!("{}/token", server.url()), TEST_KEY),
            Client::new(),
        );
        let token = manager.fetch_token().await.unwrap();

        assert_eq!(token.secret.expose(), "ya29.sa");
        assert!(!token.is_expired());
        endpoint.assert_async().await;
    }

    #[tokio::test]
    async fn test_service_account_rejection_is_authentication_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid JWT Signature."}"#)
            .create_async()
            .await;

        let manager = AuthManager::new(
            service_account(&format!("{}/token", server.url()), TEST_KEY),
            Client::new(),
        );
        let err = manager.fetch_token().await.unwrap_err();

        assert_eq!(err.status_code(), Some(400));
        assert!(matches!(
            &err,
            Error::Authentication { message, .. } if message == "invalid_grant: Invalid JWT Signature."
        ));
    }

    #[tokio::test]
    async fn test_oauth2_refresh_exchange() {
        let mut server = Server::new_async().await;
        let endpoint = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "1//refresh".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.user","expires_in":3599,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let manager = AuthManager::new(oauth2(&format!("{}/token", server.url())), Client::new());
        let token = manager.fetch_token().await.unwrap();

        assert_eq!(token.secret.expose(), "ya29.user");
        endpoint.assert_async().await;
    }

    #[tokio::test]
    async fn test_oauth2_invalid_grant() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Bad Request"}"#)
            .create_async()
            .await;

        let manager = AuthManager::new(oauth2(&format!("{}/token", server.url())), Client::new());
        let err = manager.fetch_token().await.unwrap_err();

        assert!(matches!(
            &err,
            Error::Authentication { strategy: AuthStrategy::OAuth2, message, .. }
                if message.contains("invalid_grant")
        ));
        assert_eq!(err.hints(), Some(driveup_common::hints::OAUTH2));
        assert_eq!(err.status_code(), Some(400));
    }

    #[tokio::test]
    async fn test_oauth2_server_failure_is_remote_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"temporarily_unavailable"}"#)
            .create_async()
            .await;

        let manager = AuthManager::new(oauth2(&format!("{}/token", server.url())), Client::new());
        let err = manager.fetch_token().await.unwrap_err();

        assert!(matches!(err, Error::RemoteApi { status: Some(503), .. }));
    }

    #[test]
    fn test_oversized_lifetime_falls_back_to_one_hour() {
        let token = AccessToken::expiring_in("t", i64::MAX);
        let lifetime = token.expires_at - Utc::now();

        assert!(!token.is_expired());
        assert!(lifetime <= Duration::hours(1));
        assert!(lifetime > Duration::minutes(59));
    }

    #[tokio::test]
    async fn test_service_account_huge_expires_in() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.long","expires_in":9223372036854775807}"#)
            .create_async()
            .await;

        let manager = AuthManager::new(
            service_account(&format!("{}/token", server.url()), TEST_KEY),
            Client::new(),
        );
        let token = manager.fetch_token().await.unwrap();

        assert_eq!(token.secret.expose(), "ya29.long");
        assert!(token.expires_at - Utc::now() <= Duration::hours(1));
    }

    #[tokio::test]
    async fn test_oauth2_huge_expires_in() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"ya29.long","expires_in":18446744073709551615,"token_type":"Bearer"}"#,
            )
            .create_async()
            .await;

        let manager = AuthManager::new(oauth2(&format!("{}/token", server.url())), Client::new());
        let token = manager.fetch_token().await.unwrap();

        assert!(!token.is_expired());
        assert!(token.expires_at - Utc::now() <= Duration::hours(1));
    }

    #[tokio::test]
    async fn test_token_manager_caches_valid_token() {
        let mut server = Server::new_async().await;
        let endpoint = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.cached","expires_in":3599,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;

        let manager = AuthManager::new(oauth2(&format!("{}/token", server.url())), Client::new());
        let tokens = TokenManager::authorized(manager).await.unwrap();

        assert_eq!(tokens.get_access_token().await.unwrap().expose(), "ya29.cached");
        assert_eq!(tokens.get_access_token().await.unwrap().expose(), "ya29.cached");
        endpoint.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_manager_refreshes_short_lived_token() {
        let mut server = Server::new_async().await;
        let endpoint = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.short","expires_in":60,"token_type":"Bearer"}"#)
            .expect(2)
            .create_async()
            .await;

        let manager = AuthManager::new(oauth2(&format!("{}/token", server.url())), Client::new());
        let tokens = TokenManager::authorized(manager).await.unwrap();
        tokens.get_access_token().await.unwrap();

        endpoint.assert_async().await;
    }
}
