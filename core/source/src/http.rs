//! Upstream JSON API source.

use async_trait::async_trait;
use reqwest::{header, redirect, Client};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use driveup_common::{Error, Result, UploadContent};

use crate::{ContentSource, SourcedContent};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_REDIRECTS: usize = 10;

/// JSON fetched with a GET request.
#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    url: Url,
    name: String,
    follow_redirects: bool,
    timeout: Duration,
}

impl HttpJsonSource {
    /// Create a source for `url`, stored remotely as `name`.
    ///
    /// # Errors
    /// - `InvalidInput` if the URL does not parse or is not HTTP(S)
    pub fn new(url: &str, name: impl Into<String>) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidInput(format!("Invalid source URL '{}': {}", url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::InvalidInput(format!(
                "Source URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(Self {
            url,
            name: name.into(),
            follow_redirects: false,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Bound the whole request, body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn client(&self) -> Result<Client> {
        let policy = if self.follow_redirects {
            redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            redirect::Policy::none()
        };
        Client::builder()
            .redirect(policy)
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))
    }
}

#[async_trait]
impl ContentSource for HttpJsonSource {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn load(&self) -> Result<SourcedContent> {
        debug!("Fetching {}", self.url);
        let response = self
            .client()?
            .get(self.url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::remote(None, format!("Failed to fetch {}: {}", self.url, e)))?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?")
                .to_string();
            return Err(Error::remote(
                Some(status.as_u16()),
                format!("{} redirected to {} and redirects are disabled", self.url, location),
            ));
        }
        if !status.is_success() {
            return Err(Error::remote(
                Some(status.as_u16()),
                format!("{} returned {}", self.url, status),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::remote(None, format!("Failed to read {}: {}", self.url, e)))?;
        let value: Value = serde_json::from_slice(&body).map_err(|e| {
            Error::Serialization(format!("{} did not return JSON: {}", self.url, e))
        })?;
        Ok(SourcedContent::new(self.name.clone(), UploadContent::Json(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_rejects_invalid_urls() {
        assert!(matches!(
            HttpJsonSource::new("not a url", "data.json"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            HttpJsonSource::new("ftp://example.com/data.json", "data.json"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_fetches_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"teams":[{"id":1}]}"#)
            .create_async()
            .await;

        let source = HttpJsonSource::new(&format!("{}/api/data", server.url()), "data.json").unwrap();
        let loaded = source.load().await.unwrap();

        assert_eq!(loaded.name, "data.json");
        assert_eq!(loaded.content, UploadContent::Json(json!({"teams": [{"id": 1}]})));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/data")
            .with_status(500)
            .create_async()
            .await;

        let source = HttpJsonSource::new(&format!("{}/api/data", server.url()), "data.json").unwrap();
        let err = source.load().await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
    }

    #[tokio::test]
    async fn test_redirect_not_followed_by_default() {
        let mut server = Server::new_async().await;
        let target = server
            .mock("GET", "/moved")
            .with_status(200)
            .with_body("{}")
            .expect(0)
            .create_async()
            .await;
        server
            .mock("GET", "/api/data")
            .with_status(302)
            .with_header("location", "/moved")
            .create_async()
            .await;

        let source = HttpJsonSource::new(&format!("{}/api/data", server.url()), "data.json").unwrap();
        let err = source.load().await.unwrap_err();

        assert_eq!(err.status_code(), Some(302));
        target.assert_async().await;
    }

    #[tokio::test]
    async fn test_redirect_followed_when_enabled() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/data")
            .with_status(302)
            .with_header("location", "/moved")
            .create_async()
            .await;
        server
            .mock("GET", "/moved")
            .with_status(200)
            .with_body(r#"[1,2]"#)
            .create_async()
            .await;

        let source = HttpJsonSource::new(&format!("{}/api/data", server.url()), "data.json")
            .unwrap()
            .follow_redirects(true);
        let loaded = source.load().await.unwrap();
        assert_eq!(loaded.content, UploadContent::Json(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_invalid_json_is_serialization_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/data")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let source = HttpJsonSource::new(&format!("{}/api/data", server.url()), "data.json").unwrap();
        assert!(matches!(source.load().await, Err(Error::Serialization(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_slow_upstream_times_out() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/slow")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(500));
                w.write_all(b"{}")
            })
            .create_async()
            .await;

        let source = HttpJsonSource::new(&format!("{}/api/slow", server.url()), "data.json")
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let err = source.load().await.unwrap_err();

        assert!(matches!(err, Error::RemoteApi { status: None, .. }));
    }
}
