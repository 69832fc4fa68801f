//! Google Drive v3 REST client.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use driveup_common::{Error, Result};

use super::auth::TokenManager;
use crate::api::{DriveApi, DriveFile, FolderMeta};
use crate::params::{children_query, name_query, DriveScope};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

const FILE_FIELDS: &str = "id,name,mimeType,size,md5Checksum,parents";
const FOLDER_FIELDS: &str = "id,name,driveId,parents,owners,teamDriveId";

const MULTIPART_BOUNDARY: &str = "driveup_multipart_boundary";

/// Characters left unescaped in a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Base URLs of the metadata and upload APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveEndpoints {
    pub api_base: String,
    pub upload_base: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }
}

impl DriveEndpoints {
    /// Serve both APIs from one base URL, with uploads under `/upload`.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api_base: format!("{}/drive/v3", base),
            upload_base: format!("{}/upload/drive/v3", base),
        }
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Google's error envelope: `{"error": {"code": 403, "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    token_manager: Arc<TokenManager>,
    endpoints: DriveEndpoints,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(http: Client, token_manager: Arc<TokenManager>, endpoints: DriveEndpoints) -> Self {
        Self {
            http,
            token_manager,
            endpoints,
        }
    }

    /// Token manager backing this client.
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    fn file_url(&self, base: &str, file_id: &str) -> String {
        format!(
            "{}/files/{}",
            base,
            utf8_percent_encode(file_id, PATH_SEGMENT)
        )
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.token_manager.get_access_token().await?;
        Ok(format!("Bearer {}", token.expose()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let auth = self.auth_header().await?;
        let response = request
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::remote(None, format!("Failed to {}: {}", what, e)))?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::remote(Some(status.as_u16()), format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            return Err(Error::remote(Some(status.as_u16()), message));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::remote(
                Some(status.as_u16()),
                format!("Failed to parse response: {}", e),
            )
        })
    }

    /// Build a `multipart/related` body with JSON metadata and media.
    fn multipart_body(metadata: &serde_json::Value, mime_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(data.len() + 256);

        // Metadata part
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata.to_string().as_bytes());
        body.extend_from_slice(b"\r\n");

        // Media part
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}--", MULTIPART_BOUNDARY).as_bytes());
        body
    }

    fn multipart_content_type() -> String {
        format!("multipart/related; boundary={}", MULTIPART_BOUNDARY)
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn get_folder(&self, folder_id: &str) -> Result<FolderMeta> {
        let request = self
            .http
            .get(self.file_url(&self.endpoints.api_base, folder_id))
            .query(&[("fields", FOLDER_FIELDS), ("supportsAllDrives", "true")]);
        self.send(request, "get folder").await
    }

    async fn find_file(
        &self,
        name: &str,
        folder_id: &str,
        scope: &DriveScope,
    ) -> Result<Option<DriveFile>> {
        let query = name_query(name, folder_id);
        let fields = format!("files({})", FILE_FIELDS);
        debug!("Drive query: {}", query);

        let request = self
            .http
            .get(format!("{}/files", self.endpoints.api_base))
            .query(&[
                ("q", query.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", "1"),
            ])
            .query(&scope.read_params());

        let list: FileListResponse = self.send(request, "find file").await?;
        Ok(list.files.into_iter().next())
    }

    async fn list_folder(
        &self,
        folder_id: &str,
        scope: &DriveScope,
        page_size: u32,
    ) -> Result<Vec<DriveFile>> {
        let request = self
            .http
            .get(format!("{}/files", self.endpoints.api_base))
            .query(&[
                ("q", children_query(folder_id)),
                ("fields", format!("files({})", FILE_FIELDS)),
                ("pageSize", page_size.to_string()),
            ])
            .query(&scope.read_params());

        let list: FileListResponse = self.send(request, "list folder").await?;
        Ok(list.files)
    }

    async fn create_file(
        &self,
        name: &str,
        folder_id: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": mime_type,
            "parents": [folder_id]
        });

        let request = self
            .http
            .post(format!("{}/files", self.endpoints.upload_base))
            .header(header::CONTENT_TYPE, Self::multipart_content_type())
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .query(&DriveScope::write_params())
            .body(Self::multipart_body(&metadata, mime_type, &data));

        self.send(request, "create file").await
    }

    async fn update_file(
        &self,
        file_id: &str,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": mime_type
        });

        let request = self
            .http
            .patch(self.file_url(&self.endpoints.upload_base, file_id))
            .header(header::CONTENT_TYPE, Self::multipart_content_type())
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .query(&DriveScope::write_params())
            .body(Self::multipart_body(&metadata, mime_type, &data));

        self.send(request, "update file").await
    }
}
