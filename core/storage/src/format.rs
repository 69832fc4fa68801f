//! Pretty-printing of upload content.
//!
//! JSON is written with 2-space indentation and exactly one trailing newline
//! so that successive backups diff cleanly. Formatting is best-effort: content
//! that is not JSON is uploaded unchanged.

use serde_json::Value;
use tracing::warn;

use driveup_common::UploadContent;

/// Serialize a value with 2-space indentation and a trailing newline.
pub fn pretty_json(value: &Value) -> String {
    let mut text = match serde_json::to_string_pretty(value) {
        Ok(text) => text,
        Err(e) => {
            warn!("Pretty-printing failed, using compact JSON: {}", e);
            value.to_string()
        }
    };
    text.push('\n');
    text
}

/// Produce the exact bytes to upload for `content`.
pub fn format_for_upload(content: &UploadContent) -> Vec<u8> {
    match content {
        UploadContent::Json(value) => pretty_json(value).into_bytes(),
        UploadContent::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => pretty_json(&value).into_bytes(),
            Err(e) => {
                warn!("Content is not valid JSON, uploading as-is: {}", e);
                text.clone().into_bytes()
            }
        },
        UploadContent::Bytes(bytes) => match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => pretty_json(&value).into_bytes(),
            Err(e) => {
                warn!("Content is not valid JSON, uploading as-is: {}", e);
                bytes.clone()
            }
        },
    }
}
