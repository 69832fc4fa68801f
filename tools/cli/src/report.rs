//! JSON reports printed by every command.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use driveup_common::{Error, UploadResult};
use driveup_storage::BulkOutcome;

/// Successful command output; `body` fields are merged into the top level.
#[derive(Debug, Serialize)]
pub struct SuccessReport<'a, T: Serialize> {
    pub success: bool,
    pub command: &'a str,
    pub timestamp: String,
    #[serde(flatten)]
    pub body: T,
}

/// Failed command output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport<'a> {
    pub success: bool,
    pub kind: &'static str,
    pub error: String,
    pub code: Option<u16>,
    pub http_status: u16,
    pub hint: Option<&'static [&'static str]>,
    pub command: &'a str,
    pub timestamp: String,
}

pub fn success<T: Serialize>(command: &str, body: T) -> SuccessReport<'_, T> {
    SuccessReport {
        success: true,
        command,
        timestamp: Utc::now().to_rfc3339(),
        body,
    }
}

pub fn failure<'a>(command: &'a str, error: &Error) -> FailureReport<'a> {
    FailureReport {
        success: false,
        kind: error.kind().as_str(),
        error: error.to_string(),
        code: error.status_code(),
        http_status: error.http_status(),
        hint: error.hints(),
        command,
        timestamp: Utc::now().to_rfc3339(),
    }
}

/// Per-file lines of a bulk run plus totals.
pub fn bulk_summary(folder_id: &str, outcomes: &[BulkOutcome]) -> Value {
    let results: Vec<Value> = outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(result) => upload_line(result),
            Err(e) => json!({
                "fileName": outcome.file_name,
                "success": false,
                "kind": e.kind().as_str(),
                "error": e.to_string(),
                "code": e.status_code(),
            }),
        })
        .collect();
    let uploaded = outcomes.iter().filter(|o| o.result.is_ok()).count();

    json!({
        "folderId": folder_id,
        "uploaded": uploaded,
        "failed": outcomes.len() - uploaded,
        "results": results,
    })
}

fn upload_line(result: &UploadResult) -> Value {
    let mut line = json!({ "success": true });
    if let (Value::Object(line), Ok(Value::Object(fields))) =
        (&mut line, serde_json::to_value(result))
    {
        line.extend(fields);
    }
    line
}
