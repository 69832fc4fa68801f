//! Drive query strings and Shared-Drive request parameters.

use serde::{Deserialize, Serialize};

/// Scope of list calls: all drives, or one specific Shared Drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveScope {
    /// Shared Drive ID; `None` searches every drive the identity can see.
    pub shared_drive_id: Option<String>,
}

impl DriveScope {
    /// Scope to a specific Shared Drive, or to all drives when `None`.
    pub fn new(shared_drive_id: Option<String>) -> Self {
        Self {
            shared_drive_id: shared_drive_id.filter(|id| !id.is_empty()),
        }
    }

    /// Parameters for `files.list` / `files.get`.
    pub fn read_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("supportsAllDrives", "true".to_string()),
            ("includeItemsFromAllDrives", "true".to_string()),
        ];
        if let Some(drive_id) = &self.shared_drive_id {
            params.push(("corpora", "drive".to_string()));
            params.push(("driveId", drive_id.clone()));
        }
        params
    }

    /// Parameters for `files.create` / `files.update`.
    pub fn write_params() -> [(&'static str, &'static str); 1] {
        [("supportsAllDrives", "true")]
    }
}

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Query for a non-trashed file with an exact name under a folder.
pub fn name_query(name: &str, folder_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        escape_query_value(name),
        escape_query_value(folder_id)
    )
}

/// Query for the non-trashed children of a folder.
pub fn children_query(folder_id: &str) -> String {
    format!(
        "'{}' in parents and trashed = false",
        escape_query_value(folder_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_single_quote() {
        assert_eq!(escape_query_value("Bob's data.json"), "Bob\\'s data.json");
        assert_eq!(escape_query_value("plain.json"), "plain.json");
    }

    #[test]
    fn test_escape_trailing_backslash_keeps_literal_closed() {
        assert_eq!(escape_query_value("dir\\"), "dir\\\\");
    }

    #[test]
    fn test_name_query_with_quote_is_well_formed() {
        let q = name_query("it's.json", "folder1");
        assert_eq!(
            q,
            "name = 'it\\'s.json' and 'folder1' in parents and trashed = false"
        );
        // Every quote that is not escaped delimits a literal, so they pair up.
        let bytes = q.as_bytes();
        let unescaped = bytes
            .iter()
            .enumerate()
            .filter(|(i, b)| **b == b'\'' && (*i == 0 || bytes[i - 1] != b'\\'))
            .count();
        assert_eq!(unescaped % 2, 0);
    }

    #[test]
    fn test_read_params_all_drives() {
        let params = DriveScope::default().read_params();
        assert!(params.contains(&("supportsAllDrives", "true".to_string())));
        assert!(params.contains(&("includeItemsFromAllDrives", "true".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "corpora"));
    }

    #[test]
    fn test_read_params_specific_shared_drive() {
        let params = DriveScope::new(Some("0ADrive".to_string())).read_params();
        assert!(params.contains(&("corpora", "drive".to_string())));
        assert!(params.contains(&("driveId", "0ADrive".to_string())));
    }

    #[test]
    fn test_empty_drive_id_means_all_drives() {
        assert_eq!(DriveScope::new(Some(String::new())), DriveScope::default());
    }

    #[test]
    fn test_children_query() {
        assert_eq!(children_query("f1"), "'f1' in parents and trashed = false");
    }
}
