//! JSON response types and formatting for CLI output.

use serde::Serialize;

/// Response for a one-shot scan.
#[derive(Serialize)]
pub struct ScanResponse {
    pub status: String,
    pub saved: usize,
}

/// Response for the bulk importer.
#[derive(Serialize)]
pub struct ImportResponse {
    pub status: String,
    pub files: usize,
    pub commits: usize,
    pub saved: usize,
}

/// Individual search result item.
#[derive(Serialize)]
pub struct SearchResultItem {
    pub id: String,
    pub memory_type: String,
    pub importance_score: u8,
    pub content: String,
    pub timestamp: String,
}

/// Response for search results.
#[derive(Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
}

/// Response for a completed backup.
#[derive(Serialize)]
pub struct BackupResponse {
    pub status: String,
    pub path: String,
}

/// Response for errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Print a value as formatted JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_scan_response() {
        let response = ScanResponse {
            status: "scanned".to_string(),
            saved: 7,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"scanned\""));
        assert!(json.contains("\"saved\":7"));
    }

    #[test]
    fn test_serialize_import_response() {
        let response = ImportResponse {
            status: "imported".to_string(),
            files: 4,
            commits: 12,
            saved: 16,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"files\":4"));
        assert!(json.contains("\"commits\":12"));
        assert!(json.contains("\"saved\":16"));
    }

    #[test]
    fn test_serialize_search_response() {
        let response = SearchResponse {
            results: vec![SearchResultItem {
                id: "row-1".to_string(),
                memory_type: "git".to_string(),
                importance_score: 80,
                content: "Git commit: fix".to_string(),
                timestamp: "2024-01-01T00:00:00Z".to_string(),
            }],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"results\""));
        assert!(json.contains("\"importance_score\":80"));
    }
}
