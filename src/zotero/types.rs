use reqwest::header::HeaderMap;
use serde::Deserialize;

/// One raw Atom page plus the response headers reported alongside it.
pub struct FetchedPage {
    pub body: String,
    pub headers: LibraryHeaders,
}

/// Zotero response headers of interest.
#[derive(Debug, Clone, Default)]
pub struct LibraryHeaders {
    /// Total item count for the query, reported on every page.
    pub total_results: Option<u64>,
    /// Library version from `Last-Modified-Version`.
    pub library_version: Option<u64>,
    /// Seconds the server asks clients to back off, when under load.
    pub backoff_secs: Option<u64>,
}

impl LibraryHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            total_results: parse_header_u64(headers, "Total-Results"),
            library_version: parse_header_u64(headers, "Last-Modified-Version"),
            backoff_secs: parse_header_u64(headers, "Backoff"),
        }
    }
}

/// Parse an integer header, tolerating missing or malformed values.
fn parse_header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// `/keys/current` response (JSON).
#[derive(Debug, Deserialize)]
pub struct KeyInfo {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "userID", default)]
    pub user_id: Option<u64>,
}
