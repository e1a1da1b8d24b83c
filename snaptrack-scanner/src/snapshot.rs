use crate::fetch::PageCapture;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Header name to every value sent or received under that name
pub type HeaderMap = BTreeMap<String, Vec<String>>;

/// One immutable, timestamped capture of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub url: String,
    pub content_hash: String,
    pub html_body: String,
    pub status_code: u16,
    pub request_headers: HeaderMap,
    pub response_headers: HeaderMap,
    pub created_at: DateTime<Utc>,
}

/// A snapshot that has not been written yet. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub url: String,
    pub content_hash: String,
    pub html_body: String,
    pub status_code: u16,
    pub request_headers: HeaderMap,
    pub response_headers: HeaderMap,
}

impl NewSnapshot {
    pub fn from_capture(url: &str, capture: &PageCapture) -> Self {
        Self {
            url: url.to_string(),
            content_hash: content_hash(&capture.body),
            html_body: capture.body.clone(),
            status_code: capture.status_code,
            request_headers: capture.request_headers.clone(),
            response_headers: capture.response_headers.clone(),
        }
    }

    pub fn into_snapshot(self, id: i64, created_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            id,
            url: self.url,
            content_hash: self.content_hash,
            html_body: self.html_body,
            status_code: self.status_code,
            request_headers: self.request_headers,
            response_headers: self.response_headers,
            created_at,
        }
    }
}

/// Lowercase hex SHA-256 of the exact body bytes.
///
/// No normalization is applied: any byte change in the rendered body counts as a new
/// version of the page.
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_body_same_hash() {
        let body = "<html><body>Hello</body></html>";
        assert_eq!(content_hash(body), content_hash(body));
    }

    #[test]
    fn test_whitespace_changes_hash() {
        assert_ne!(
            content_hash("<p>Hello</p>"),
            content_hash("<p>Hello </p>")
        );
    }

    #[test]
    fn test_hash_format() {
        let hash = content_hash("Test content");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_known_digest_of_empty_body() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_new_snapshot_from_capture() {
        let mut response_headers = HeaderMap::new();
        response_headers.insert("content-type".to_string(), vec!["text/html".to_string()]);
        let capture = PageCapture {
            body: "<html></html>".to_string(),
            status_code: 404,
            request_headers: HeaderMap::new(),
            response_headers,
        };

        let snapshot = NewSnapshot::from_capture("http://a.test/", &capture);

        assert_eq!(snapshot.url, "http://a.test/");
        assert_eq!(snapshot.status_code, 404);
        assert_eq!(snapshot.content_hash, content_hash("<html></html>"));
        assert_eq!(
            snapshot.response_headers["content-type"],
            vec!["text/html".to_string()]
        );
    }
}
