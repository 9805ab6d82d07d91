//! Request identity and stored response snapshots.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// An intercepted outgoing request.
///
/// Cache identity is the full URL string; the method rides along for
/// logging and host-side dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: String,
}

impl Request {
    /// Build a GET request for the given URL.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".to_string(), url: url.into() }
    }

    /// Key under which this request is stored. Entries are URL-keyed.
    pub fn cache_key(&self) -> &str {
        &self.url
    }
}

/// A stored response snapshot: status, headers and body of one response.
///
/// Immutable once written; re-caching overwrites the whole entry, entries
/// are never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// RFC3339 timestamp of when the snapshot was taken.
    pub stored_at: String,
}

impl ResponseSnapshot {
    /// Build a snapshot stamped with the current time.
    pub fn new(
        status: u16,
        status_text: impl Into<String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers,
            body,
            stored_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}
