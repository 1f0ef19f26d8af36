use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Timeout,
    Refused,
    Connect,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub elapsed_ms: u64,
    pub final_url: String,
    pub success: bool,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
}

impl ResponseRecord {
    pub fn new(
        status: u16,
        headers: impl IntoIterator<Item = (String, String)>,
        body: String,
        final_url: String,
        elapsed_ms: u64,
    ) -> Self {
        let mut normalized = BTreeMap::new();
        for (name, value) in headers {
            normalized.insert(name.to_lowercase(), value);
        }

        Self {
            status,
            headers: normalized,
            body,
            elapsed_ms,
            final_url,
            success: true,
            error: None,
            failure: None,
        }
    }

    pub fn failure(kind: FailureKind, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            status: 0,
            headers: BTreeMap::new(),
            body: String::new(),
            elapsed_ms,
            final_url: String::new(),
            success: false,
            error: Some(error.into()),
            failure: Some(kind),
        }
    }

    pub fn capped(mut self, max_bytes: usize) -> Self {
        if self.body.len() > max_bytes {
            let mut end = max_bytes;
            while !self.body.is_char_boundary(end) {
                end -= 1;
            }
            self.body.truncate(end);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn is_status(&self, status: u16) -> bool {
        self.success && self.status == status
    }

    pub fn is_html(&self) -> bool {
        self.header("content-type")
            .map(|ct| ct.to_lowercase().contains("text/html"))
            .unwrap_or(false)
    }

    pub fn header_text(&self) -> String {
        self.headers
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(headers: Vec<(&str, &str)>, body: &str) -> ResponseRecord {
        ResponseRecord::new(
            200,
            headers.into_iter().map(|(k, v)| (k.to_string(), v.to_string())),
            body.to_string(),
            "http://example.com/".to_string(),
            12,
        )
    }

    #[test]
    fn test_headers_lowercase_last_wins() {
        let resp = record(vec![("Set-Cookie", "a=1"), ("set-cookie", "b=2"), ("X-Cache", "HIT")], "");
        assert_eq!(resp.header("SET-COOKIE"), Some("b=2"));
        assert_eq!(resp.header("x-cache"), Some("HIT"));
        assert_eq!(resp.headers.len(), 2);
    }

    #[test]
    fn test_capped_respects_char_boundary() {
        let resp = record(vec![], "aé").capped(2);
        assert_eq!(resp.body, "a");
    }

    #[test]
    fn test_failure_record() {
        let resp = ResponseRecord::failure(FailureKind::Timeout, "timed out", 2000);
        assert!(!resp.success);
        assert!(!resp.is_status(0));
        assert_eq!(resp.failure, Some(FailureKind::Timeout));
        assert_eq!(resp.body_len(), 0);
    }

    #[test]
    fn test_header_text() {
        let resp = record(vec![("Server", "nginx"), ("X-Powered-By", "PHP/8.1")], "");
        assert_eq!(resp.header_text(), "server: nginx\nx-powered-by: PHP/8.1");
    }
}
