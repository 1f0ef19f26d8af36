use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::upstream::{WAYBACK_TIMEOUT_MS, archived_url, parse_json, wayback_cdx_url};
use super::{normalize_domain, require};
use crate::error::{EngineError, EngineResult};
use crate::generator::dedup_preserving;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, ToolId};
use crate::scanner::{RunContext, Tool, Verdict};

const SENSITIVE_EXTENSIONS: &[&str] = &[
    ".sql", ".bak", ".backup", ".old", ".orig", ".temp", ".tmp", ".log", ".logs", ".conf", ".config", ".cfg",
    ".ini", ".env", ".json", ".xml", ".yaml", ".yml", ".toml", ".pem", ".key", ".crt", ".cer", ".p12", ".pfx",
    ".zip", ".tar", ".gz", ".rar", ".7z", ".dump", ".db", ".sqlite", ".mdb", ".php~", ".swp", ".swo",
    ".ds_store", ".git",
];

const API_MARKERS: &[&str] = &["/api/", "/v1/", "/v2/", "/graphql", "/rest/"];

const MAX_URLS: usize = 100;
const MAX_ENDPOINTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub original: String,
    pub timestamp: String,
}

impl Capture {
    pub fn archived(&self) -> String {
        archived_url(&self.timestamp, &self.original)
    }
}

pub fn parse_captures(body: &str) -> Option<Vec<Capture>> {
    let rows: Vec<Vec<Option<String>>> = parse_json("wayback", body)?;
    Some(
        rows.into_iter()
            .skip(1)
            .filter_map(|row| {
                let mut fields = row.into_iter();
                let original = fields.next().flatten()?;
                let timestamp = fields.next().flatten().unwrap_or_default();
                Some(Capture { original, timestamp })
            })
            .collect(),
    )
}

pub fn sensitive_extension(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    SENSITIVE_EXTENSIONS.iter().copied().find(|ext| lower.contains(ext))
}

#[derive(Debug, Clone, Serialize)]
pub struct Wayback {
    pub domain: String,
    pub urls: bool,
    pub params: bool,
    pub files: bool,
    pub endpoints: bool,
}

impl Wayback {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            urls: true,
            params: true,
            files: true,
            endpoints: true,
        }
    }

    fn mine(&self, captures: &[Capture]) -> Vec<Finding> {
        let mut findings = Vec::new();

        if self.urls {
            let unique = dedup_preserving(captures.iter().map(|c| c.original.clone()));
            findings.extend(unique.into_iter().take(MAX_URLS).map(|url| {
                Finding::info(self.id(), FindingKind::Info, "Archived URL", url).with_subtitle("Found in Wayback Machine")
            }));
        }

        if self.params {
            let mut params: Vec<(String, HashSet<&str>)> = Vec::new();
            for capture in captures {
                let Ok(url) = Url::parse(&capture.original) else {
                    continue;
                };
                for (name, _) in url.query_pairs() {
                    match params.iter_mut().find(|(n, _)| *n == name) {
                        Some((_, urls)) => {
                            urls.insert(capture.original.as_str());
                        }
                        None => params.push((name.into_owned(), HashSet::from([capture.original.as_str()]))),
                    }
                }
            }
            findings.extend(params.into_iter().map(|(name, urls)| {
                Finding::low(self.id(), FindingKind::Parameter, format!("Parameter: {}", name), name.as_str())
                    .with_subtitle(format!("Found in {} URLs", urls.len()))
                    .with_detail("urls", urls.len())
            }));
        }

        if self.files {
            findings.extend(captures.iter().filter_map(|capture| {
                sensitive_extension(&capture.original).map(|ext| {
                    Finding::medium(self.id(), FindingKind::Secret, format!("Sensitive File: {}", ext), capture.archived())
                        .with_subtitle(capture.original.as_str())
                        .with_detail("extension", ext)
                })
            }));
        }

        if self.endpoints {
            let endpoints = dedup_preserving(
                captures
                    .iter()
                    .filter(|c| API_MARKERS.iter().any(|m| c.original.contains(m)))
                    .map(|c| c.original.clone()),
            );
            findings.extend(endpoints.into_iter().take(MAX_ENDPOINTS).map(|url| {
                Finding::info(self.id(), FindingKind::Endpoint, "API Endpoint", url).with_subtitle("Found in Wayback Machine")
            }));
        }
        findings
    }
}

#[async_trait]
impl Tool for Wayback {
    fn id(&self) -> ToolId {
        ToolId::Wayback
    }

    fn target(&self) -> &str {
        &self.domain
    }

    fn config(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn validate(&self) -> EngineResult<()> {
        require(&self.domain, "domain")?;
        if normalize_domain(&self.domain).is_empty() {
            return Err(EngineError::invalid_target(&self.domain, "no domain"));
        }
        Ok(())
    }

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        vec![
            ProbeDescriptor::get(wayback_cdx_url(&normalize_domain(&self.domain)), Purpose::Lookup)
                .with_label("cdx")
                .with_timeout(WAYBACK_TIMEOUT_MS),
        ]
    }

    fn classify(&self, _ctx: &mut RunContext, _probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        if !response.success || response.body.is_empty() {
            return Verdict::none();
        }
        match parse_captures(&response.body) {
            Some(captures) => Verdict::many(self.mine(&captures)),
            None => Verdict::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok};
    use crate::models::{RunStatus, Severity};
    use crate::tools::testing;

    const CDX: &str = r#"[
        ["original","timestamp","statuscode","mimetype"],
        ["https://t.io/search?q=a&page=2","20190101000000","200","text/html"],
        ["https://t.io/search?q=b","20190102000000","200","text/html"],
        ["https://t.io/backup.sql","20200101000000","200","application/sql"],
        ["https://t.io/api/v1/users?id=3","20210101000000","200","application/json"],
        [null,"20210101000000","200","text/html"]
    ]"#;

    #[test]
    fn test_parse_captures() {
        let captures = parse_captures(CDX).unwrap();
        assert_eq!(captures.len(), 4);
        assert_eq!(captures[2].archived(), "https://web.archive.org/web/20200101000000/https://t.io/backup.sql");
        assert!(parse_captures("<html>busy</html>").is_none());
    }

    #[test]
    fn test_sensitive_extension() {
        assert_eq!(sensitive_extension("https://t.io/.DS_Store"), Some(".ds_store"));
        assert_eq!(sensitive_extension("https://t.io/db.sql.gz"), Some(".sql"));
        assert_eq!(sensitive_extension("https://t.io/index.html"), None);
    }

    #[tokio::test]
    async fn test_mine_archive() {
        let transport = MockTransport::new(|_| ok(200, CDX));
        let run = testing::run(&Wayback::new("www.t.io"), transport.clone()).await;
        assert_eq!(run.status, RunStatus::Completed);
        assert!(transport.requests()[0].url.contains("url=*.t.io/*"));

        let find = |title: &str| run.findings.iter().find(|f| f.title == title).unwrap();
        assert_eq!(run.findings[0].severity, Severity::Medium);
        assert_eq!(run.findings[0].title, "Sensitive File: .sql");
        assert_eq!(find("Parameter: q").subtitle, "Found in 2 URLs");
        assert_eq!(find("Parameter: id").severity, Severity::Low);
        assert_eq!(find("API Endpoint").value, "https://t.io/api/v1/users?id=3");
        assert_eq!(run.findings.iter().filter(|f| f.title == "Archived URL").count(), 4);
    }
}
