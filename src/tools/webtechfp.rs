use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{parse_url, require};
use crate::error::EngineResult;
use crate::generator::dedup_preserving;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, ToolId};
use crate::reporter::GroupView;
use crate::scanner::{RunContext, Tool, Verdict};
use crate::signatures::{MARKUP_SCAN_LIMIT, TechCategory, bounded, fingerprint};

const FETCH_TIMEOUT_MS: u64 = 15_000;

static META_GENERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*name=["']generator["'][^>]*content=["']([^"']+)["']"#).expect("static pattern")
});
static META_POWERED_BY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*name=["']powered-by["'][^>]*content=["']([^"']+)["']"#).expect("static pattern")
});
static SCRIPT_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<script[^>]*src=["']([^"']+)["']"#).expect("static pattern"));

const CDN_HOSTS: &[(&str, &str)] = &[
    ("cdnjs.cloudflare.com", "cdnjs"),
    ("unpkg.com", "unpkg"),
    ("jsdelivr.net", "jsDelivr"),
    ("maxcdn.bootstrapcdn.com", "Bootstrap CDN"),
    ("ajax.googleapis.com", "Google CDN"),
    ("code.jquery.com", "jQuery CDN"),
];

const VERSION_HEADERS: &[&str] = &["x-aspnet-version", "x-aspnetmvc-version", "x-runtime", "x-version", "x-generator", "x-cms"];

pub fn script_sources(html: &str) -> Vec<String> {
    SCRIPT_SRC
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn external_script_hosts(sources: &[String]) -> Vec<String> {
    let Ok(base) = Url::parse("https://localhost/") else {
        return Vec::new();
    };
    dedup_preserving(
        sources
            .iter()
            .filter(|src| src.starts_with("http") || src.starts_with("//"))
            .filter_map(|src| base.join(src).ok())
            .filter_map(|url| url.host_str().map(str::to_string)),
    )
}

pub fn by_category(findings: &[Finding]) -> GroupView<'_> {
    GroupView::by_detail(findings, "category")
}

#[derive(Debug, Clone, Serialize)]
pub struct WebTechFp {
    pub url: String,
    pub categories: Vec<TechCategory>,
}

impl WebTechFp {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            categories: TechCategory::ALL.to_vec(),
        }
    }

    fn signature_findings(&self, html: &str, response: &ResponseRecord, sources: &[String]) -> Vec<Finding> {
        let body = bounded(html, MARKUP_SCAN_LIMIT).to_lowercase();
        let headers = response.header_text().to_lowercase();
        let scripts = sources.join("\n").to_lowercase();

        fingerprint(&self.categories, &body, &headers, &scripts)
            .into_iter()
            .map(|hit| {
                let shown: Vec<&str> = hit.evidence.iter().take(2).map(String::as_str).collect();
                Finding::info(self.id(), FindingKind::Technology, hit.name, hit.name)
                    .with_subtitle(format!("Confidence: {}% | {}", hit.confidence, shown.join(", ")))
                    .with_detail("category", hit.category.label())
                    .with_detail("confidence", hit.confidence)
                    .with_detail("evidence", hit.evidence)
            })
            .collect()
    }

    fn markup_findings(&self, html: &str, sources: &[String]) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (pattern, title, subtitle) in [
            (&*META_GENERATOR, "Generator", "From meta generator tag"),
            (&*META_POWERED_BY, "Powered By", "From meta tag"),
        ] {
            if let Some(value) = pattern.captures(html).and_then(|c| c.get(1)) {
                findings.push(
                    Finding::info(self.id(), FindingKind::Technology, title, value.as_str())
                        .with_subtitle(subtitle)
                        .with_detail("category", "Meta"),
                );
            }
        }

        for (host, name) in CDN_HOSTS {
            if html.contains(host) {
                findings.push(
                    Finding::info(self.id(), FindingKind::Info, "CDN Used", *name)
                        .with_subtitle(*host)
                        .with_detail("category", "CDN"),
                );
            }
        }

        let hosts = external_script_hosts(sources);
        if !hosts.is_empty() {
            findings.push(
                Finding::info(self.id(), FindingKind::Info, "External Script Domains", format!("{} domains", hosts.len()))
                    .with_subtitle(hosts.iter().take(5).cloned().collect::<Vec<_>>().join(", "))
                    .with_detail("category", "Scripts")
                    .with_detail("domains", hosts),
            );
        }
        findings
    }

    fn header_findings(&self, response: &ResponseRecord) -> Vec<Finding> {
        let mut findings = Vec::new();

        if let Some(server) = response.header("server") {
            findings.push(
                Finding::info(self.id(), FindingKind::Info, "Server", server)
                    .with_subtitle("From Server header")
                    .with_detail("category", "Headers"),
            );
        }

        let powered_by = response.header("x-powered-by");
        if let Some(value) = powered_by {
            findings.push(
                Finding::low(self.id(), FindingKind::Info, "X-Powered-By", value)
                    .with_subtitle("Technology disclosure")
                    .with_detail("category", "Headers"),
            );
        }

        for name in VERSION_HEADERS {
            if let Some(value) = response.header(name) {
                findings.push(
                    Finding::low(self.id(), FindingKind::Warning, format!("Header: {}", name), value)
                        .with_subtitle("Version disclosure")
                        .with_detail("category", "Headers"),
                );
            }
        }

        let powered_by = powered_by.unwrap_or_default().to_lowercase();
        let language = if powered_by.contains("php") {
            Some("PHP")
        } else if powered_by.contains("asp.net") {
            Some("ASP.NET")
        } else {
            None
        };
        if let Some(language) = language {
            findings.push(
                Finding::info(self.id(), FindingKind::Technology, "Programming Language", language)
                    .with_subtitle("Detected from headers")
                    .with_detail("category", "Language"),
            );
        }
        findings
    }
}

#[async_trait]
impl Tool for WebTechFp {
    fn id(&self) -> ToolId {
        ToolId::WebTechFp
    }

    fn target(&self) -> &str {
        &self.url
    }

    fn config(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn validate(&self) -> EngineResult<()> {
        require(&self.url, "url")?;
        parse_url(&self.url).map(|_| ())
    }

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        parse_url(&self.url)
            .map(|url| {
                vec![
                    ProbeDescriptor::get(url.as_str(), Purpose::Fingerprint)
                        .with_label("page")
                        .with_timeout(FETCH_TIMEOUT_MS),
                ]
            })
            .unwrap_or_default()
    }

    fn classify(&self, _ctx: &mut RunContext, _probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        if !response.success {
            return Verdict::none();
        }
        let html = response.body.as_str();
        let sources = script_sources(bounded(html, MARKUP_SCAN_LIMIT));

        let mut findings = self.signature_findings(html, response, &sources);
        findings.extend(self.markup_findings(html, &sources));
        findings.extend(self.header_findings(response));
        Verdict::many(findings)
    }
}
