use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use super::require;
use crate::error::EngineResult;
use crate::http::EgressClient;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, ToolId};
use crate::scanner::{Preparation, RunContext, Tool, Verdict};
use crate::signatures::{CODE_SCAN_LIMIT, MARKUP_SCAN_LIMIT, bounded};

const SCRIPT_TIMEOUT_MS: u64 = 15_000;
const MIN_SECRET_LEN: usize = 8;
const SECRET_DISPLAY_LIMIT: usize = 50;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
}

static ENDPOINT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)["'`](/api/[^"'`\s<>]+)["'`]"#,
        r#"(?i)["'`](/v[0-9]+/[^"'`\s<>]+)["'`]"#,
        r#"(?i)["'`](/graphql[^"'`\s<>]*)["'`]"#,
        r#"(?i)["'`](/rest/[^"'`\s<>]+)["'`]"#,
        r#"(?i)["'`](/ajax/[^"'`\s<>]+)["'`]"#,
        r#"(?i)["'`](/json/[^"'`\s<>]+)["'`]"#,
        r#"(?i)fetch\s*\(\s*["'`]([^"'`]+)["'`]"#,
        r#"(?i)axios\s*[.(]\s*(?:get|post|put|delete|patch)\s*\(\s*["'`]([^"'`]+)["'`]"#,
        r#"(?i)\$\.(?:ajax|get|post)\s*\(\s*["'`]([^"'`]+)["'`]"#,
        r#"(?i)\.open\s*\(\s*["'`](?:GET|POST|PUT|DELETE)["'`]\s*,\s*["'`]([^"'`]+)["'`]"#,
        r#"(?i)url\s*[:=]\s*["'`]([^"'`]+api[^"'`]+)["'`]"#,
    ])
});

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)["'`]?(?:api[_-]?key|apikey)["'`]?\s*[:=]\s*["'`]([a-zA-Z0-9_\-]{20,})["'`]"#,
        r#"(?i)["'`]?(?:secret[_-]?key|secretkey)["'`]?\s*[:=]\s*["'`]([a-zA-Z0-9_\-]{20,})["'`]"#,
        r#"(?i)["'`]?(?:access[_-]?token|accesstoken)["'`]?\s*[:=]\s*["'`]([a-zA-Z0-9_\-.]{20,})["'`]"#,
        r#"(?i)["'`]?(?:auth[_-]?token|authtoken)["'`]?\s*[:=]\s*["'`]([a-zA-Z0-9_\-.]{20,})["'`]"#,
        r#"(?i)["'`]?(?:private[_-]?key|privatekey)["'`]?\s*[:=]\s*["'`]([^"'`]{20,})["'`]"#,
        r#"(?i)["'`]?password["'`]?\s*[:=]\s*["'`]([^"'`]{6,})["'`]"#,
        r#"(?i)aws[_-]?access[_-]?key[_-]?id\s*[:=]\s*["'`]?(AKIA[A-Z0-9]{16})["'`]?"#,
        r#"(?i)aws[_-]?secret[_-]?access[_-]?key\s*[:=]\s*["'`]?([a-zA-Z0-9+/]{40})["'`]?"#,
        r"ghp_[a-zA-Z0-9]{36}",
        r"gho_[a-zA-Z0-9]{36}",
        r"github_pat_[a-zA-Z0-9]{22}_[a-zA-Z0-9]{59}",
        r"sk-[a-zA-Z0-9]{48}",
        r"sk_live_[a-zA-Z0-9]{24}",
        r"sk_test_[a-zA-Z0-9]{24}",
        r"sq0csp-[a-zA-Z0-9_\-]{43}",
        r"SG\.[a-zA-Z0-9_\-]{22}\.[a-zA-Z0-9_\-]{43}",
        r"xox[baprs]-[a-zA-Z0-9\-]{10,}",
        r"ya29\.[a-zA-Z0-9_\-]{68,}",
        r"eyJ[a-zA-Z0-9_\-]*\.eyJ[a-zA-Z0-9_\-]*\.[a-zA-Z0-9_\-]*",
    ])
});

static DOMAIN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)https?://((?:[a-z0-9][-a-z0-9]*\.)+[a-z]{2,})",
        r#"(?i)["'`]((?:[a-z0-9][-a-z0-9]*\.)+(?:com|org|net|io|co|dev|app|xyz|cloud|ai))["'`]"#,
    ])
});

static PATH_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[r#"["'`](/[a-zA-Z0-9_\-]+(?:/[a-zA-Z0-9_\-]+)+)["'`]"#]));

static EMAIL_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}"]));

static IP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b",
        r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}(?::[0-9]{1,5})?\b",
    ])
});

static SCRIPT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("static pattern"));
static SRC_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#).expect("static pattern"));
static TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static pattern"));

/// Prefix-based names for well-known credential formats.
const SECRET_LABELS: &[(&str, &str)] = &[
    ("AKIA", "AWS Access Key"),
    ("ghp_", "GitHub Token"),
    ("gho_", "GitHub Token"),
    ("github_pat_", "GitHub Token"),
    ("sk-", "OpenAI API Key"),
    ("sk_live_", "Stripe Live Key"),
    ("sk_test_", "Stripe Test Key"),
    ("eyJ", "JWT Token"),
    ("xox", "Slack Token"),
    ("SG.", "SendGrid Key"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    Inline(String),
    External(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
    pub document: String,
}

/// `None` from either method means the page could not be obtained.
#[async_trait]
pub trait PageContent: Send + Sync {
    fn location(&self) -> &str;

    async fn scripts(&self) -> Option<Vec<ScriptSource>>;

    async fn page_info(&self) -> Option<PageInfo>;
}

pub fn extract_scripts(html: &str, location: &str) -> Vec<ScriptSource> {
    let base = Url::parse(location).ok();
    SCRIPT_TAG
        .captures_iter(html)
        .filter_map(|tag| {
            let attrs = tag.get(1).map_or("", |m| m.as_str());
            match SRC_ATTR.captures(attrs).and_then(|c| c.get(1)) {
                Some(src) => {
                    let resolved = match &base {
                        Some(base) => base.join(src.as_str()).ok()?.to_string(),
                        None => src.as_str().to_string(),
                    };
                    Some(ScriptSource::External(resolved))
                }
                None => {
                    let body = tag.get(2).map_or("", |m| m.as_str());
                    (!body.trim().is_empty()).then(|| ScriptSource::Inline(body.to_string()))
                }
            }
        })
        .collect()
}

pub struct RemotePage {
    client: EgressClient,
    url: String,
    response: OnceCell<ResponseRecord>,
}

impl RemotePage {
    pub fn new(client: EgressClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            response: OnceCell::new(),
        }
    }

    async fn load(&self) -> Option<&ResponseRecord> {
        let response = self
            .response
            .get_or_init(|| async {
                debug!(url = %self.url, "loading page");
                self.client.get(&self.url, None).await
            })
            .await;
        response.success.then_some(response)
    }

    fn base(&self, response: &ResponseRecord) -> String {
        if response.final_url.is_empty() {
            self.url.clone()
        } else {
            response.final_url.clone()
        }
    }
}

#[async_trait]
impl PageContent for RemotePage {
    fn location(&self) -> &str {
        &self.url
    }

    async fn scripts(&self) -> Option<Vec<ScriptSource>> {
        let response = self.load().await?;
        Some(extract_scripts(&response.body, &self.base(response)))
    }

    async fn page_info(&self) -> Option<PageInfo> {
        let response = self.load().await?;
        let title = TITLE_TAG
            .captures(&response.body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        Some(PageInfo {
            url: self.base(response),
            title,
            document: response.body.clone(),
        })
    }
}

fn matches<'a>(patterns: &'a [Regex], text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    patterns.iter().flat_map(move |pattern| {
        pattern
            .captures_iter(text)
            .filter_map(|c| c.get(1).or_else(|| c.get(0)).map(|m| m.as_str()))
    })
}

pub fn secret_label(value: &str) -> &'static str {
    SECRET_LABELS
        .iter()
        .find(|(prefix, _)| value.starts_with(prefix))
        .map_or("Potential Secret", |(_, label)| label)
}

fn display_secret(value: &str) -> String {
    if value.chars().count() > SECRET_DISPLAY_LIMIT {
        format!("{}...", value.chars().take(SECRET_DISPLAY_LIMIT - 3).collect::<String>())
    } else {
        value.to_string()
    }
}

fn is_noise_ip(value: &str) -> bool {
    value.starts_with("0.") || value.starts_with("127.")
}

pub struct JsHunter {
    pub page: Arc<dyn PageContent>,
    pub deep_scan: bool,
    pub endpoints: bool,
    pub secrets: bool,
    pub domains: bool,
    pub paths: bool,
}

impl JsHunter {
    pub fn new(page: Arc<dyn PageContent>) -> Self {
        Self {
            page,
            deep_scan: false,
            endpoints: true,
            secrets: true,
            domains: true,
            paths: true,
        }
    }

    pub fn analyze(&self, content: &str, source: &str, limit: usize) -> Vec<Finding> {
        let text = bounded(content, limit);
        let found_in = format!("Found in {}", source);
        let mut seen: HashSet<(&'static str, String)> = HashSet::new();
        let mut findings = Vec::new();
        let mut keep = |category: &'static str, value: &str, finding: Finding| {
            if seen.insert((category, value.to_string())) {
                findings.push(finding.with_subtitle(found_in.as_str()).with_detail("source", source));
            }
        };

        if self.endpoints {
            for value in matches(&ENDPOINT_PATTERNS, text) {
                keep("endpoint", value, Finding::info(self.id(), FindingKind::Endpoint, "API Endpoint", value));
            }
        }

        if self.secrets {
            for value in matches(&SECRET_PATTERNS, text).filter(|v| v.len() >= MIN_SECRET_LEN) {
                let label = secret_label(value);
                let finding = if label == "JWT Token" {
                    Finding::medium(self.id(), FindingKind::Secret, label, display_secret(value))
                } else {
                    Finding::high(self.id(), FindingKind::Secret, label, display_secret(value))
                };
                keep("secret", value, finding);
            }
        }

        if self.domains {
            for value in matches(&DOMAIN_PATTERNS, text) {
                keep("domain", value, Finding::info(self.id(), FindingKind::Domain, "Domain", value));
            }
        }

        if self.paths {
            for value in matches(&PATH_PATTERNS, text).filter(|v| v.len() > 3) {
                keep("path", value, Finding::info(self.id(), FindingKind::Endpoint, "Path", value));
            }
        }

        for value in matches(&EMAIL_PATTERNS, text) {
            keep("email", value, Finding::low(self.id(), FindingKind::Info, "Email Address", value));
        }

        for value in matches(&IP_PATTERNS, text).filter(|v| !is_noise_ip(v)) {
            keep("ip", value, Finding::low(self.id(), FindingKind::Info, "IP Address", value));
        }

        findings
    }
}

#[async_trait]
impl Tool for JsHunter {
    fn id(&self) -> ToolId {
        ToolId::JsHunter
    }

    fn target(&self) -> &str {
        self.page.location()
    }

    fn config(&self) -> Value {
        json!({
            "url": self.page.location(),
            "deep_scan": self.deep_scan,
            "endpoints": self.endpoints,
            "secrets": self.secrets,
            "domains": self.domains,
            "paths": self.paths,
        })
    }

    fn validate(&self) -> EngineResult<()> {
        require(self.page.location(), "url")
    }

    async fn prepare(&self, _client: &EgressClient, ctx: &mut RunContext) -> Preparation {
        let Some(scripts) = self.page.scripts().await else {
            return Preparation::Unreachable(format!("could not load {}", self.page.location()));
        };
        if scripts.is_empty() {
            debug!(url = %self.page.location(), "no scripts on page");
            return Preparation::Ready;
        }

        for script in &scripts {
            match script {
                ScriptSource::Inline(code) => {
                    for finding in self.analyze(code, "inline", CODE_SCAN_LIMIT) {
                        ctx.emit(finding);
                    }
                }
                ScriptSource::External(src) if self.deep_scan => ctx.discovered.push(src.clone()),
                ScriptSource::External(_) => {}
            }
        }

        if let Some(info) = self.page.page_info().await {
            for finding in self.analyze(&info.document, "HTML", MARKUP_SCAN_LIMIT) {
                ctx.emit(finding);
            }
        }
        Preparation::Ready
    }

    fn candidates(&self, ctx: &RunContext) -> Vec<ProbeDescriptor> {
        ctx.discovered
            .iter()
            .map(|src| {
                ProbeDescriptor::get(src.as_str(), Purpose::Fingerprint)
                    .with_label("script")
                    .with_timeout(SCRIPT_TIMEOUT_MS)
            })
            .collect()
    }

    fn classify(&self, _ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        if !response.success {
            debug!(url = %probe.url, error = ?response.error, "could not fetch script");
            return Verdict::none();
        }
        Verdict::many(self.analyze(&response.body, &probe.url, CODE_SCAN_LIMIT))
    }
}
