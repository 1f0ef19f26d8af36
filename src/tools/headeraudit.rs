use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::{parse_url, require};
use crate::error::EngineResult;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, Severity, ToolId};
use crate::scanner::{RunContext, Tool, Verdict};

const FETCH_TIMEOUT_MS: u64 = 10_000;
const ONE_YEAR_SECS: u64 = 31_536_000;

static MAX_AGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"max-age=(\d+)").expect("static pattern"));

struct SecurityHeader {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    severity: Severity,
    recommendation: &'static str,
}

const SECURITY_HEADERS: &[SecurityHeader] = &[
    SecurityHeader {
        key: "strict-transport-security",
        name: "Strict-Transport-Security (HSTS)",
        description: "Enforces HTTPS connections",
        severity: Severity::High,
        recommendation: "Add: Strict-Transport-Security: max-age=31536000; includeSubDomains; preload",
    },
    SecurityHeader {
        key: "content-security-policy",
        name: "Content-Security-Policy (CSP)",
        description: "Prevents XSS and data injection attacks",
        severity: Severity::High,
        recommendation: "Add a strict CSP header to control resource loading",
    },
    SecurityHeader {
        key: "x-content-type-options",
        name: "X-Content-Type-Options",
        description: "Prevents MIME type sniffing",
        severity: Severity::Medium,
        recommendation: "Add: X-Content-Type-Options: nosniff",
    },
    SecurityHeader {
        key: "x-frame-options",
        name: "X-Frame-Options",
        description: "Prevents clickjacking attacks",
        severity: Severity::Medium,
        recommendation: "Add: X-Frame-Options: DENY or SAMEORIGIN",
    },
    SecurityHeader {
        key: "x-xss-protection",
        name: "X-XSS-Protection",
        description: "Legacy XSS filter (use CSP instead)",
        severity: Severity::Low,
        recommendation: "Add: X-XSS-Protection: 1; mode=block (or rely on CSP)",
    },
    SecurityHeader {
        key: "referrer-policy",
        name: "Referrer-Policy",
        description: "Controls referrer information leakage",
        severity: Severity::Low,
        recommendation: "Add: Referrer-Policy: strict-origin-when-cross-origin",
    },
    SecurityHeader {
        key: "permissions-policy",
        name: "Permissions-Policy",
        description: "Controls browser features and APIs",
        severity: Severity::Low,
        recommendation: "Add: Permissions-Policy: geolocation=(), camera=(), microphone=()",
    },
    SecurityHeader {
        key: "cache-control",
        name: "Cache-Control",
        description: "Controls caching of sensitive data",
        severity: Severity::Low,
        recommendation: "For sensitive pages: Cache-Control: no-store, no-cache, must-revalidate",
    },
];

const INFO_LEAK_HEADERS: &[&str] = &[
    "server",
    "x-powered-by",
    "x-aspnet-version",
    "x-aspnetmvc-version",
    "x-generator",
    "x-drupal-cache",
    "x-varnish",
    "via",
];

pub fn weaknesses(key: &str, value: &str) -> Vec<&'static str> {
    let lower = value.to_lowercase();
    let mut issues = Vec::new();

    match key {
        "strict-transport-security" => {
            if !lower.contains("max-age") {
                issues.push("Missing max-age directive");
            } else {
                let max_age = MAX_AGE
                    .captures(&lower)
                    .and_then(|c| c[1].parse::<u64>().ok())
                    .unwrap_or(0);
                if max_age < ONE_YEAR_SECS {
                    issues.push("max-age should be at least 1 year (31536000)");
                }
            }
            if !lower.contains("includesubdomains") {
                issues.push("Consider adding includeSubDomains");
            }
        }
        "content-security-policy" => {
            if lower.contains("'unsafe-inline'") {
                issues.push("Contains 'unsafe-inline' which weakens XSS protection");
            }
            if lower.contains("'unsafe-eval'") {
                issues.push("Contains 'unsafe-eval' which allows code execution");
            }
            if lower.contains('*') {
                issues.push("Contains wildcard (*) which is too permissive");
            }
        }
        "x-frame-options" => {
            if lower != "deny" && lower != "sameorigin" {
                issues.push("Should be DENY or SAMEORIGIN");
            }
        }
        "x-content-type-options" => {
            if lower != "nosniff" {
                issues.push("Value should be \"nosniff\"");
            }
        }
        _ => {}
    }
    issues
}

#[derive(Debug, Clone, Serialize)]
pub struct HeaderAudit {
    pub url: String,
}

impl HeaderAudit {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn security_findings(&self, response: &ResponseRecord) -> Vec<Finding> {
        SECURITY_HEADERS
            .iter()
            .map(|header| {
                let finding = match response.header(header.key) {
                    None => Finding::new(
                        self.id(),
                        FindingKind::Warning,
                        header.severity,
                        format!("Missing: {}", header.name),
                        header.recommendation,
                    )
                    .with_subtitle(header.description),
                    Some(value) => {
                        let issues = weaknesses(header.key, value);
                        if issues.is_empty() {
                            Finding::info(self.id(), FindingKind::Info, format!("Present: {}", header.name), value)
                                .with_subtitle("Header is configured")
                        } else {
                            Finding::medium(self.id(), FindingKind::Warning, format!("Weak: {}", header.name), value)
                                .with_subtitle(issues.join("; "))
                        }
                    }
                };
                finding.with_detail("header", header.key)
            })
            .collect()
    }

    fn leak_findings(&self, response: &ResponseRecord) -> Vec<Finding> {
        INFO_LEAK_HEADERS
            .iter()
            .filter_map(|name| {
                response.header(name).map(|value| {
                    Finding::low(self.id(), FindingKind::Warning, format!("Info Leak: {}", name), value)
                        .with_subtitle("This header reveals server information")
                })
            })
            .collect()
    }

    fn policy_findings(&self, response: &ResponseRecord) -> Vec<Finding> {
        let mut findings = Vec::new();

        if let Some(cookie) = response.header("set-cookie") {
            let lower = cookie.to_lowercase();
            if !lower.contains("httponly") || !lower.contains("secure") {
                findings.push(
                    Finding::medium(self.id(), FindingKind::Warning, "Cookie Security Issue", cookie)
                        .with_subtitle("Cookie missing HttpOnly or Secure flag"),
                );
            }
        }
        if let Some(origin) = response.header("access-control-allow-origin").filter(|v| *v == "*") {
            findings.push(
                Finding::medium(self.id(), FindingKind::Warning, "CORS Wildcard", origin)
                    .with_subtitle("Access-Control-Allow-Origin allows any origin"),
            );
        }
        if let Some(creds) = response
            .header("access-control-allow-credentials")
            .filter(|v| v.eq_ignore_ascii_case("true"))
        {
            findings.push(
                Finding::medium(self.id(), FindingKind::Warning, "CORS Credentials", creds)
                    .with_subtitle("Credentials allowed with CORS"),
            );
        }
        findings
    }
}

#[async_trait]
impl Tool for HeaderAudit {
    fn id(&self) -> ToolId {
        ToolId::HeaderAudit
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
        match parse_url(&self.url) {
            Ok(url) => vec![
                ProbeDescriptor::get(url.as_str(), Purpose::Fingerprint)
                    .with_label("audit")
                    .with_timeout(FETCH_TIMEOUT_MS),
            ],
            Err(_) => Vec::new(),
        }
    }

    fn classify(&self, _ctx: &mut RunContext, _probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        if !response.success {
            return Verdict::none();
        }
        let mut findings = self.security_findings(response);
        findings.extend(self.leak_findings(response));
        findings.extend(self.policy_findings(response));
        Verdict::many(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok_with_headers, refused};
    use crate::models::RunStatus;
    use crate::tools::testing;

    #[test]
    fn test_weaknesses() {
        assert!(weaknesses("strict-transport-security", "max-age=63072000; includeSubDomains").is_empty());
        assert_eq!(
            weaknesses("strict-transport-security", "max-age=300"),
            vec!["max-age should be at least 1 year (31536000)", "Consider adding includeSubDomains"]
        );
        assert_eq!(weaknesses("content-security-policy", "default-src * 'unsafe-inline'").len(), 2);
        assert!(weaknesses("x-frame-options", "SAMEORIGIN").is_empty());
        assert_eq!(weaknesses("x-frame-options", "ALLOW-FROM https://a"), vec!["Should be DENY or SAMEORIGIN"]);
        assert!(weaknesses("referrer-policy", "unsafe-url").is_empty());
    }

    #[tokio::test]
    async fn test_audit_single_response() {
        let transport = MockTransport::new(|_| {
            ok_with_headers(
                200,
                &[
                    ("Strict-Transport-Security", "max-age=31536000; includeSubDomains"),
                    ("X-Frame-Options", "ALLOWALL"),
                    ("Server", "nginx/1.25"),
                    ("Set-Cookie", "sid=abc; Path=/; HttpOnly"),
                    ("Access-Control-Allow-Origin", "*"),
                ],
                "<html></html>",
            )
        });

        let run = testing::run(&HeaderAudit::new("t.io"), transport.clone()).await;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(transport.requests()[0].url, "https://t.io/");

        let titles: Vec<_> = run.findings.iter().map(|f| (f.severity, f.title.as_str())).collect();
        assert_eq!(titles[0], (Severity::High, "Missing: Content-Security-Policy (CSP)"));
        assert!(titles.contains(&(Severity::Medium, "Weak: X-Frame-Options")));
        assert!(titles.contains(&(Severity::Medium, "Cookie Security Issue")));
        assert!(titles.contains(&(Severity::Medium, "CORS Wildcard")));
        assert!(titles.contains(&(Severity::Low, "Info Leak: server")));
        assert_eq!(titles.last(), Some(&(Severity::Info, "Present: Strict-Transport-Security (HSTS)")));
        // 8 security headers, 1 leak, cookie and CORS
        assert_eq!(run.findings.len(), 11);
    }

    #[tokio::test]
    async fn test_unreachable_target() {
        let run = testing::run(&HeaderAudit::new("https://t.io"), MockTransport::new(|_| refused())).await;
        assert!(run.findings.is_empty());
        assert_eq!(run.note.as_deref(), Some("target unreachable"));
    }
}
