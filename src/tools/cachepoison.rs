use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use super::{add_query_param, parse_url, require};
use crate::error::EngineResult;
use crate::generator::HeaderFanout;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, ToolId};
use crate::scanner::{RunContext, Tool, Verdict};
use crate::signatures::Category;

pub const CACHE_BUSTER: &str = "thcb";
const MARKER_PREFIX: &str = "poison-test-";
const PROBE_TIMEOUT_MS: u64 = 10_000;
const LONG_CACHE_SECS: u64 = 86_400;

const STATUS_HEADERS: &[&str] = &["x-cache", "cf-cache-status", "x-cache-status", "x-cache-hit"];

static MAX_AGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"max-age=(\d+)").expect("static pattern"));

pub fn cache_control_findings(tool: ToolId, value: &str) -> Vec<Finding> {
    let lower = value.to_lowercase();
    let directives: Vec<&str> = lower.split(',').map(str::trim).collect();
    let mut findings = Vec::new();

    if directives.contains(&"no-store") {
        findings.push(
            Finding::info(tool, FindingKind::Info, "Cache-Control: no-store", value)
                .with_subtitle("Response should not be cached"),
        );
    } else if directives.contains(&"private") {
        findings.push(
            Finding::info(tool, FindingKind::Info, "Cache-Control: private", value)
                .with_subtitle("Only browser cache, not CDN/proxy"),
        );
    } else if directives.contains(&"public") {
        findings.push(
            Finding::low(tool, FindingKind::Warning, "Cache-Control: public", value)
                .with_subtitle("Response can be cached by proxies"),
        );
    }

    if let Some(max_age) = MAX_AGE.captures(&lower).and_then(|c| c[1].parse::<u64>().ok()) {
        if max_age > LONG_CACHE_SECS {
            findings.push(
                Finding::info(
                    tool,
                    FindingKind::Info,
                    "Long Cache Duration",
                    format!("max-age={} ({}h)", max_age, (max_age + 1800) / 3600),
                )
                .with_subtitle("Extended cache duration"),
            );
        }
    }
    findings
}

#[derive(Debug, Clone, Serialize)]
pub struct CachePoison {
    pub url: String,
    pub detect_cache: bool,
    pub unkeyed_headers: bool,
    pub param_pollution: bool,
    pub fat_get: bool,
}

impl CachePoison {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            detect_cache: true,
            unkeyed_headers: true,
            param_pollution: true,
            fat_get: true,
        }
    }

    fn pollution_urls(url: &Url, buster: &str) -> Vec<String> {
        let base = format!("{}{}", url.origin().ascii_serialization(), url.path());
        [
            format!("?{}={}&test=1&test=2", CACHE_BUSTER, buster),
            format!("?test=normal&{}={}&test=poison", CACHE_BUSTER, buster),
            format!("?{}={}&callback=test&callback=<script>", CACHE_BUSTER, buster),
        ]
        .into_iter()
        .map(|query| format!("{}{}", base, query))
        .collect()
    }

    fn classify_cache_layer(&self, ctx: &RunContext, response: &ResponseRecord) -> Vec<Finding> {
        let hits = ctx.registry.matches(Category::CacheHeaders, &response.header_text());
        if hits.is_empty() {
            return vec![
                Finding::info(self.id(), FindingKind::Info, "No Cache Headers", "No obvious cache layer detected")
                    .with_subtitle("May still have caching (check behavior)"),
            ];
        }

        let lines: Vec<String> = hits.iter().map(|h| format!("{}: {}", h.id, h.matched)).collect();
        let headers: Map<String, Value> = hits
            .iter()
            .map(|h| (h.id.to_string(), Value::String(h.matched.clone())))
            .collect();
        let mut findings = vec![
            Finding::info(self.id(), FindingKind::Info, "Cache Layer Detected", lines.iter().take(3).cloned().collect::<Vec<_>>().join(", "))
                .with_subtitle(format!("{} cache-related headers found", hits.len()))
                .with_detail("headers", Value::Object(headers)),
        ];

        if let Some(status) = STATUS_HEADERS.iter().find_map(|name| response.header(name)) {
            let lower = status.to_lowercase();
            if lower.contains("hit") {
                findings.push(
                    Finding::info(self.id(), FindingKind::Info, "Cache HIT", status).with_subtitle("Response served from cache"),
                );
            } else if lower.contains("miss") {
                findings.push(
                    Finding::info(self.id(), FindingKind::Info, "Cache MISS", status)
                        .with_subtitle("Response not cached (or first request)"),
                );
            }
        }

        if let Some(cache_control) = response.header("cache-control") {
            findings.extend(cache_control_findings(self.id(), cache_control));
        }
        findings
    }

    fn classify_unkeyed(&self, header: &str, probe: &ProbeDescriptor, response: &ResponseRecord) -> Option<Finding> {
        if !response.success || response.body.is_empty() {
            return None;
        }
        let marker = probe.headers.get(header)?;
        if response.body.contains(marker.as_str()) {
            return Some(
                Finding::high(self.id(), FindingKind::Vulnerability, "Unkeyed Header Reflected", header)
                    .with_subtitle("Header value reflected in response - potential cache poisoning!")
                    .with_detail("marker", marker.as_str()),
            );
        }

        let lower = response.body.to_lowercase();
        let influenced = lower.contains(MARKER_PREFIX)
            || lower.contains("href=\"http://poison")
            || lower.contains("href='http://poison");
        influenced.then(|| {
            Finding::medium(self.id(), FindingKind::Warning, "Possible Unkeyed Header", header)
                .with_subtitle("Header may influence response content")
        })
    }
}

#[async_trait]
impl Tool for CachePoison {
    fn id(&self) -> ToolId {
        ToolId::CachePoison
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
        let Ok(url) = parse_url(&self.url) else {
            return Vec::new();
        };
        let buster = Utc::now().timestamp_millis().to_string();
        let busted = add_query_param(url.as_str(), CACHE_BUSTER, &buster);
        let mut probes = Vec::new();

        if self.detect_cache {
            probes.push(
                ProbeDescriptor::get(busted.clone(), Purpose::Fingerprint)
                    .with_label("detect")
                    .with_timeout(PROBE_TIMEOUT_MS),
            );
        }

        if self.unkeyed_headers {
            probes.extend(HeaderFanout::UNKEYED.iter().enumerate().map(|(i, header)| {
                ProbeDescriptor::get(busted.clone(), Purpose::HeaderBypass)
                    .with_header(*header, format!("{}{}{}", MARKER_PREFIX, buster, i))
                    .with_label(format!("unkeyed:{}", header))
                    .with_timeout(PROBE_TIMEOUT_MS)
            }));
        }

        if self.param_pollution {
            probes.extend(Self::pollution_urls(&url, &buster).into_iter().map(|polluted| {
                ProbeDescriptor::get(polluted, Purpose::PayloadInjection)
                    .with_label("pollution")
                    .in_group("pollution")
                    .with_timeout(PROBE_TIMEOUT_MS)
            }));
        }

        if self.fat_get {
            probes.push(
                ProbeDescriptor::get(busted, Purpose::PayloadInjection)
                    .with_header("Content-Type", "application/x-www-form-urlencoded")
                    .with_body("test=poisoned")
                    .with_label("fatget")
                    .with_timeout(PROBE_TIMEOUT_MS),
            );
        }
        probes
    }

    fn classify(&self, ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        match probe.label_parts() {
            ("detect", _) if response.success => Verdict::many(self.classify_cache_layer(ctx, response)),
            ("unkeyed", header) => self.classify_unkeyed(header, probe, response).into(),
            ("pollution", _) if response.success && (response.body.contains("test=2") || response.body.contains("test=poison")) => {
                Verdict::one(
                    Finding::medium(self.id(), FindingKind::Warning, "Parameter Pollution Possible", probe.url.clone())
                        .with_subtitle("Duplicate parameters may cause issues"),
                )
                .settled()
            }
            ("fatget", _) if response.success => {
                let subtitle = if response.body.contains("poisoned") {
                    "Body parameter reflected in GET response"
                } else {
                    "GET with body accepted"
                };
                Verdict::one(
                    Finding::info(self.id(), FindingKind::Info, "Fat GET Test", format!("HTTP {}", response.status))
                        .with_subtitle(subtitle),
                )
            }
            _ => Verdict::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok, ok_with_headers};
    use crate::models::Severity;
    use crate::tools::testing;

    #[test]
    fn test_cache_control_findings() {
        let findings = cache_control_findings(ToolId::CachePoison, "public, max-age=172800");
        let titles: Vec<_> = findings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Cache-Control: public", "Long Cache Duration"]);
        assert_eq!(findings[1].value, "max-age=172800 (48h)");

        let private = cache_control_findings(ToolId::CachePoison, "private, public, max-age=60");
        assert_eq!(private.len(), 1);
        assert_eq!(private[0].title, "Cache-Control: private");
    }

    #[test]
    fn test_candidates() {
        let tool = CachePoison::new("https://t.io/page?x=1");
        let probes = tool.candidates(&RunContext::new("t", Default::default()));
        assert_eq!(probes.len(), 1 + 5 + 3 + 1);
        assert!(probes[0].url.starts_with("https://t.io/page?x=1&thcb="));
        assert!(probes[6].url.starts_with("https://t.io/page?thcb="));

        let markers: Vec<_> = probes[1..6].iter().flat_map(|p| p.headers.values()).collect();
        assert_eq!(markers.len(), 5);
        assert!(markers.iter().all(|m| m.starts_with(MARKER_PREFIX)));
        assert_ne!(markers[0], markers[1]);
    }

    #[tokio::test]
    async fn test_poisoning_scenario() {
        let transport = MockTransport::new(|req| {
            if let Some(host) = req.headers.get("X-Forwarded-Host") {
                return ok(200, &format!("<link href=\"https://{}/app.css\">", host));
            }
            if req.url.contains("test=poison") {
                return ok(200, &format!("redirect to {}", req.url));
            }
            ok_with_headers(
                200,
                &[("X-Cache", "HIT"), ("Age", "40"), ("Cache-Control", "public, max-age=600")],
                "<html>home</html>",
            )
        });

        let run = testing::run(&CachePoison::new("https://t.io/"), transport.clone()).await;
        let summary: Vec<_> = run.findings.iter().map(|f| (f.severity, f.title.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (Severity::High, "Unkeyed Header Reflected"),
                (Severity::Medium, "Parameter Pollution Possible"),
                (Severity::Low, "Cache-Control: public"),
                (Severity::Info, "Cache Layer Detected"),
                (Severity::Info, "Cache HIT"),
                (Severity::Info, "Fat GET Test"),
            ]
        );
        assert_eq!(run.findings[0].value, "X-Forwarded-Host");
        assert_eq!(run.findings[3].value, "cache-control: public, max-age=600, x-cache: HIT, age: 40");

        // the third pollution case is skipped once the second one hits
        let requests = transport.requests();
        assert!(!requests.iter().any(|r| r.url.contains("callback")));
        let fat = requests.iter().find(|r| r.body.is_some()).unwrap();
        assert_eq!(fat.body.as_deref(), Some("test=poisoned"));
    }
}
