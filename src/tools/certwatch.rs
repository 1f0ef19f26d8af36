use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::upstream::{CrtEntry, crtsh_url, parse_json};
use super::{normalize_domain, require};
use crate::error::{EngineError, EngineResult};
use crate::generator::dedup_preserving;
use crate::http::EgressClient;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, ToolId};
use crate::scanner::{Preparation, RunContext, Tool, Verdict};

const CRTSH_CERT_TIMEOUT_MS: u64 = 30_000;
const HTTPS_TIMEOUT_MS: u64 = 10_000;
const ONE_YEAR_SECS: u64 = 31_536_000;
const MAX_LISTED_DOMAINS: usize = 100;

static MAX_AGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)max-age=(\d+)").expect("static pattern"));

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

pub fn certificate_findings(entries: &[CrtEntry]) -> Vec<Finding> {
    let tool = ToolId::CertWatch;

    let mut issuers: Vec<(String, usize)> = Vec::new();
    for entry in entries {
        let issuer = entry.issuer_name.clone().unwrap_or_else(|| "Unknown".to_string());
        match issuers.iter_mut().find(|(name, _)| *name == issuer) {
            Some((_, count)) => *count += 1,
            None => issuers.push((issuer, 1)),
        }
    }

    let names = dedup_preserving(entries.iter().flat_map(|entry| {
        entry
            .common_name
            .iter()
            .map(|cn| cn.trim().to_lowercase())
            .chain(entry.names())
            .collect::<Vec<_>>()
    }));
    let (wildcards, domains): (Vec<String>, Vec<String>) = names.into_iter().partition(|n| n.starts_with('*'));

    let mut findings = vec![
        Finding::info(tool, FindingKind::Info, "Certificates Found", format!("{} certificates", entries.len()))
            .with_subtitle(format!("From {} different issuers", issuers.len())),
    ];

    findings.extend(issuers.iter().map(|(issuer, count)| {
        Finding::info(tool, FindingKind::Info, "Certificate Issuer", truncate(issuer, 60))
            .with_subtitle(format!("{} certificates issued", count))
            .with_detail("issuer", issuer.as_str())
    }));

    if !wildcards.is_empty() {
        findings.push(
            Finding::low(tool, FindingKind::Warning, "Wildcard Certificates", wildcards.iter().take(5).cloned().collect::<Vec<_>>().join(", "))
                .with_subtitle(format!("{} wildcard certificates found", wildcards.len())),
        );
    }

    let listed: Vec<String> = domains.iter().take(MAX_LISTED_DOMAINS).cloned().collect();
    findings.push(
        Finding::info(tool, FindingKind::Domain, "Subdomains from CT Logs", format!("{} unique domains", domains.len()))
            .with_subtitle("Discovered via Certificate Transparency")
            .with_detail("domains", listed),
    );
    findings
}

pub fn transport_security_findings(domain: &str, response: &ResponseRecord) -> Vec<Finding> {
    let tool = ToolId::CertWatch;

    if !response.success {
        return vec![
            Finding::medium(tool, FindingKind::Warning, "Certificate Check Failed", domain)
                .with_subtitle("Could not connect via HTTPS"),
        ];
    }

    let mut findings = Vec::new();
    match response.header("strict-transport-security") {
        Some(hsts) => {
            let max_age = MAX_AGE
                .captures(hsts)
                .and_then(|c| c[1].parse::<u64>().ok())
                .unwrap_or(0);
            if max_age < ONE_YEAR_SECS {
                findings.push(
                    Finding::medium(tool, FindingKind::Warning, "HSTS max-age Too Short", format!("{} seconds", max_age))
                        .with_subtitle("Should be at least 31536000 (1 year)"),
                );
            } else {
                findings.push(
                    Finding::info(tool, FindingKind::Info, "HSTS Configured", format!("max-age={}", max_age))
                        .with_subtitle("HTTPS enforced via HSTS")
                        .with_detail("header", hsts),
                );
            }

            let lower = hsts.to_lowercase();
            if !lower.contains("includesubdomains") {
                findings.push(
                    Finding::low(tool, FindingKind::Warning, "HSTS Missing includeSubDomains", hsts)
                        .with_subtitle("Subdomains may not be protected"),
                );
            }
            if !lower.contains("preload") {
                findings.push(
                    Finding::info(tool, FindingKind::Info, "HSTS Preload Not Set", hsts)
                        .with_subtitle("Consider adding preload directive"),
                );
            }
        }
        None => findings.push(
            Finding::high(tool, FindingKind::Warning, "Missing HSTS Header", domain)
                .with_subtitle("HTTPS not enforced via HSTS"),
        ),
    }

    if let Some(expect_ct) = response.header("expect-ct") {
        findings.push(
            Finding::info(tool, FindingKind::Info, "Expect-CT Header", expect_ct)
                .with_subtitle("Certificate Transparency enforcement"),
        );
    }
    if let Some(hpkp) = response.header("public-key-pins") {
        findings.push(
            Finding::medium(tool, FindingKind::Warning, "HPKP Header Found", hpkp.chars().take(100).collect::<String>())
                .with_subtitle("Deprecated and can cause issues"),
        );
    }
    findings
}

#[derive(Debug, Clone, Serialize)]
pub struct CertWatch {
    pub domain: String,
    pub certificates: bool,
    pub ct_logs: bool,
    pub analyze: bool,
}

impl CertWatch {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            certificates: true,
            ct_logs: true,
            analyze: true,
        }
    }
}

#[async_trait]
impl Tool for CertWatch {
    fn id(&self) -> ToolId {
        ToolId::CertWatch
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

    async fn prepare(&self, _client: &EgressClient, ctx: &mut RunContext) -> Preparation {
        if self.ct_logs {
            ctx.emit(
                Finding::info(self.id(), FindingKind::Info, "CT Log Sources", "crt.sh queried")
                    .with_subtitle("Certificate Transparency logs checked"),
            );
        }
        Preparation::Ready
    }

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        let domain = normalize_domain(&self.domain);
        let mut probes = Vec::new();
        if self.certificates {
            probes.push(
                ProbeDescriptor::get(crtsh_url(&domain), Purpose::Lookup)
                    .with_label("crtsh")
                    .with_timeout(CRTSH_CERT_TIMEOUT_MS),
            );
        }
        if self.analyze {
            probes.push(
                ProbeDescriptor::get(format!("https://{}/", domain), Purpose::Fingerprint)
                    .with_label("https")
                    .with_timeout(HTTPS_TIMEOUT_MS),
            );
        }
        probes
    }

    fn classify(&self, _ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        match probe.label_parts() {
            ("crtsh", _) if response.success && !response.body.is_empty() => {
                match parse_json::<Vec<CrtEntry>>("crt.sh", &response.body) {
                    Some(entries) => Verdict::many(certificate_findings(&entries)),
                    None => Verdict::none(),
                }
            }
            ("https", _) => Verdict::many(transport_security_findings(&normalize_domain(&self.domain), response)),
            _ => Verdict::none(),
        }
    }
}
