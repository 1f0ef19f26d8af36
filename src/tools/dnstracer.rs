use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use super::upstream::{DOH_TIMEOUT_MS, DohRecord, DohResponse, doh_url, parse_json};
use super::{normalize_domain, require};
use crate::error::{EngineError, EngineResult};
use crate::generator::DNS_PREFIXES;
use crate::http::EgressClient;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, Severity, ToolId};
use crate::scanner::{Preparation, RunContext, Tool, Verdict};
use crate::signatures::{Category, SignatureRegistry};

pub const RECORD_TYPES: &[&str] = &["A", "AAAA", "CNAME", "MX", "TXT", "NS", "SOA", "SRV", "CAA"];

const SUBDOMAIN_TIMEOUT_MS: u64 = 5000;

pub fn record_finding(registry: &SignatureRegistry, record_type: &str, record: &DohRecord) -> Finding {
    let ttl = record.ttl.map(|t| t.to_string()).unwrap_or_else(|| "N/A".to_string());
    let data = record.data.as_str();
    let lower = data.to_lowercase();

    let mut title = format!("{} Record", record_type);
    let mut value = data.to_string();
    let mut subtitle = format!("TTL: {}", ttl);
    let mut kind = FindingKind::Info;
    let mut severity = Severity::Info;

    match record_type {
        "A" | "AAAA" => subtitle = format!("IP Address (TTL: {}s)", ttl),
        "MX" => {
            title = "Mail Server (MX)".to_string();
            let mut parts = data.split(' ');
            subtitle = format!("Priority: {}", parts.next().filter(|p| !p.is_empty()).unwrap_or("N/A"));
            let host = parts.collect::<Vec<_>>().join(" ");
            if !host.is_empty() {
                value = host;
            }
        }
        "TXT" => {
            if lower.contains("v=spf") {
                title = "SPF Record".to_string();
                if lower.contains("+all") {
                    severity = Severity::High;
                    kind = FindingKind::Warning;
                    subtitle = "Weak SPF: +all allows any sender!".to_string();
                } else if lower.contains("~all") {
                    severity = Severity::Medium;
                    kind = FindingKind::Warning;
                    subtitle = "Soft fail SPF (~all)".to_string();
                }
            } else if lower.contains("v=dmarc") {
                title = "DMARC Record".to_string();
                if lower.contains("p=none") {
                    severity = Severity::Medium;
                    kind = FindingKind::Warning;
                    subtitle = "DMARC policy set to none".to_string();
                }
            } else if lower.contains("v=dkim") {
                title = "DKIM Record".to_string();
            } else if lower.contains("google-site-verification")
                || lower.contains("facebook-domain-verification")
                || lower.contains("ms=")
            {
                title = "Domain Verification".to_string();
                subtitle = "Third-party service verification".to_string();
            }
        }
        "NS" => {
            title = "Name Server (NS)".to_string();
            subtitle = "Authoritative DNS server".to_string();
        }
        "SOA" => subtitle = "Start of Authority".to_string(),
        "CNAME" => {
            subtitle = "Alias for another domain".to_string();
            if registry.is_match(Category::TakeoverCname, &lower) {
                severity = Severity::High;
                kind = FindingKind::Vulnerability;
                subtitle = "Potential subdomain takeover!".to_string();
            }
        }
        "CAA" => subtitle = "Certificate Authority Authorization".to_string(),
        "SRV" => subtitle = "Service location record".to_string(),
        _ => {}
    }

    Finding::new(ToolId::DnsTracer, kind, severity, title, value)
        .with_subtitle(subtitle)
        .with_detail("recordType", record_type)
}

#[derive(Debug, Clone, Serialize)]
pub struct DnsTracer {
    pub domain: String,
    pub records: bool,
    pub record_types: Vec<String>,
    pub zone_transfer: bool,
    pub security: bool,
    pub subdomains: bool,
}

impl DnsTracer {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            records: true,
            record_types: RECORD_TYPES.iter().map(|t| t.to_string()).collect(),
            zone_transfer: true,
            security: true,
            subdomains: true,
        }
    }

    fn lookup(name: &str, record_type: &str, label: String) -> ProbeDescriptor {
        ProbeDescriptor::get(doh_url(name, record_type), Purpose::Lookup)
            .with_label(label)
            .with_timeout(DOH_TIMEOUT_MS)
    }

    fn classify_dnssec(&self, domain: &str, answer: &DohResponse) -> Finding {
        if answer.authenticated {
            Finding::info(self.id(), FindingKind::Info, "DNSSEC Enabled", "Authenticated Data")
                .with_subtitle("Domain has DNSSEC validation")
        } else if !answer.answer.is_empty() {
            Finding::info(self.id(), FindingKind::Info, "DNSSEC Keys Found", format!("{} DNSKEY records", answer.answer.len()))
                .with_subtitle("DNSSEC is configured")
        } else {
            Finding::low(self.id(), FindingKind::Warning, "DNSSEC Not Enabled", domain)
                .with_subtitle("Domain lacks DNSSEC protection")
        }
    }
}

#[async_trait]
impl Tool for DnsTracer {
    fn id(&self) -> ToolId {
        ToolId::DnsTracer
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
        if self.zone_transfer {
            // AXFR needs TCP to the authoritative servers, which DoH cannot do.
            ctx.emit(
                Finding::info(self.id(), FindingKind::Info, "Zone Transfer Check", "Not determined")
                    .with_subtitle("AXFR requires a direct TCP connection to the name servers"),
            );
        }
        Preparation::Ready
    }

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        let domain = normalize_domain(&self.domain);
        let mut probes = Vec::new();

        if self.records {
            for record_type in &self.record_types {
                let record_type = record_type.to_uppercase();
                probes.push(Self::lookup(&domain, &record_type, format!("record:{}", record_type)));
            }
        }
        if self.security {
            probes.push(Self::lookup(&domain, "DNSKEY", "dnssec".to_string()));
            probes.push(Self::lookup(&format!("_dmarc.{}", domain), "TXT", "dmarc".to_string()));
        }
        if self.subdomains {
            for prefix in DNS_PREFIXES {
                let name = format!("{}.{}", prefix, domain);
                probes.push(Self::lookup(&name, "A", format!("sub:{}", name)).with_timeout(SUBDOMAIN_TIMEOUT_MS));
            }
        }
        probes
    }

    fn classify(&self, ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        if !response.success || response.body.is_empty() {
            return Verdict::none();
        }
        let Some(answer) = parse_json::<DohResponse>("dns", &response.body) else {
            return Verdict::none();
        };
        let domain = normalize_domain(&self.domain);

        match probe.label_parts() {
            ("record", record_type) => Verdict::many(
                answer
                    .answer
                    .iter()
                    .map(|record| record_finding(ctx.registry, record_type, record))
                    .collect(),
            ),
            ("dnssec", _) => Verdict::one(self.classify_dnssec(&domain, &answer)),
            ("dmarc", _) if answer.answer.is_empty() => Verdict::one(
                Finding::medium(self.id(), FindingKind::Warning, "Missing DMARC", format!("_dmarc.{}", domain))
                    .with_subtitle("No DMARC record found - email spoofing possible"),
            ),
            ("sub", name) if !answer.answer.is_empty() => {
                ctx.discovered.push(name.to_string());
                ctx.stash.insert(name.to_string(), response.clone());
                Verdict::none()
            }
            _ => Verdict::none(),
        }
    }

    async fn finish(&self, _client: &EgressClient, ctx: &mut RunContext) -> Vec<Finding> {
        if ctx.discovered.is_empty() {
            return Vec::new();
        }

        let resolved: Vec<Value> = ctx
            .discovered
            .iter()
            .map(|name| {
                let ip = ctx
                    .stash
                    .get(name)
                    .and_then(|r| parse_json::<DohResponse>("dns", &r.body))
                    .and_then(|a| a.answer.into_iter().next())
                    .map(|record| record.data)
                    .unwrap_or_default();
                json!({ "subdomain": name, "ip": ip })
            })
            .collect();

        let shown: Vec<&str> = ctx.discovered.iter().take(5).map(String::as_str).collect();
        vec![
            Finding::info(
                self.id(),
                FindingKind::Domain,
                "Subdomains Found (DNS)",
                format!("{} subdomains resolved", ctx.discovered.len()),
            )
            .with_subtitle(shown.join(", "))
            .with_detail("subdomains", resolved),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok};
    use crate::tools::testing;

    fn record(data: &str) -> DohRecord {
        DohRecord {
            data: data.to_string(),
            ttl: Some(300),
        }
    }

    #[test]
    fn test_record_classification() {
        let registry = SignatureRegistry::global();

        let spf = record_finding(registry, "TXT", &record("v=spf1 include:x +all"));
        assert_eq!((spf.title.as_str(), spf.severity), ("SPF Record", Severity::High));

        let dmarc = record_finding(registry, "TXT", &record("v=DMARC1; p=none; rua=mailto:a@t.io"));
        assert_eq!(dmarc.severity, Severity::Medium);

        let mx = record_finding(registry, "MX", &record("10 mx1.t.io."));
        assert_eq!(mx.value, "mx1.t.io.");
        assert_eq!(mx.subtitle, "Priority: 10");

        let cname = record_finding(registry, "CNAME", &record("shop.myshopify.com."));
        assert_eq!(cname.severity, Severity::High);
        assert_eq!(cname.kind, FindingKind::Vulnerability);

        let a = record_finding(registry, "A", &record("1.2.3.4"));
        assert_eq!(a.subtitle, "IP Address (TTL: 300s)");
    }

    #[tokio::test]
    async fn test_lookup_run() {
        let transport = MockTransport::new(|req| match req.url.as_str() {
            "https://dns.google/resolve?name=t.io&type=A" => ok(200, r#"{"Answer":[{"data":"1.2.3.4","TTL":60}]}"#),
            "https://dns.google/resolve?name=t.io&type=TXT" => {
                ok(200, r#"{"Answer":[{"data":"v=spf1 include:_spf.t.io ~all","TTL":60}]}"#)
            }
            "https://dns.google/resolve?name=t.io&type=DNSKEY" => ok(200, r#"{"Status":0,"AD":false}"#),
            "https://dns.google/resolve?name=api.t.io&type=A" => ok(200, r#"{"Answer":[{"data":"5.6.7.8"}]}"#),
            "https://dns.google/resolve?name=mail.t.io&type=A" => ok(200, "not json"),
            _ => ok(200, r#"{"Status":3}"#),
        });
        let tool = DnsTracer {
            record_types: vec!["a".to_string(), "TXT".to_string()],
            ..DnsTracer::new("https://www.t.io/")
        };

        let run = testing::run(&tool, transport).await;
        let summary: Vec<_> = run.findings.iter().map(|f| (f.severity, f.title.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (Severity::Medium, "SPF Record"),
                (Severity::Medium, "Missing DMARC"),
                (Severity::Low, "DNSSEC Not Enabled"),
                (Severity::Info, "Zone Transfer Check"),
                (Severity::Info, "A Record"),
                (Severity::Info, "Subdomains Found (DNS)"),
            ]
        );

        let subs = run.findings.last().unwrap();
        assert_eq!(subs.value, "1 subdomains resolved");
        assert_eq!(subs.details["subdomains"][0]["ip"], "5.6.7.8");
    }
}
