use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::upstream::{CRTSH_TIMEOUT_MS, CrtEntry, crtsh_wildcard_url, parse_json};
use super::{normalize_domain, require};
use crate::error::{EngineError, EngineResult};
use crate::generator::{SUBDOMAIN_PREFIXES, dedup_preserving, subdomains};
use crate::http::EgressClient;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, Severity, ToolId};
use crate::reporter::TieBreak;
use crate::scanner::{Preparation, RunContext, Tool, Verdict};
use crate::signatures::{Category, MARKUP_SCAN_LIMIT, bounded};

const ALIVE_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Serialize)]
pub struct SubRecon {
    pub domain: String,
    pub crtsh: bool,
    pub wordlist: bool,
    pub alive_check: bool,
    pub takeover: bool,
}

impl SubRecon {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            crtsh: true,
            wordlist: true,
            alive_check: true,
            takeover: true,
        }
    }

    async fn ct_names(&self, client: &EgressClient, domain: &str) -> Vec<String> {
        let response = client
            .get(&crtsh_wildcard_url(domain), Some(Duration::from_millis(CRTSH_TIMEOUT_MS)))
            .await;
        if !response.success || response.body.is_empty() {
            debug!(domain, "crt.sh lookup returned nothing");
            return Vec::new();
        }

        let entries: Vec<CrtEntry> = parse_json("crt.sh", &response.body).unwrap_or_default();
        let names = entries
            .iter()
            .flat_map(CrtEntry::names)
            .filter(|name| name.ends_with(domain) && !name.starts_with('*'));
        dedup_preserving(names)
    }
}

#[async_trait]
impl Tool for SubRecon {
    fn id(&self) -> ToolId {
        ToolId::SubRecon
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

    fn tie_break(&self) -> TieBreak {
        TieBreak::TitleAsc
    }

    async fn prepare(&self, client: &EgressClient, ctx: &mut RunContext) -> Preparation {
        let domain = normalize_domain(&self.domain);

        let mut names = Vec::new();
        if self.crtsh {
            names.extend(self.ct_names(client, &domain).await);
        }
        if self.wordlist {
            names.extend(subdomains::expand(SUBDOMAIN_PREFIXES, &domain));
        }
        let names = dedup_preserving(names);

        if !self.alive_check {
            for name in &names {
                ctx.emit(Finding::info(self.id(), FindingKind::Domain, name, name).with_subtitle("Not checked"));
            }
        }
        ctx.discovered = names;
        Preparation::Ready
    }

    fn candidates(&self, ctx: &RunContext) -> Vec<ProbeDescriptor> {
        if !self.alive_check {
            return Vec::new();
        }

        ctx.discovered
            .iter()
            .flat_map(|name| {
                ["https", "http"].into_iter().map(move |scheme| {
                    ProbeDescriptor::get(format!("{}://{}", scheme, name), Purpose::HostProbe)
                        .with_label(format!("alive:{}", name))
                        .in_group(format!("host:{}", name))
                        .with_timeout(ALIVE_TIMEOUT_MS)
                })
            })
            .collect()
    }

    fn classify(&self, ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        if !response.success {
            return Verdict::none();
        }
        let (_, name) = probe.label_parts();

        let takeover = if self.takeover && !response.body.is_empty() {
            ctx.registry
                .first_match(Category::Takeover, bounded(&response.body, MARKUP_SCAN_LIMIT))
        } else {
            None
        };

        let mut subtitle = format!("HTTP {}", response.status);
        let severity = if takeover.is_some() {
            subtitle.push_str(" [TAKEOVER POSSIBLE]");
            Severity::High
        } else {
            Severity::Info
        };

        let mut finding = Finding::new(self.id(), FindingKind::Domain, severity, name, name)
            .with_subtitle(subtitle)
            .with_detail("status", response.status)
            .with_detail("alive", true)
            .with_detail("takeover", takeover.is_some());
        if let Some(hit) = takeover {
            finding = finding.with_detail("takeoverService", hit.label);
        }

        Verdict::one(finding).settled()
    }
}
