use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Finding, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolId {
    JsHunter,
    ParamFuzz,
    SubRecon,
    SqliDetect,
    AuthBypass,
    Wayback,
    HeaderAudit,
    ApiRecon,
    PortRush,
    GitLeaks,
    CertWatch,
    DnsTracer,
    WebTechFp,
    CachePoison,
    ProtoDetect,
}

impl ToolId {
    pub const ALL: [ToolId; 15] = [
        ToolId::JsHunter,
        ToolId::ParamFuzz,
        ToolId::SubRecon,
        ToolId::SqliDetect,
        ToolId::AuthBypass,
        ToolId::Wayback,
        ToolId::HeaderAudit,
        ToolId::ApiRecon,
        ToolId::PortRush,
        ToolId::GitLeaks,
        ToolId::CertWatch,
        ToolId::DnsTracer,
        ToolId::WebTechFp,
        ToolId::CachePoison,
        ToolId::ProtoDetect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::JsHunter => "jshunter",
            ToolId::ParamFuzz => "paramfuzz",
            ToolId::SubRecon => "subrecon",
            ToolId::SqliDetect => "sqlidetect",
            ToolId::AuthBypass => "authbypass",
            ToolId::Wayback => "wayback",
            ToolId::HeaderAudit => "headeraudit",
            ToolId::ApiRecon => "apirecon",
            ToolId::PortRush => "portrush",
            ToolId::GitLeaks => "gitleaks",
            ToolId::CertWatch => "certwatch",
            ToolId::DnsTracer => "dnstracer",
            ToolId::WebTechFp => "webtechfp",
            ToolId::CachePoison => "cachepoison",
            ToolId::ProtoDetect => "protodetect",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == wanted)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRun {
    pub tool: ToolId,
    pub target: String,
    pub config: serde_json::Value,
    pub findings: Vec<Finding>,
    pub status: RunStatus,
    pub dispatched: usize,
    pub failed: usize,
    pub note: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ToolRun {
    pub fn start(tool: ToolId, target: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            tool,
            target: target.into(),
            config,
            findings: Vec::new(),
            status: RunStatus::Running,
            dispatched: 0,
            failed: 0,
            note: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn finalize(&mut self, status: RunStatus, findings: Vec<Finding>, duration_ms: u64) {
        self.status = status;
        self.findings = findings;
        self.duration_ms = duration_ms;
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_run(self)
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub tool: ToolId,
    pub status: RunStatus,
    pub total_findings: usize,
    pub dispatched: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub info_count: usize,
    pub note: Option<String>,
}

impl RunSummary {
    pub fn from_run(run: &ToolRun) -> Self {
        let mut summary = Self {
            tool: run.tool,
            status: run.status,
            total_findings: run.findings.len(),
            dispatched: run.dispatched,
            failed: run.failed,
            duration_ms: run.duration_ms,
            critical_count: 0,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
            info_count: 0,
            note: run.note.clone(),
        };

        for finding in &run.findings {
            match finding.severity {
                Severity::Critical => summary.critical_count += 1,
                Severity::High => summary.high_count += 1,
                Severity::Medium => summary.medium_count += 1,
                Severity::Low => summary.low_count += 1,
                Severity::Info => summary.info_count += 1,
            }
        }

        summary
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical_count,
            Severity::High => self.high_count,
            Severity::Medium => self.medium_count,
            Severity::Low => self.low_count,
            Severity::Info => self.info_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindingKind;

    #[test]
    fn test_tool_id_parse() {
        for tool in ToolId::ALL {
            assert_eq!(ToolId::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolId::parse("PortRush"), Some(ToolId::PortRush));
        assert_eq!(ToolId::parse("nmap"), None);
    }

    #[test]
    fn test_summary_counts() {
        let mut run = ToolRun::start(ToolId::HeaderAudit, "https://example.com", serde_json::json!({}));
        let findings = vec![
            Finding::high(ToolId::HeaderAudit, FindingKind::Vulnerability, "Missing: HSTS", "a"),
            Finding::low(ToolId::HeaderAudit, FindingKind::Info, "Server", "nginx"),
            Finding::low(ToolId::HeaderAudit, FindingKind::Info, "X-Powered-By", "php"),
        ];
        run.finalize(RunStatus::Completed, findings, 120);

        let summary = run.summary();
        assert_eq!(summary.total_findings, 3);
        assert_eq!(summary.count(Severity::High), 1);
        assert_eq!(summary.count(Severity::Low), 2);
        assert_eq!(summary.count(Severity::Critical), 0);
        assert_eq!(run.max_severity(), Some(Severity::High));
        assert!(run.status.is_terminal());
    }
}
