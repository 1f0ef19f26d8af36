use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{Finding, FindingKind, ToolId};

/// Secondary ordering a tool declares for findings of equal severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Keep the order findings were added in.
    Insertion,
    /// `details.score`, highest first.
    ScoreDesc,
    TitleAsc,
    /// `details.port`, lowest first.
    PortAsc,
}

impl TieBreak {
    fn compare(&self, a: &Finding, b: &Finding) -> Ordering {
        match self {
            TieBreak::Insertion => Ordering::Equal,
            TieBreak::ScoreDesc => b
                .detail_i64("score")
                .unwrap_or(0)
                .cmp(&a.detail_i64("score").unwrap_or(0)),
            TieBreak::TitleAsc => a.title.cmp(&b.title),
            TieBreak::PortAsc => a
                .detail_i64("port")
                .unwrap_or(0)
                .cmp(&b.detail_i64("port").unwrap_or(0)),
        }
    }
}

#[derive(Debug)]
pub struct FindingSink {
    tie_break: TieBreak,
    seen: HashSet<(ToolId, FindingKind, String)>,
    findings: Vec<Finding>,
}

impl FindingSink {
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            tie_break,
            seen: HashSet::new(),
            findings: Vec::new(),
        }
    }

    pub fn add(&mut self, finding: Finding) -> bool {
        let key = (finding.tool, finding.kind, finding.value.clone());
        if !self.seen.insert(key) {
            return false;
        }
        self.findings.push(finding);
        true
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.add(finding);
        }
    }

    /// Most severe first, then the tool's tie-break, then insertion order.
    pub fn drain(&self) -> Vec<Finding> {
        let mut ordered = self.findings.clone();
        ordered.sort_by(|a, b| {
            a.severity
                .rank()
                .cmp(&b.severity.rank())
                .then_with(|| self.tie_break.compare(a, b))
        });
        ordered
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn param(name: &str, score: i64, severity: Severity) -> Finding {
        Finding::new(ToolId::ParamFuzz, FindingKind::Parameter, severity, name, format!("http://t/?{}=x", name))
            .with_detail("score", score)
    }

    #[test]
    fn test_dedupes_on_tool_kind_value() {
        let mut sink = FindingSink::new(TieBreak::Insertion);
        assert!(sink.add(Finding::high(ToolId::GitLeaks, FindingKind::Secret, "a", "http://t/.env")));
        assert!(!sink.add(Finding::low(ToolId::GitLeaks, FindingKind::Secret, "b", "http://t/.env")));
        assert!(sink.add(Finding::low(ToolId::GitLeaks, FindingKind::Warning, "b", "http://t/.env")));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_severity_then_score() {
        let mut sink = FindingSink::new(TieBreak::ScoreDesc);
        sink.add(param("a", 2, Severity::Low));
        sink.add(param("b", 3, Severity::Medium));
        sink.add(param("c", 5, Severity::High));
        sink.add(param("d", 4, Severity::High));

        let titles: Vec<_> = sink.drain().into_iter().map(|f| f.title).collect();
        assert_eq!(titles, vec!["c", "d", "b", "a"]);
    }

    #[test]
    fn test_port_and_title_tie_breaks() {
        let mut sink = FindingSink::new(TieBreak::PortAsc);
        for port in [8080_i64, 80, 443] {
            sink.add(Finding::info(ToolId::PortRush, FindingKind::Port, format!("Port {}", port), format!("h:{}", port)).with_detail("port", port));
        }
        let ports: Vec<_> = sink.drain().iter().filter_map(|f| f.detail_i64("port")).collect();
        assert_eq!(ports, vec![80, 443, 8080]);

        let mut sink = FindingSink::new(TieBreak::TitleAsc);
        sink.add(Finding::info(ToolId::SubRecon, FindingKind::Domain, "www.t", "www.t"));
        sink.add(Finding::info(ToolId::SubRecon, FindingKind::Domain, "api.t", "api.t"));
        assert_eq!(sink.drain()[0].title, "api.t");
    }

    #[test]
    fn test_drain_is_idempotent() {
        let mut sink = FindingSink::new(TieBreak::Insertion);
        sink.add(Finding::low(ToolId::Wayback, FindingKind::Parameter, "x", "1"));
        sink.add(Finding::critical(ToolId::Wayback, FindingKind::Secret, "y", "2"));
        sink.add(Finding::low(ToolId::Wayback, FindingKind::Parameter, "z", "3"));

        let first = sink.drain();
        assert_eq!(first, sink.drain());
        assert_eq!(first[0].title, "y");
        assert_eq!(first[1].title, "x");
        assert_eq!(first[2].title, "z");
    }
}
