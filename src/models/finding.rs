use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::ToolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn numeric_value(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }

    pub fn rank(&self) -> u8 {
        4 - self.numeric_value()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Vulnerability,
    Warning,
    Info,
    Secret,
    Endpoint,
    Domain,
    Port,
    Service,
    Parameter,
    Technology,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FindingKind::Vulnerability => "vulnerability",
            FindingKind::Warning => "warning",
            FindingKind::Info => "info",
            FindingKind::Secret => "secret",
            FindingKind::Endpoint => "endpoint",
            FindingKind::Domain => "domain",
            FindingKind::Port => "port",
            FindingKind::Service => "service",
            FindingKind::Parameter => "parameter",
            FindingKind::Technology => "technology",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub tool: ToolId,
    pub kind: FindingKind,
    pub severity: Severity,
    pub title: String,
    pub value: String,
    pub subtitle: String,
    pub details: BTreeMap<String, Value>,
}

impl Finding {
    pub fn new(
        tool: ToolId,
        kind: FindingKind,
        severity: Severity,
        title: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            tool,
            kind,
            severity,
            title: title.into(),
            value: value.into(),
            subtitle: String::new(),
            details: BTreeMap::new(),
        }
    }

    pub fn critical(tool: ToolId, kind: FindingKind, title: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(tool, kind, Severity::Critical, title, value)
    }

    pub fn high(tool: ToolId, kind: FindingKind, title: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(tool, kind, Severity::High, title, value)
    }

    pub fn medium(tool: ToolId, kind: FindingKind, title: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(tool, kind, Severity::Medium, title, value)
    }

    pub fn low(tool: ToolId, kind: FindingKind, title: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(tool, kind, Severity::Low, title, value)
    }

    pub fn info(tool: ToolId, kind: FindingKind, title: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(tool, kind, Severity::Info, title, value)
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail_i64(&self, key: &str) -> Option<i64> {
        self.details.get(key).and_then(Value::as_i64)
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }
}
