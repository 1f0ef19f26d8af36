use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{normalize_host, require};
use crate::config::Settings;
use crate::error::{EngineError, EngineResult};
use crate::generator::{PortPreset, parse_port_spec, port_severity, service_name};
use crate::models::{FailureKind, Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, ToolId};
use crate::reporter::TieBreak;
use crate::scanner::{RunContext, SchedulePolicy, Tool, Verdict};

const PROBE_TIMEOUT_MS: u64 = 2000;
const FAST_FAILURE_MS: u64 = 1500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortSelection {
    Preset(PortPreset),
    Custom(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PortRush {
    pub host: String,
    pub ports: PortSelection,
    pub batch: Option<usize>,
}

impl PortRush {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ports: PortSelection::Preset(PortPreset::Common),
            batch: None,
        }
    }

    pub fn port_list(&self) -> Vec<u16> {
        match &self.ports {
            PortSelection::Preset(preset) => preset.ports().to_vec(),
            PortSelection::Custom(spec) => parse_port_spec(spec),
        }
    }

    fn schemes(port: u16) -> &'static [&'static str] {
        match port {
            443 | 8443 => &["https"],
            _ => &["http", "https"],
        }
    }
}

pub fn port_open(response: &ResponseRecord) -> bool {
    if response.success {
        return true;
    }
    response.elapsed_ms < FAST_FAILURE_MS
        && !matches!(response.failure, Some(FailureKind::Refused) | Some(FailureKind::Timeout))
}

#[async_trait]
impl Tool for PortRush {
    fn id(&self) -> ToolId {
        ToolId::PortRush
    }

    fn target(&self) -> &str {
        &self.host
    }

    fn config(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn validate(&self) -> EngineResult<()> {
        require(&self.host, "host")?;
        if normalize_host(&self.host).is_empty() {
            return Err(EngineError::invalid_target(&self.host, "no host"));
        }
        Ok(())
    }

    fn policy(&self, settings: &Settings) -> SchedulePolicy {
        SchedulePolicy::batched(self.batch.unwrap_or(settings.concurrent), settings.delay_duration())
    }

    fn tie_break(&self) -> TieBreak {
        TieBreak::PortAsc
    }

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        let host = normalize_host(&self.host);

        self.port_list()
            .into_iter()
            .flat_map(|port| {
                let host = host.clone();
                Self::schemes(port).iter().map(move |scheme| {
                    ProbeDescriptor::get(format!("{}://{}:{}/", scheme, host, port), Purpose::PortProbe)
                        .with_label(format!("port:{}:{}", port, scheme))
                        .in_group(format!("port:{}", port))
                        .with_timeout(PROBE_TIMEOUT_MS)
                })
            })
            .collect()
    }

    fn classify(&self, _ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        let (_, rest) = probe.label_parts();
        let Some((port, scheme)) = rest.split_once(':') else {
            return Verdict::none();
        };
        let Ok(port) = port.parse::<u16>() else {
            return Verdict::none();
        };

        if response.failure == Some(FailureKind::Refused) {
            return Verdict::none().settled();
        }
        if !port_open(response) {
            return Verdict::none();
        }

        let service = if response.success {
            format!("HTTP ({})", response.status)
        } else {
            service_name(port).to_string()
        };
        let protocol = scheme.to_uppercase();
        let host = normalize_host(&self.host);

        Verdict::one(
            Finding::new(
                self.id(),
                FindingKind::Port,
                port_severity(port),
                format!("Port {} - {}", port, service),
                format!("{}:{}", host, port),
            )
            .with_subtitle(protocol.clone())
            .with_detail("port", port)
            .with_detail("service", service)
            .with_detail("protocol", protocol)
            .with_detail("open", true),
        )
        .settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok, refused};
    use crate::models::{RunStatus, Severity};
    use crate::tools::testing;

    #[test]
    fn test_candidates_per_port() {
        let tool = PortRush {
            ports: PortSelection::Custom("443, 22".into()),
            ..PortRush::new("https://box.test:9000/path")
        };
        let ctx = RunContext::new("box.test", Default::default());
        let urls: Vec<_> = tool.candidates(&ctx).into_iter().map(|p| p.url).collect();
        assert_eq!(
            urls,
            vec!["https://box.test:443/", "http://box.test:22/", "https://box.test:22/"]
        );
    }

    #[test]
    fn test_batch_width_override() {
        let settings = Settings::default();
        assert_eq!(PortRush::new("h").policy(&settings).width, 5);
        let tool = PortRush {
            batch: Some(10),
            ..PortRush::new("h")
        };
        assert_eq!(tool.policy(&settings).width, 10);
    }

    #[test]
    fn test_port_open_inference() {
        let answered = ResponseRecord::new(404, Vec::new(), String::new(), String::new(), 30);
        assert!(port_open(&answered));
        assert!(!port_open(&ResponseRecord::failure(FailureKind::Refused, "refused", 3)));
        assert!(!port_open(&ResponseRecord::failure(FailureKind::Timeout, "slow", 2000)));
        assert!(port_open(&ResponseRecord::failure(FailureKind::Other, "not http", 40)));
        assert!(!port_open(&ResponseRecord::failure(FailureKind::Other, "not http", 1600)));
    }

    #[tokio::test]
    async fn test_only_answering_port_reported() {
        let transport = MockTransport::new(|req| if req.url.contains(":80/") { ok(200, "it works") } else { refused() });
        let tool = PortRush {
            ports: PortSelection::Custom("22,80,9999".into()),
            ..PortRush::new("host")
        };

        let run = testing::run(&tool, transport).await;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.findings.len(), 1);
        let finding = &run.findings[0];
        assert_eq!(finding.value, "host:80");
        assert_eq!(finding.severity, Severity::Info);
        assert_eq!(finding.title, "Port 80 - HTTP (200)");
    }

    #[tokio::test]
    async fn test_findings_sorted_by_port_within_severity() {
        let transport = MockTransport::new(|_| ok(200, ""));
        let tool = PortRush {
            ports: PortSelection::Custom("9999,8000,22".into()),
            batch: Some(1),
            ..PortRush::new("host")
        };

        let run = testing::run(&tool, transport.clone()).await;
        let ports: Vec<_> = run.findings.iter().filter_map(|f| f.detail_i64("port")).collect();
        assert_eq!(ports, vec![22, 8000, 9999]);
        // https skipped once http answered on each port
        assert_eq!(transport.requests().len(), 3);
    }
}
