use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{add_query_param, parse_url, require};
use crate::analyzer::{Baseline, PLAIN, compare};
use crate::error::EngineResult;
use crate::generator::{ParamList, ParamWordlists};
use crate::http::EgressClient;
use crate::models::{Finding, FindingKind, HttpMethod, ProbeDescriptor, Purpose, ResponseRecord, Severity, ToolId};
use crate::reporter::TieBreak;
use crate::scanner::{Preparation, RunContext, Tool, Verdict};

pub const MARKER: &str = "test123";
const PROBE_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Serialize)]
pub struct ParamFuzz {
    pub url: String,
    pub method: HttpMethod,
    pub lists: Vec<ParamList>,
    pub custom: Option<String>,
}

impl ParamFuzz {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            lists: vec![ParamList::Common],
            custom: None,
        }
    }

    fn base_url(&self) -> EngineResult<String> {
        let url = parse_url(&self.url)?;
        Ok(format!("{}{}", url.origin().ascii_serialization(), url.path()))
    }

    fn wordlist(&self) -> Vec<String> {
        ParamWordlists::build(&self.lists, self.custom.as_deref())
    }
}

fn score(param: &str, response: &ResponseRecord, baseline: &ResponseRecord, length_delta: i64) -> (i64, Vec<String>) {
    let diff = compare(response, baseline);
    let reflected = diff.reflects(MARKER);
    let named = response.body.to_lowercase().contains(&param.to_lowercase());

    let mut points = 0;
    let mut reasons = Vec::new();

    if diff.status_changed && response.status != 404 {
        points += 3;
        reasons.push(format!("Status changed: {} → {}", baseline.status, response.status));
    }
    if reflected {
        points += 2;
        reasons.push("Value reflected in response".to_string());
    }
    if diff.abs_length_delta() > length_delta {
        points += 1;
        reasons.push(format!("Length diff: {} bytes", diff.abs_length_delta()));
    }
    if named && !reflected {
        points += 1;
        reasons.push("Param name found in response".to_string());
    }

    (points, reasons)
}

#[async_trait]
impl Tool for ParamFuzz {
    fn id(&self) -> ToolId {
        ToolId::ParamFuzz
    }

    fn target(&self) -> &str {
        &self.url
    }

    fn config(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn validate(&self) -> EngineResult<()> {
        require(&self.url, "url")?;
        self.base_url().map(|_| ())
    }

    fn tie_break(&self) -> TieBreak {
        TieBreak::ScoreDesc
    }

    async fn prepare(&self, client: &EgressClient, ctx: &mut RunContext) -> Preparation {
        let Ok(base) = self.base_url() else {
            return Preparation::Unreachable("invalid url".to_string());
        };
        let baseline = client
            .send(self.method, &base, &BTreeMap::new(), None, None)
            .await;
        if !baseline.success {
            return Preparation::Unreachable(baseline.error.unwrap_or_default());
        }
        ctx.install_baseline(Baseline::single(PLAIN, baseline));
        Preparation::Ready
    }

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        let Ok(base) = self.base_url() else {
            return Vec::new();
        };

        self.wordlist()
            .into_iter()
            .map(|param| {
                ProbeDescriptor::new(self.method, add_query_param(&base, &param, MARKER), Purpose::ParameterDiscovery)
                    .with_label(format!("param:{}", param))
                    .with_timeout(PROBE_TIMEOUT_MS)
            })
            .collect()
    }

    fn classify(&self, ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        let Some(baseline) = ctx.baseline_record(PLAIN) else {
            return Verdict::none();
        };
        if !response.success {
            return Verdict::none();
        }

        let (_, param) = probe.label_parts();
        let (points, reasons) = score(param, response, baseline, ctx.thresholds().param_length_delta);
        if points < 2 {
            return Verdict::none();
        }

        let severity = match points {
            p if p >= 4 => Severity::High,
            3 => Severity::Medium,
            _ => Severity::Low,
        };
        let diff = compare(response, baseline);

        Verdict::one(
            Finding::new(self.id(), FindingKind::Parameter, severity, format!("Parameter: {}", param), probe.url.clone())
                .with_subtitle(reasons.join(", "))
                .with_detail("param", param)
                .with_detail("score", points)
                .with_detail("status", response.status)
                .with_detail("lengthDiff", diff.abs_length_delta())
                .with_detail("hasReflection", diff.reflects(MARKER)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok};
    use crate::models::RunStatus;
    use crate::tools::testing;
    use tokio_util::sync::CancellationToken;

    fn custom(url: &str, names: &str) -> ParamFuzz {
        ParamFuzz {
            lists: Vec::new(),
            custom: Some(names.to_string()),
            ..ParamFuzz::new(url)
        }
    }

    #[test]
    fn test_candidates_strip_existing_query() {
        let tool = custom("https://t/search?x=1", "debug\nq");
        let ctx = RunContext::new("t", Default::default());
        let urls: Vec<_> = tool.candidates(&ctx).into_iter().map(|p| p.url).collect();
        assert_eq!(urls, vec!["https://t/search?debug=test123", "https://t/search?q=test123"]);
    }

    #[test]
    fn test_scoring() {
        let baseline = ResponseRecord::new(200, Vec::new(), "x".repeat(50), String::new(), 1);
        let changed = ResponseRecord::new(500, Vec::new(), format!("debug on test123 {}", "y".repeat(200)), String::new(), 1);
        let (points, reasons) = score("debug", &changed, &baseline, 100);
        assert_eq!(points, 6);
        assert_eq!(reasons.len(), 3);

        let missing = ResponseRecord::new(404, Vec::new(), "x".repeat(50), String::new(), 1);
        assert_eq!(score("debug", &missing, &baseline, 100).0, 0);

        let named = ResponseRecord::new(200, Vec::new(), "unknown param DEBUG".into(), String::new(), 1);
        assert_eq!(score("debug", &named, &baseline, 100).0, 1);
    }

    #[tokio::test]
    async fn test_ranked_by_score() {
        let transport = MockTransport::new(|req| {
            if req.url.contains("admin=") {
                ok(500, "admin test123")
            } else if req.url.contains("page=") {
                ok(200, "test123")
            } else {
                ok(200, "base")
            }
        });

        let run = testing::run(&custom("https://t/", "page\nadmin\nnothing"), transport).await;
        assert_eq!(run.status, RunStatus::Completed);
        let params: Vec<_> = run.findings.iter().filter_map(|f| f.detail_str("param")).collect();
        assert_eq!(params, vec!["admin", "page"]);
        assert_eq!(run.findings[0].severity, Severity::High);
        assert_eq!(run.findings[1].severity, Severity::Low);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_partial_findings() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = hits.clone();

        let transport = MockTransport::new(move |req| {
            if req.url.contains(MARKER) && counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1 == 3 {
                trigger.cancel();
            }
            ok(200, "echo test123")
        });

        let names = (0..10).map(|i| format!("p{}", i)).collect::<Vec<_>>().join("\n");
        let run = testing::engine(transport.clone())
            .run(&custom("https://t/", &names), cancel)
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.findings.len(), 3);
        assert_eq!(run.dispatched, 3);
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_unreachable_baseline_fails_run() {
        let transport = MockTransport::new(|_| crate::http::mock::refused());
        let run = testing::run(&custom("https://t/", "a"), transport).await;
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.note.as_deref(), Some("target unreachable"));
    }
}
