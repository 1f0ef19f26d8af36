use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{parse_url, query_names, require, set_query_param};
use crate::analyzer::{Baseline, PLAIN, boolean_pair_hit, sql_error_rule, timing_hit};
use crate::error::{EngineError, EngineResult};
use crate::http::EgressClient;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, ToolId};
use crate::scanner::{Preparation, RunContext, Tool, Verdict};

const ERROR_PAYLOADS: &[&str] = &[
    "'",
    "\"",
    "' OR '1'='1",
    "\" OR \"1\"=\"1",
    "' OR 1=1--",
    "' AND '1'='2",
    "1' ORDER BY 1--",
    "1' ORDER BY 100--",
    "') OR ('1'='1",
    "';SELECT SLEEP(0)--",
    "'||(SELECT '')||'",
    "' UNION SELECT NULL--",
    "' AND EXTRACTVALUE(1,CONCAT(0x7e,(SELECT version())))--",
];

const TIME_PAYLOADS: &[&str] = &["' AND SLEEP(5)--", "' OR SLEEP(5)--", "'; WAITFOR DELAY '0:0:5'--"];

const BOOL_TRUE: &str = "' AND '1'='1";
const BOOL_FALSE: &str = "' AND '1'='2";

const UNION_PAYLOADS: &[&str] = &[
    "' UNION SELECT NULL--",
    "' UNION SELECT NULL,NULL--",
    "' UNION SELECT NULL,NULL,NULL--",
    "' UNION ALL SELECT NULL--",
    "' UNION SELECT 1,2,3--",
    "' UNION SELECT @@version,NULL--",
];

const TIME_PROBE_TIMEOUT_MS: u64 = 15_000;

/// Techniques that stop testing a parameter after their first hit.
const GROUPED: &[&str] = &["error", "time", "union"];

/// Error, time, boolean and UNION based SQL injection checks over every
/// query parameter of one URL.
#[derive(Debug, Clone, Serialize)]
pub struct SqliDetect {
    pub url: String,
    pub error_based: bool,
    pub time_based: bool,
    pub boolean_based: bool,
    pub union: bool,
}

impl SqliDetect {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            error_based: true,
            time_based: true,
            boolean_based: true,
            union: true,
        }
    }

    fn parsed(&self) -> EngineResult<Url> {
        let url = parse_url(&self.url)?;
        if url.query_pairs().next().is_none() {
            return Err(EngineError::invalid_target(&self.url, "no query parameters"));
        }
        Ok(url)
    }

    /// Every technique's payload URLs for one parameter. A URL shared by
    /// several techniques is sent once and labelled with all of them.
    fn param_probes(&self, url: &Url, param: &str) -> Vec<ProbeDescriptor> {
        let injected = |kind: &'static str, payloads: &[&str]| -> Vec<(&'static str, String)> {
            payloads.iter().map(|payload| (kind, set_query_param(url, param, payload))).collect()
        };

        let mut planned = Vec::new();
        if self.error_based {
            planned.extend(injected("error", ERROR_PAYLOADS));
        }
        if self.time_based {
            planned.extend(injected("time", TIME_PAYLOADS));
        }
        if self.boolean_based {
            planned.push(("bool-true", Self::boolean_url(url, param, BOOL_TRUE)));
            planned.push(("bool-false", Self::boolean_url(url, param, BOOL_FALSE)));
        }
        if self.union {
            planned.extend(injected("union", UNION_PAYLOADS));
        }

        let mut merged: Vec<(String, Vec<&'static str>)> = Vec::new();
        for (kind, target) in planned {
            match merged.iter_mut().find(|(u, _)| *u == target) {
                Some((_, kinds)) => kinds.push(kind),
                None => merged.push((target, vec![kind])),
            }
        }

        merged
            .into_iter()
            .map(|(target, kinds)| {
                let mut probe = ProbeDescriptor::get(target, Purpose::PayloadInjection)
                    .with_label(format!("{}:{}", kinds.join("+"), param));
                if let [kind] = kinds.as_slice() {
                    if GROUPED.contains(kind) {
                        probe = probe.in_group(format!("{}:{}", kind, param));
                    }
                }
                if kinds.contains(&"time") {
                    probe = probe.with_timeout(TIME_PROBE_TIMEOUT_MS);
                }
                probe
            })
            .collect()
    }

    /// `param` set to its original value followed by `payload`.
    fn boolean_url(url: &Url, param: &str, payload: &str) -> String {
        let original = url
            .query_pairs()
            .find(|(k, _)| k == param)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        set_query_param(url, param, &format!("{}{}", original, payload))
    }

    fn finding(&self, technique: &str, param: &str, url: &str) -> Finding {
        Finding::critical(
            self.id(),
            FindingKind::Vulnerability,
            format!("SQL Injection ({}-Based) - {}", technique, param),
            url,
        )
        .with_detail("param", param)
        .with_detail("type", technique.to_lowercase() + "-based")
    }

    fn technique(&self, ctx: &mut RunContext, kind: &str, param: &str, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        match kind {
            "error" => match sql_error_rule(ctx.registry, response) {
                Some(hit) => Verdict::one(
                    self.finding("Error", param, &probe.url)
                        .with_subtitle(format!("Database: {}", hit.label))
                        .with_detail("dbType", hit.label),
                ),
                None => Verdict::none(),
            },
            "time" if timing_hit(response.elapsed_ms, ctx.thresholds()) => Verdict::one(
                self.finding("Time", param, &probe.url)
                    .with_subtitle(format!("Response delayed by {}s", (response.elapsed_ms + 500) / 1000))
                    .with_detail("elapsed", response.elapsed_ms),
            ),
            "bool-true" | "bool-false" => self.classify_boolean(ctx, kind, param, probe, response),
            "union" => {
                let Some(baseline) = ctx.baseline_record(PLAIN) else {
                    return Verdict::none();
                };
                if !response.success || response.body.is_empty() {
                    return Verdict::none();
                }
                let indicator = response.body.to_lowercase().contains("null") || sql_error_rule(ctx.registry, response).is_none();
                if indicator && response.body_len() != baseline.body_len() {
                    Verdict::one(
                        Finding::medium(self.id(), FindingKind::Warning, format!("Potential UNION SQLi - {}", param), probe.url.clone())
                            .with_subtitle("UNION query may be exploitable")
                            .with_detail("param", param)
                            .with_detail("type", "union-based"),
                    )
                } else {
                    Verdict::none()
                }
            }
            _ => Verdict::none(),
        }
    }

    fn classify_boolean(&self, ctx: &mut RunContext, kind: &str, param: &str, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        ctx.stash.insert(format!("{}:{}", kind, param), response.clone());
        let (Some(truthy), Some(falsy)) = (
            ctx.stash.get(&format!("bool-true:{}", param)).cloned(),
            ctx.stash.get(&format!("bool-false:{}", param)).cloned(),
        ) else {
            return Verdict::none();
        };
        let response = &falsy;
        let Some(baseline) = ctx.baseline_record(PLAIN) else {
            return Verdict::none();
        };
        if !truthy.success || !response.success {
            return Verdict::none();
        }

        let (base_len, true_len, false_len) = (baseline.body_len(), truthy.body_len(), response.body_len());
        if !boolean_pair_hit(base_len, true_len, false_len, ctx.thresholds()) {
            return Verdict::none();
        }

        let delta = (true_len as i64 - false_len as i64).abs();
        let true_url = self
            .parsed()
            .map(|url| Self::boolean_url(&url, param, BOOL_TRUE))
            .unwrap_or_else(|_| probe.url.clone());
        Verdict::one(
            Finding::high(
                self.id(),
                FindingKind::Vulnerability,
                format!("SQL Injection (Boolean-Based) - {}", param),
                true_url,
            )
            .with_subtitle(format!("Length difference: {} bytes", delta))
            .with_detail("param", param)
            .with_detail("trueLength", true_len)
            .with_detail("falseLength", false_len)
            .with_detail("lengthDiff", delta)
            .with_detail("type", "boolean-based"),
        )
    }
}

#[async_trait]
impl Tool for SqliDetect {
    fn id(&self) -> ToolId {
        ToolId::SqliDetect
    }

    fn target(&self) -> &str {
        &self.url
    }

    fn config(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn validate(&self) -> EngineResult<()> {
        require(&self.url, "url")?;
        self.parsed().map(|_| ())
    }

    async fn prepare(&self, client: &EgressClient, ctx: &mut RunContext) -> Preparation {
        let Ok(url) = self.parsed() else {
            return Preparation::Unreachable("invalid url".to_string());
        };
        let baseline = client.get(url.as_str(), None).await;
        if !baseline.success {
            return Preparation::Unreachable(baseline.error.unwrap_or_default());
        }
        ctx.install_baseline(Baseline::single(PLAIN, baseline));
        Preparation::Ready
    }

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        let Ok(url) = self.parsed() else {
            return Vec::new();
        };

        query_names(&url)
            .iter()
            .flat_map(|param| self.param_probes(&url, param))
            .collect()
    }

    fn classify(&self, ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        let (kinds, param) = probe.label_parts();
        let (kinds, param) = (kinds.to_string(), param.to_string());

        let mut verdict = Verdict::none();
        for kind in kinds.split('+') {
            let group = format!("{}:{}", kind, param);
            if ctx.tallies.contains_key(&group) {
                continue;
            }
            let outcome = self.technique(ctx, kind, &param, probe, response);
            if outcome.findings.is_empty() {
                continue;
            }
            if GROUPED.contains(&kind) {
                ctx.tally(&group);
                verdict = verdict.settling(group);
            }
            verdict = verdict.merge(outcome);
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok};
    use crate::models::{RunStatus, Severity};
    use crate::tools::testing;

    fn only(url: &str, error: bool, boolean: bool, union: bool) -> SqliDetect {
        SqliDetect {
            error_based: error,
            time_based: false,
            boolean_based: boolean,
            union,
            ..SqliDetect::new(url)
        }
    }

    #[test]
    fn test_requires_query_parameters() {
        assert!(SqliDetect::new("https://t/items").validate().is_err());
        assert!(SqliDetect::new("https://t/items?id=1").validate().is_ok());
    }

    #[test]
    fn test_candidate_counts() {
        let tool = SqliDetect::new("https://t/items?id=1&sort=asc");
        let ctx = RunContext::new("t", Default::default());
        let probes = tool.candidates(&ctx);
        assert_eq!(probes.len(), 2 * (13 + 3 + 2 + 6 - 1));
        let time = probes.iter().find(|p| p.label == "time:id").unwrap();
        assert_eq!(time.timeout_ms, Some(15_000));
        assert!(probes.iter().any(|p| p.url.contains("sort=asc") && p.label == "error:id"));

        let shared = probes.iter().find(|p| p.label == "error+union:id").unwrap();
        assert_eq!(shared.group, None);
        assert!(shared.url.ends_with("id=%27+UNION+SELECT+NULL--&sort=asc"));
    }

    #[tokio::test]
    async fn test_error_based_stops_after_first_hit() {
        let transport = MockTransport::new(|req| {
            if req.url.contains("id=%27") {
                ok(500, "You have an error in your SQL syntax; check the manual for MySQL")
            } else {
                ok(200, "item 1")
            }
        });

        let run = testing::run(&only("https://t/items?id=1", true, false, false), transport.clone()).await;
        assert_eq!(run.findings.len(), 1);
        assert_eq!(run.findings[0].severity, Severity::Critical);
        assert_eq!(run.findings[0].title, "SQL Injection (Error-Based) - id");
        assert_eq!(run.findings[0].detail_str("dbType"), Some("MySQL"));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_boolean_pair() {
        let transport = MockTransport::new(|req| {
            if req.url.contains("%27%3D%272") {
                ok(200, "")
            } else {
                ok(200, &"row ".repeat(40))
            }
        });

        let run = testing::run(&only("https://t/items?id=1", false, true, false), transport).await;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.findings.len(), 1);
        assert_eq!(run.findings[0].severity, Severity::High);
        assert_eq!(run.findings[0].detail_i64("lengthDiff"), Some(160));
    }

    #[tokio::test]
    async fn test_union_reports_once_per_parameter() {
        let transport = MockTransport::new(|req| if req.url.contains("UNION") { ok(200, "1 NULL") } else { ok(200, "item") });
        let run = testing::run(&only("https://t/items?id=1", false, false, true), transport.clone()).await;
        assert_eq!(run.findings.len(), 1);
        assert_eq!(run.findings[0].title, "Potential UNION SQLi - id");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_boolean_pair_on_empty_value() {
        let transport = MockTransport::new(|req| {
            if req.url.contains("%27%3D%272") {
                ok(200, "")
            } else {
                ok(200, &"row ".repeat(40))
            }
        });

        let run = testing::run(&only("https://t/items?id=", true, true, false), transport.clone()).await;
        assert_eq!(run.dispatched, 14);
        let false_requests = transport.requests().iter().filter(|r| r.url.contains("%27%3D%272")).count();
        assert_eq!(false_requests, 1);
        assert_eq!(run.findings.len(), 1);
        assert_eq!(run.findings[0].title, "SQL Injection (Boolean-Based) - id");
        assert_eq!(run.findings[0].detail_i64("lengthDiff"), Some(160));
    }

    #[tokio::test]
    async fn test_union_payload_shared_with_error_list() {
        let transport = MockTransport::new(|req| {
            if req.url.ends_with("id=%27+UNION+SELECT+NULL--") {
                ok(200, "1 NULL NULL")
            } else {
                ok(200, "item")
            }
        });

        let run = testing::run(&only("https://t/items?id=1", true, false, true), transport).await;
        assert_eq!(run.findings.len(), 1);
        assert_eq!(run.findings[0].title, "Potential UNION SQLi - id");
        assert!(run.findings[0].value.ends_with("id=%27+UNION+SELECT+NULL--"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_techniques_together() {
        let transport = MockTransport::slow(std::time::Duration::from_secs(6), |req| {
            if req.url.ends_with("id=%22") {
                ok(500, "You have an error in your SQL syntax; check the manual for MySQL")
            } else if req.url.contains("%27%3D%272") {
                ok(200, "")
            } else if req.url.contains("UNION+SELECT+1%2C2%2C3") {
                ok(200, "1 2 3 null")
            } else {
                ok(200, &"row ".repeat(40))
            }
        });

        let run = testing::run(&SqliDetect::new("https://t/items?id=1"), transport).await;
        let mut titles: Vec<_> = run.findings.iter().map(|f| (f.severity, f.title.as_str())).collect();
        titles.sort();
        assert_eq!(
            titles,
            vec![
                (Severity::Critical, "SQL Injection (Error-Based) - id"),
                (Severity::Critical, "SQL Injection (Time-Based) - id"),
                (Severity::High, "SQL Injection (Boolean-Based) - id"),
                (Severity::Medium, "Potential UNION SQLi - id"),
            ]
        );
    }
}
