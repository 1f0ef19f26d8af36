use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{parse_url, require};
use crate::analyzer::{Baseline, HIGH_PRIV, LOW_PRIV, NO_AUTH, compare, header_bypass_rule, idor_rule};
use crate::error::EngineResult;
use crate::generator::{HeaderFanout, substitute_ids};
use crate::http::EgressClient;
use crate::models::{Finding, FindingKind, HttpMethod, ProbeDescriptor, Purpose, ResponseRecord, ToolId};
use crate::scanner::{Preparation, RunContext, Tool, Verdict};

const OVERRIDE_TARGETS: &[&str] = &["PUT", "DELETE", "PATCH"];

#[derive(Debug, Clone, Serialize)]
pub struct AuthBypass {
    pub url: String,
    pub high_token: Option<String>,
    pub low_token: Option<String>,
    pub id_values: Vec<String>,
    pub idor: bool,
    pub methods: bool,
    pub headers: bool,
    pub paths: bool,
}

impl AuthBypass {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            high_token: None,
            low_token: None,
            id_values: Vec::new(),
            idor: true,
            methods: true,
            headers: true,
            paths: true,
        }
    }

    fn auth_headers(token: Option<&String>) -> BTreeMap<String, String> {
        token
            .map(|t| BTreeMap::from([("Authorization".to_string(), t.clone())]))
            .unwrap_or_default()
    }

    fn idor_probes(&self) -> Vec<ProbeDescriptor> {
        substitute_ids(&self.url, &self.id_values)
            .into_iter()
            .map(|candidate| {
                let mut probe = ProbeDescriptor::get(candidate.url, Purpose::IdSubstitution)
                    .with_label(format!("idor:{}", candidate.test_id));
                if let Some(token) = &self.low_token {
                    probe = probe.with_header("Authorization", token.clone());
                }
                probe
            })
            .collect()
    }

    fn method_probes(&self) -> Vec<ProbeDescriptor> {
        let direct = HttpMethod::ALL.into_iter().map(|method| {
            ProbeDescriptor::new(method, self.url.clone(), Purpose::MethodProbe).with_label(format!("method:{}", method))
        });

        let overrides = HeaderFanout::METHOD_OVERRIDE.iter().flat_map(|header| {
            OVERRIDE_TARGETS.iter().map(move |target| {
                ProbeDescriptor::new(HttpMethod::Post, self.url.clone(), Purpose::MethodProbe)
                    .with_header(*header, *target)
                    .with_label(format!("override:{}", header))
            })
        });

        direct.chain(overrides).collect()
    }

    fn path_probes(&self) -> Vec<ProbeDescriptor> {
        let Ok(url) = parse_url(&self.url) else {
            return Vec::new();
        };
        let origin = url.origin().ascii_serialization();
        let search = url.query().map(|q| format!("?{}", q)).unwrap_or_default();

        path_variants(url.path())
            .into_iter()
            .map(|variant| {
                ProbeDescriptor::get(format!("{}{}{}", origin, variant, search), Purpose::PathDiscovery)
                    .with_label(format!("path:{}", variant))
            })
            .collect()
    }

    fn classify_method(&self, ctx: &RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Option<Finding> {
        if !response.success {
            return None;
        }

        match probe.label_parts() {
            ("method", method) => {
                let baseline = ctx.baseline_record(HIGH_PRIV)?;
                (response.status == 200 && baseline.status != 200).then(|| {
                    Finding::medium(self.id(), FindingKind::Warning, format!("Method {} allowed", method), format!("{} {}", method, probe.url))
                        .with_subtitle(format!("Got {} instead of {}", response.status, baseline.status))
                        .with_detail("method", method)
                        .with_detail("status", response.status)
                })
            }
            ("override", header) => {
                let target = probe.headers.get(header).cloned().unwrap_or_default();
                (!matches!(response.status, 403 | 405)).then(|| {
                    Finding::medium(self.id(), FindingKind::Warning, format!("Method Override: {}", header), format!("{}: {}", header, target))
                        .with_subtitle(format!("Override to {} returned {}", target, response.status))
                        .with_detail("header", header)
                        .with_detail("method", target)
                        .with_detail("status", response.status)
                })
            }
            _ => None,
        }
    }

    fn classify_path(&self, ctx: &RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Option<Finding> {
        let baseline = ctx.baseline_record(NO_AUTH)?;
        if !response.success {
            return None;
        }
        let (_, variant) = probe.label_parts();
        let diff = compare(response, baseline);

        if diff.status_changed && response.status == 200 && baseline.status != 200 {
            Some(
                Finding::medium(self.id(), FindingKind::Warning, "Path Traversal Bypass", probe.url.clone())
                    .with_subtitle(format!("Status changed: {} → {}", baseline.status, response.status))
                    .with_detail("payload", variant),
            )
        } else if diff.abs_length_delta() > ctx.thresholds().path_variant_delta {
            Some(
                Finding::low(self.id(), FindingKind::Info, "Path Variation Detected", probe.url.clone())
                    .with_subtitle(format!("Response size differs by {} bytes", diff.abs_length_delta()))
                    .with_detail("payload", variant)
                    .with_detail("lengthDiff", diff.abs_length_delta()),
            )
        } else {
            None
        }
    }
}

pub fn path_variants(path: &str) -> Vec<String> {
    let parent = if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/..", path)
    };

    vec![
        format!("{}/", path),
        format!("{}/.", path),
        format!("{}//", path),
        format!("{}/./", path),
        format!("{}%2f", path),
        format!("{}%252f", path),
        parent,
        format!("//{}", path),
        format!("/./{}", path),
        format!("/../{}", path),
        format!("{}?", path),
        format!("{}#", path),
        format!("{}%00", path),
        format!("{}%0a", path),
        format!("{}%0d", path),
        path.to_uppercase(),
        format!("{}.json", path),
        format!("{}.html", path),
    ]
}

#[async_trait]
impl Tool for AuthBypass {
    fn id(&self) -> ToolId {
        ToolId::AuthBypass
    }

    fn target(&self) -> &str {
        &self.url
    }

    fn config(&self) -> Value {
        let mut config = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(map) = config.as_object_mut() {
            for key in ["high_token", "low_token"] {
                if map.get(key).is_some_and(|v| !v.is_null()) {
                    map.insert(key.to_string(), Value::from("<redacted>"));
                }
            }
        }
        config
    }

    fn validate(&self) -> EngineResult<()> {
        require(&self.url, "url")?;
        parse_url(&self.url).map(|_| ())
    }

    async fn prepare(&self, client: &EgressClient, ctx: &mut RunContext) -> Preparation {
        let high = client
            .send(HttpMethod::Get, &self.url, &Self::auth_headers(self.high_token.as_ref()), None, None)
            .await;
        let low = client
            .send(HttpMethod::Get, &self.url, &Self::auth_headers(self.low_token.as_ref()), None, None)
            .await;
        let none = client.get(&self.url, None).await;

        if !none.success {
            return Preparation::Unreachable(none.error.unwrap_or_default());
        }

        ctx.install_baseline(Baseline::from_records([
            (HIGH_PRIV.to_string(), high),
            (LOW_PRIV.to_string(), low),
            (NO_AUTH.to_string(), none),
        ]));
        Preparation::Ready
    }

    fn candidates(&self, ctx: &RunContext) -> Vec<ProbeDescriptor> {
        let mut probes = Vec::new();

        if self.idor {
            probes.extend(self.idor_probes());
        }
        if self.methods {
            probes.extend(self.method_probes());
        }
        let denied = ctx
            .baseline_record(NO_AUTH)
            .is_some_and(|r| matches!(r.status, 401 | 403));
        if self.headers && denied {
            probes.extend(HeaderFanout::fan_out(&self.url, HeaderFanout::AUTH_BYPASS));
        }
        if self.paths {
            probes.extend(self.path_probes());
        }

        probes
    }

    fn classify(&self, ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        let finding = match probe.purpose {
            Purpose::IdSubstitution if idor_rule(response, ctx.thresholds()) => {
                let (_, test_id) = probe.label_parts();
                Some(
                    Finding::high(self.id(), FindingKind::Vulnerability, "Potential IDOR Vulnerability", probe.url.clone())
                        .with_subtitle(format!("Accessed resource with ID: {}", test_id))
                        .with_detail("testId", test_id)
                        .with_detail("status", response.status),
                )
            }
            Purpose::MethodProbe => self.classify_method(ctx, probe, response),
            Purpose::HeaderBypass => {
                let no_auth = ctx.baseline_record(NO_AUTH);
                no_auth.filter(|b| header_bypass_rule(b, response)).map(|b| {
                    let (_, header) = probe.label_parts();
                    let value = probe.headers.get(header).cloned().unwrap_or_default();
                    Finding::critical(
                        self.id(),
                        FindingKind::Vulnerability,
                        format!("Header-Based Auth Bypass ({})", header),
                        format!("{}: {}", header, value),
                    )
                    .with_subtitle(format!("Bypassed {} with header", b.status))
                    .with_detail("header", header)
                    .with_detail("originalStatus", b.status)
                })
            }
            Purpose::PathDiscovery => self.classify_path(ctx, probe, response),
            _ => None,
        };
        finding.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok};
    use crate::models::{RunStatus, Severity};
    use crate::tools::testing;

    fn headers_only(url: &str) -> AuthBypass {
        AuthBypass {
            idor: false,
            methods: false,
            paths: false,
            ..AuthBypass::new(url)
        }
    }

    #[test]
    fn test_path_variants() {
        let variants = path_variants("/admin");
        assert_eq!(variants.len(), 18);
        assert!(variants.contains(&"/admin/..".to_string()));
        assert!(variants.contains(&"/ADMIN".to_string()));
        assert_eq!(path_variants("/admin/")[6], "/admin/");
    }

    #[tokio::test]
    async fn test_spoofed_forwarded_for_bypasses_401() {
        let transport = MockTransport::new(|req| {
            if req.headers.get("X-Forwarded-For").map(String::as_str) == Some("127.0.0.1") {
                ok(200, "welcome admin")
            } else {
                ok(401, "unauthorized")
            }
        });

        let run = testing::run(&headers_only("https://t/admin"), transport).await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.findings.len(), 1);
        let finding = &run.findings[0];
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.kind, FindingKind::Vulnerability);
        assert!(finding.title.contains("X-Forwarded-For"));
        assert_eq!(finding.value, "X-Forwarded-For: 127.0.0.1");
    }

    #[tokio::test]
    async fn test_header_fanout_skipped_when_baseline_allowed() {
        let transport = MockTransport::new(|_| ok(200, "open"));
        let run = testing::run(&headers_only("https://t/admin"), transport.clone()).await;

        assert!(run.findings.is_empty());
        assert_eq!(run.note.as_deref(), Some("no candidates"));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_idor_uses_low_token_and_flags_data() {
        let transport = MockTransport::new(|req| {
            if req.url.ends_with("/users/7") {
                ok(200, &"{\"email\":\"victim@t\"}".repeat(10))
            } else if req.url.ends_with("/users/42") {
                ok(200, "mine")
            } else {
                ok(404, "not found")
            }
        });
        let tool = AuthBypass {
            low_token: Some("Bearer low".into()),
            id_values: vec!["7".into()],
            methods: false,
            headers: false,
            paths: false,
            ..AuthBypass::new("https://t/users/42")
        };

        let run = testing::run(&tool, transport.clone()).await;
        assert_eq!(run.findings.len(), 1);
        assert_eq!(run.findings[0].value, "https://t/users/7");
        assert_eq!(run.findings[0].severity, Severity::High);

        let idor_request = transport.requests().into_iter().find(|r| r.url.ends_with("/users/7")).unwrap();
        assert_eq!(idor_request.headers.get("Authorization").map(String::as_str), Some("Bearer low"));
    }

    #[tokio::test]
    async fn test_idor_skipped_on_path_without_ids() {
        let transport = MockTransport::new(|_| ok(200, &"{\"role\":\"admin\"}".repeat(10)));
        let tool = AuthBypass {
            methods: false,
            headers: false,
            paths: false,
            ..AuthBypass::new("https://t/admin")
        };

        let run = testing::run(&tool, transport.clone()).await;
        assert!(run.findings.is_empty());
        assert!(transport.requests().iter().all(|r| r.url == "https://t/admin"));
    }

    #[tokio::test]
    async fn test_method_override_and_path_variants() {
        let transport = MockTransport::new(|req| {
            if req.headers.contains_key("X-HTTP-Method") {
                ok(204, "")
            } else if req.headers.contains_key("X-HTTP-Method-Override") || req.headers.contains_key("X-Method-Override") {
                ok(405, "")
            } else if req.url == "https://t/admin/" {
                ok(200, "panel")
            } else if req.method == HttpMethod::Post || req.method == HttpMethod::Get {
                ok(403, "denied")
            } else {
                ok(405, "")
            }
        });
        let tool = AuthBypass {
            idor: false,
            headers: false,
            ..AuthBypass::new("https://t/admin")
        };

        let run = testing::run(&tool, transport).await;
        let titles: Vec<_> = run.findings.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Method Override: X-HTTP-Method"));
        assert!(titles.contains(&"Path Traversal Bypass"));
        assert!(!titles.iter().any(|t| t.starts_with("Method ") && t.ends_with("allowed")));
        assert_eq!(titles.iter().filter(|t| t.starts_with("Method Override")).count(), 3);
    }
}
