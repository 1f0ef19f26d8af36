use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{normalize_origin, require};
use crate::analyzer::{discovery_rule, path_category};
use crate::error::EngineResult;
use crate::generator::paths::{API_PATHS, GRAPHQL_PATHS, SWAGGER_PATHS};
use crate::generator::{union_paths, with_versions};
use crate::models::{Finding, FindingKind, HttpMethod, ProbeDescriptor, Purpose, ResponseRecord, ToolId};
use crate::reporter::TieBreak;
use crate::scanner::{RunContext, Tool, Verdict};

const PROBE_TIMEOUT_MS: u64 = 5000;
const INTROSPECTION_ENDPOINTS: &[&str] = &["/graphql", "/api/graphql", "/v1/graphql"];
const INTROSPECTION_QUERY: &str = r#"{"query":"{ __schema { types { name } } }"}"#;

#[derive(Debug, Clone, Serialize)]
pub struct ApiRecon {
    pub url: String,
    pub swagger: bool,
    pub graphql: bool,
    pub common: bool,
    pub versions: bool,
}

impl ApiRecon {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            swagger: true,
            graphql: true,
            common: true,
            versions: false,
        }
    }

    fn paths(&self) -> Vec<String> {
        let mut lists: Vec<&[&str]> = Vec::new();
        if self.swagger {
            lists.push(SWAGGER_PATHS);
        }
        if self.graphql {
            lists.push(GRAPHQL_PATHS);
        }
        if self.common {
            lists.push(API_PATHS);
        }

        let paths = union_paths(&lists);
        if self.versions { with_versions(paths) } else { paths }
    }
}

#[async_trait]
impl Tool for ApiRecon {
    fn id(&self) -> ToolId {
        ToolId::ApiRecon
    }

    fn target(&self) -> &str {
        &self.url
    }

    fn config(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn validate(&self) -> EngineResult<()> {
        require(&self.url, "url")?;
        normalize_origin(&self.url).map(|_| ())
    }

    fn tie_break(&self) -> TieBreak {
        TieBreak::TitleAsc
    }

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        let Ok(origin) = normalize_origin(&self.url) else {
            return Vec::new();
        };

        let mut probes: Vec<ProbeDescriptor> = self
            .paths()
            .into_iter()
            .map(|path| {
                ProbeDescriptor::get(format!("{}{}", origin, path), Purpose::PathDiscovery)
                    .with_label(format!("path:{}", path))
                    .with_timeout(PROBE_TIMEOUT_MS)
            })
            .collect();

        if self.graphql {
            probes.extend(INTROSPECTION_ENDPOINTS.iter().map(|endpoint| {
                ProbeDescriptor::new(HttpMethod::Post, format!("{}{}", origin, endpoint), Purpose::PayloadInjection)
                    .with_header("Content-Type", "application/json")
                    .with_body(INTROSPECTION_QUERY)
                    .with_label(format!("introspect:{}", endpoint))
                    .in_group("introspection")
                    .with_timeout(PROBE_TIMEOUT_MS)
            }));
        }

        probes
    }

    fn classify(&self, _ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        match probe.purpose {
            Purpose::PathDiscovery if discovery_rule(response) => {
                let (_, path) = probe.label_parts();
                let category = path_category(path, &response.body);
                Verdict::one(
                    Finding::new(self.id(), category.kind, category.severity, category.name, probe.url.clone())
                        .with_subtitle(format!("{} - {}", response.status, category.description))
                        .with_detail("path", path)
                        .with_detail("type", category.name),
                )
            }
            Purpose::PayloadInjection if response.success && response.body.contains("__schema") => Verdict::one(
                Finding::high(self.id(), FindingKind::Vulnerability, "GraphQL Introspection Enabled", probe.url.clone())
                    .with_subtitle("Full schema introspection is possible"),
            )
            .settled(),
            _ => Verdict::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok};
    use crate::models::{RunStatus, Severity};
    use crate::tools::testing;

    #[test]
    fn test_candidate_counts() {
        let tool = ApiRecon::new("example.com");
        let ctx = RunContext::new("example.com", Default::default());
        let probes = tool.candidates(&ctx);
        let paths = probes.iter().filter(|p| p.purpose == Purpose::PathDiscovery).count();
        assert_eq!(paths, SWAGGER_PATHS.len() + GRAPHQL_PATHS.len() + API_PATHS.len());
        assert_eq!(probes.iter().filter(|p| p.method == HttpMethod::Post).count(), 3);
        assert!(probes[0].url.starts_with("https://example.com/"));
    }

    #[tokio::test]
    async fn test_discovers_and_types_endpoints() {
        let transport = MockTransport::new(|req| {
            match (req.method, req.url.as_str()) {
                (HttpMethod::Get, "https://api.test/swagger.json") => ok(200, r#"{"swagger":"2.0"}"#),
                (HttpMethod::Get, "https://api.test/health") => ok(200, "ok"),
                (HttpMethod::Get, "https://api.test/actuator/env") => ok(200, "{}"),
                (HttpMethod::Post, "https://api.test/api/graphql") => ok(200, r#"{"data":{"__schema":{"types":[]}}}"#),
                _ => ok(404, "nope"),
            }
        });

        let run = testing::run(&ApiRecon::new("https://api.test/anything"), transport.clone()).await;
        assert_eq!(run.status, RunStatus::Completed);

        let titles: Vec<_> = run.findings.iter().map(|f| (f.title.as_str(), f.severity)).collect();
        assert_eq!(
            titles,
            vec![
                ("GraphQL Introspection Enabled", Severity::High),
                ("Spring Actuator", Severity::High),
                ("Swagger/OpenAPI", Severity::High),
                ("Health Check", Severity::Info),
            ]
        );

        let posts = transport.requests().into_iter().filter(|r| r.method == HttpMethod::Post).count();
        assert_eq!(posts, 2);
    }
}
