use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{normalize_host, require};
use crate::error::{EngineError, EngineResult};
use crate::generator::HeaderFanout;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, Severity, ToolId};
use crate::scanner::{RunContext, Tool, Verdict};

const DETECT_PORTS: &[u16] = &[80, 443, 8080, 8443, 3000, 5000, 8000, 8888, 9000, 9090];
const ADMIN_DEFAULT_PORTS: &[u16] = &[80, 443, 8080];
const WS_PORTS: &[u16] = &[80, 443, 8080, 3000];
const WS_PATHS: &[&str] = &["/", "/ws", "/websocket", "/socket.io/", "/sockjs/"];

const DETECT_TIMEOUT_MS: u64 = 5000;
const SERVICE_TIMEOUT_MS: u64 = 3000;

struct AdminInterface {
    name: &'static str,
    paths: &'static [&'static str],
    ports: Option<&'static [u16]>,
    signatures: &'static [&'static str],
}

impl AdminInterface {
    fn ports(&self) -> &'static [u16] {
        self.ports.unwrap_or(ADMIN_DEFAULT_PORTS)
    }

    fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.signatures.iter().any(|sig| lower.contains(&sig.to_lowercase()))
    }
}

const ADMIN_INTERFACES: &[AdminInterface] = &[
    AdminInterface {
        name: "phpMyAdmin",
        paths: &["/phpmyadmin/", "/pma/", "/mysql/", "/db/"],
        ports: None,
        signatures: &["phpMyAdmin", "pma_"],
    },
    AdminInterface {
        name: "Adminer",
        paths: &["/adminer/", "/adminer.php"],
        ports: None,
        signatures: &["Adminer"],
    },
    AdminInterface {
        name: "pgAdmin",
        paths: &["/pgadmin/", "/pgadmin4/"],
        ports: None,
        signatures: &["pgAdmin"],
    },
    AdminInterface {
        name: "Kibana",
        paths: &["/", "/_plugin/kibana/"],
        ports: Some(&[5601]),
        signatures: &["kibana", "kbn-name"],
    },
    AdminInterface {
        name: "Jenkins",
        paths: &["/", "/jenkins/"],
        ports: Some(&[8080]),
        signatures: &["Jenkins", "jenkins-session", "X-Jenkins"],
    },
    AdminInterface {
        name: "Grafana",
        paths: &["/login", "/"],
        ports: Some(&[3000]),
        signatures: &["grafana"],
    },
    AdminInterface {
        name: "Prometheus",
        paths: &["/metrics", "/graph"],
        ports: Some(&[9090]),
        signatures: &["prometheus"],
    },
    AdminInterface {
        name: "RabbitMQ",
        paths: &["/", "/api/"],
        ports: Some(&[15672]),
        signatures: &["RabbitMQ"],
    },
    AdminInterface {
        name: "Docker",
        paths: &["/v1.40/containers/json", "/version", "/_ping"],
        ports: Some(&[2375, 2376]),
        signatures: &["docker", "ApiVersion"],
    },
    AdminInterface {
        name: "Kubernetes",
        paths: &["/api", "/api/v1", "/healthz"],
        ports: Some(&[6443, 8443, 10250]),
        signatures: &["kubernetes", "k8s"],
    },
];

const SERVICE_CHECKS: &[(&str, u16, &str)] = &[
    ("Elasticsearch", 9200, "/"),
    ("Kibana", 5601, "/"),
    ("Grafana", 3000, "/login"),
    ("Prometheus", 9090, "/graph"),
    ("Jenkins", 8080, "/"),
    ("RabbitMQ Management", 15672, "/"),
    ("CouchDB", 5984, "/"),
    ("Consul", 8500, "/v1/agent/self"),
    ("etcd", 2379, "/version"),
    ("Memcached Stats", 11211, "/"),
    ("Redis Commander", 8081, "/"),
    ("Mongo Express", 8081, "/"),
    ("Traefik Dashboard", 8080, "/dashboard/"),
    ("Portainer", 9000, "/"),
    ("Kubernetes Dashboard", 8443, "/"),
];

fn tls_scheme(port: u16) -> &'static str {
    if matches!(port, 443 | 8443) { "https" } else { "http" }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceId {
    pub name: String,
    pub description: String,
    pub severity: Severity,
}

pub fn identify_service(response: &ResponseRecord, port: u16) -> ServiceId {
    let body = response.body.to_lowercase();
    let headers = response.header_text();

    let admin = ADMIN_INTERFACES
        .iter()
        .filter(|iface| iface.ports.is_some_and(|ports| ports.contains(&port)))
        .find(|iface| iface.matches(&response.body) || iface.matches(&headers));
    if let Some(iface) = admin {
        return ServiceId {
            name: iface.name.to_string(),
            description: "Management interface detected".to_string(),
            severity: Severity::High,
        };
    }

    if body.contains("cluster_name") && body.contains("version") {
        ServiceId {
            name: "Elasticsearch".to_string(),
            description: "Search engine API".to_string(),
            severity: Severity::High,
        }
    } else if body.contains("\"status\"") || body.contains("\"data\"") || body.contains("\"error\"") {
        ServiceId {
            name: "API Endpoint".to_string(),
            description: "JSON API detected".to_string(),
            severity: Severity::Medium,
        }
    } else {
        ServiceId {
            name: "HTTP Service".to_string(),
            description: format!("Web service on port {}", port),
            severity: Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtoDetect {
    pub host: String,
    pub ports: Vec<u16>,
    pub detect: bool,
    pub admin: bool,
    pub services: bool,
    pub websocket: bool,
}

impl ProtoDetect {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ports: Vec::new(),
            detect: true,
            admin: true,
            services: true,
            websocket: true,
        }
    }

    fn detect_ports(&self) -> Vec<u16> {
        let mut ports = self.ports.clone();
        for port in DETECT_PORTS {
            if !ports.contains(port) {
                ports.push(*port);
            }
        }
        ports
    }

    fn detection_probes(&self, host: &str) -> Vec<ProbeDescriptor> {
        self.detect_ports()
            .into_iter()
            .flat_map(|port| {
                let schemes: &[&str] = if matches!(port, 443 | 8443) { &["https"] } else { &["http", "https"] };
                let host = host.to_string();
                schemes.iter().map(move |scheme| {
                    ProbeDescriptor::get(format!("{}://{}:{}/", scheme, host, port), Purpose::PortProbe)
                        .with_label(format!("proto:{}", port))
                        .in_group(format!("proto:{}", port))
                        .with_timeout(DETECT_TIMEOUT_MS)
                })
            })
            .collect()
    }

    fn admin_probes(host: &str) -> Vec<ProbeDescriptor> {
        ADMIN_INTERFACES
            .iter()
            .flat_map(|iface| {
                iface.ports().iter().flat_map(move |port| {
                    iface.paths.iter().map(move |path| {
                        ProbeDescriptor::get(format!("{}://{}:{}{}", tls_scheme(*port), host, port, path), Purpose::Fingerprint)
                            .with_label(format!("admin:{}", iface.name))
                            .with_timeout(DETECT_TIMEOUT_MS)
                    })
                })
            })
            .collect()
    }

    fn service_probes(host: &str) -> Vec<ProbeDescriptor> {
        SERVICE_CHECKS
            .iter()
            .map(|(name, port, path)| {
                ProbeDescriptor::get(format!("{}://{}:{}{}", tls_scheme(*port), host, port, path), Purpose::PathDiscovery)
                    .with_label(format!("service:{}", name))
                    .with_timeout(SERVICE_TIMEOUT_MS)
            })
            .collect()
    }

    fn websocket_probes(host: &str) -> Vec<ProbeDescriptor> {
        WS_PORTS
            .iter()
            .flat_map(|port| {
                WS_PATHS.iter().map(move |path| {
                    let mut probe = ProbeDescriptor::get(format!("{}://{}:{}{}", tls_scheme(*port), host, port, path), Purpose::HostProbe)
                        .with_label(format!("ws:{}", port))
                        .in_group(format!("ws:{}", port))
                        .with_timeout(SERVICE_TIMEOUT_MS);
                    for (name, value) in HeaderFanout::WEBSOCKET_UPGRADE {
                        probe = probe.with_header(*name, *value);
                    }
                    probe
                })
            })
            .collect()
    }

    fn classify_http(&self, host: &str, url: &Url, response: &ResponseRecord) -> (Vec<Finding>, bool) {
        let port = url.port_or_known_default().unwrap_or_default();
        let path = url.path();
        let scheme = url.scheme();
        let mut findings = Vec::new();
        let mut settle = false;

        if self.detect && path == "/" && self.detect_ports().contains(&port) {
            let service = identify_service(response, port);
            findings.push(
                Finding::new(self.id(), FindingKind::Service, service.severity, service.name.clone(), format!("{}:{}", host, port))
                    .with_subtitle(format!("{} - {}", scheme.to_uppercase(), service.description))
                    .with_detail("port", port)
                    .with_detail("protocol", scheme)
                    .with_detail("service", service.name),
            );
            settle = true;
        }

        if !response.is_status(200) || scheme != tls_scheme(port) {
            return (findings, settle);
        }

        if self.admin {
            findings.extend(
                ADMIN_INTERFACES
                    .iter()
                    .filter(|iface| iface.ports().contains(&port) && iface.paths.contains(&path))
                    .filter(|iface| iface.matches(&response.body))
                    .map(|iface| {
                        Finding::critical(self.id(), FindingKind::Vulnerability, iface.name, url.as_str())
                            .with_subtitle("Admin interface exposed!")
                            .with_detail("port", port)
                    }),
            );
        }

        if self.services {
            findings.extend(
                SERVICE_CHECKS
                    .iter()
                    .filter(|(_, p, service_path)| *p == port && *service_path == path)
                    .map(|(name, _, _)| {
                        Finding::medium(self.id(), FindingKind::Service, *name, url.as_str())
                            .with_subtitle(format!("Service accessible on port {}", port))
                            .with_detail("port", port)
                    }),
            );
        }

        (findings, settle)
    }
}

#[async_trait]
impl Tool for ProtoDetect {
    fn id(&self) -> ToolId {
        ToolId::ProtoDetect
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

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        let host = normalize_host(&self.host);
        let mut probes = Vec::new();
        if self.detect {
            probes.extend(self.detection_probes(&host));
        }
        if self.admin {
            probes.extend(Self::admin_probes(&host));
        }
        if self.services {
            probes.extend(Self::service_probes(&host));
        }
        if self.websocket {
            probes.extend(Self::websocket_probes(&host));
        }
        probes
    }

    fn classify(&self, _ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        if !response.success {
            return Verdict::none();
        }
        let Ok(url) = Url::parse(&probe.url) else {
            return Verdict::none();
        };
        let host = normalize_host(&self.host);

        if let ("ws", port) = probe.label_parts() {
            if response.status != 101 && !response.has_header("upgrade") {
                return Verdict::none();
            }
            let ws_scheme = if port == "443" { "wss" } else { "ws" };
            return Verdict::one(
                Finding::info(
                    self.id(),
                    FindingKind::Service,
                    "WebSocket Endpoint",
                    format!("{}://{}:{}{}", ws_scheme, host, port, url.path()),
                )
                .with_subtitle("WebSocket service detected"),
            )
            .settled();
        }

        let (findings, settle) = self.classify_http(&host, &url, response);
        let verdict = Verdict::many(findings);
        if settle { verdict.settled() } else { verdict }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok_with_headers, refused};
    use crate::tools::testing;

    #[test]
    fn test_identify_service() {
        let record = |body: &str, headers: Vec<(&str, &str)>| {
            ResponseRecord::new(
                200,
                headers.into_iter().map(|(k, v)| (k.to_string(), v.to_string())),
                body.to_string(),
                String::new(),
                1,
            )
        };
        assert_eq!(identify_service(&record("", vec![("X-Jenkins", "2.4")]), 8080).name, "Jenkins");
        assert_eq!(identify_service(&record("", vec![("X-Jenkins", "2.4")]), 80).name, "HTTP Service");
        assert_eq!(
            identify_service(&record(r#"{"cluster_name":"es","version":{}}"#, vec![]), 9200).severity,
            Severity::High
        );
        assert_eq!(identify_service(&record(r#"{"data":[]}"#, vec![]), 80).severity, Severity::Medium);
    }

    #[test]
    fn test_candidate_mix() {
        let tool = ProtoDetect {
            ports: vec![9200],
            ..ProtoDetect::new("http://box/")
        };
        let ctx = RunContext::new("box", Default::default());
        let probes = tool.candidates(&ctx);
        assert_eq!(probes[0].url, "http://box:9200/");
        let ws = probes.iter().filter(|p| p.label.starts_with("ws:")).count();
        assert_eq!(ws, WS_PORTS.len() * WS_PATHS.len());
        assert!(probes.iter().any(|p| p.url == "http://box:6443/healthz"));
    }

    #[tokio::test]
    async fn test_jenkins_on_8080() {
        let transport = MockTransport::new(|req| {
            if req.url == "http://box:8080/" && !req.headers.contains_key("Upgrade") {
                ok_with_headers(200, &[("X-Jenkins", "2.401")], "<title>Dashboard [Jenkins]</title>")
            } else if req.url == "http://box:3000/ws" {
                ok_with_headers(101, &[("Upgrade", "websocket")], "")
            } else {
                refused()
            }
        });

        let run = testing::run(&ProtoDetect::new("box"), transport).await;
        let summary: Vec<_> = run
            .findings
            .iter()
            .map(|f| (f.severity, f.title.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Severity::Critical, "Jenkins", "http://box:8080/"),
                (Severity::High, "Jenkins", "box:8080"),
                (Severity::Medium, "Jenkins", "http://box:8080/"),
                (Severity::Info, "WebSocket Endpoint", "ws://box:3000/ws"),
            ]
        );
    }
}
