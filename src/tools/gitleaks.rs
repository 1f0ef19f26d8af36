use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::{normalize_origin, require};
use crate::error::EngineResult;
use crate::generator::paths::{BACKUP_PATHS, CONFIG_PATHS, ENV_PATHS, GIT_PATHS};
use crate::generator::union_paths;
use crate::http::EgressClient;
use crate::models::{Finding, FindingKind, ProbeDescriptor, Purpose, ResponseRecord, Severity, ToolId};
use crate::scanner::{RunContext, Tool, Verdict};

const PROBE_TIMEOUT_MS: u64 = 5000;
const GIT_HEAD: &str = "/.git/HEAD";
const GIT_LOG: &str = "/.git/logs/HEAD";

static BRANCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"ref: refs/heads/(.+)").expect("static pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exposure {
    pub title: &'static str,
    pub description: String,
    pub kind: FindingKind,
    pub severity: Severity,
}

impl Exposure {
    fn new(title: &'static str, description: impl Into<String>, kind: FindingKind, severity: Severity) -> Self {
        Self {
            title,
            description: description.into(),
            kind,
            severity,
        }
    }
}

pub fn exposure(path: &str, body: &str, content_type: &str) -> Option<Exposure> {
    let lower_path = path.to_lowercase();
    let lower_body = body.to_lowercase();
    let html = content_type.contains("text/html");

    if lower_path.contains(".git/") {
        if lower_path.contains("head") && body.starts_with("ref: refs/") {
            Some(Exposure::new(
                "Git Repository Exposed",
                "Full .git folder accessible - source code leak!",
                FindingKind::Vulnerability,
                Severity::Critical,
            ))
        } else if lower_path.contains("config") && body.contains("[core]") {
            Some(Exposure::new(
                "Git Config Exposed",
                "Git configuration with potential credentials",
                FindingKind::Secret,
                Severity::High,
            ))
        } else if !body.is_empty() && !html {
            Some(Exposure::new(
                "Git File Exposed",
                format!("Git file accessible: {}", path),
                FindingKind::Warning,
                Severity::High,
            ))
        } else {
            None
        }
    } else if lower_path.contains(".env") {
        (body.contains('=') && !html).then(|| {
            Exposure::new(
                "Environment File Exposed",
                "Environment file with potential secrets",
                FindingKind::Secret,
                Severity::Critical,
            )
        })
    } else if lower_path.contains("config") || lower_path.contains("settings") {
        let sensitive = ["password", "secret", "key", "database"]
            .iter()
            .any(|word| lower_body.contains(word));
        (!body.is_empty() && !html && sensitive).then(|| {
            Exposure::new(
                "Config File Exposed",
                "Configuration file with sensitive data",
                FindingKind::Secret,
                Severity::High,
            )
        })
    } else if lower_path.contains(".sql") || lower_path.contains("backup") || lower_path.contains("dump") {
        let dump = lower_body.contains("insert into")
            || lower_body.contains("create table")
            || content_type.contains("application/")
            || body.len() > 1000;
        (!body.is_empty() && dump).then(|| {
            Exposure::new(
                "Database Backup Exposed",
                "Database dump file accessible",
                FindingKind::Secret,
                Severity::Critical,
            )
        })
    } else if lower_path.contains("phpinfo") || lower_path.contains("info.php") {
        (lower_body.contains("php version") || lower_body.contains("configuration")).then(|| {
            Exposure::new(
                "PHPInfo Exposed",
                "PHP configuration information leaked",
                FindingKind::Warning,
                Severity::Medium,
            )
        })
    } else if lower_path.contains(".htpasswd") {
        body.contains(':').then(|| {
            Exposure::new(".htpasswd Exposed", "Password hash file accessible", FindingKind::Secret, Severity::Critical)
        })
    } else if body.len() > 100 && !html {
        Some(Exposure::new(
            "File Exposed",
            format!("File accessible: {}", path),
            FindingKind::Info,
            Severity::Low,
        ))
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GitLeaks {
    pub url: String,
    pub git: bool,
    pub config: bool,
    pub env: bool,
    pub backup: bool,
}

impl GitLeaks {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            git: true,
            config: true,
            env: true,
            backup: true,
        }
    }

    fn paths(&self) -> Vec<String> {
        let selected: Vec<&[&str]> = [
            (self.git, GIT_PATHS),
            (self.config, CONFIG_PATHS),
            (self.env, ENV_PATHS),
            (self.backup, BACKUP_PATHS),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .map(|(_, list)| list)
        .collect();
        union_paths(&selected)
    }
}

#[async_trait]
impl Tool for GitLeaks {
    fn id(&self) -> ToolId {
        ToolId::GitLeaks
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

    fn candidates(&self, _ctx: &RunContext) -> Vec<ProbeDescriptor> {
        let Ok(origin) = normalize_origin(&self.url) else {
            return Vec::new();
        };
        self.paths()
            .into_iter()
            .map(|path| {
                ProbeDescriptor::get(format!("{}{}", origin, path), Purpose::PathDiscovery)
                    .with_label(format!("path:{}", path))
                    .with_timeout(PROBE_TIMEOUT_MS)
            })
            .collect()
    }

    fn classify(&self, ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict {
        if !response.is_status(200) {
            return Verdict::none();
        }
        let (_, path) = probe.label_parts();
        if path == GIT_HEAD || path == GIT_LOG {
            ctx.stash.insert(path.to_string(), response.clone());
        }

        let content_type = response.header("content-type").unwrap_or_default();
        let Some(exposure) = exposure(path, &response.body, content_type) else {
            return Verdict::none();
        };
        if exposure.title == "Git Repository Exposed" {
            ctx.tally("git-head");
        }

        Verdict::one(
            Finding::new(self.id(), exposure.kind, exposure.severity, exposure.title, probe.url.clone())
                .with_subtitle(exposure.description)
                .with_detail("path", path)
                .with_detail("size", response.body_len()),
        )
    }

    async fn finish(&self, _client: &EgressClient, ctx: &mut RunContext) -> Vec<Finding> {
        if !self.git || ctx.tallies.get("git-head").copied().unwrap_or(0) == 0 {
            return Vec::new();
        }

        let mut findings = Vec::new();
        if let Some(branch) = ctx
            .stash
            .get(GIT_HEAD)
            .and_then(|head| BRANCH.captures(&head.body))
            .and_then(|caps| caps.get(1))
        {
            findings.push(
                Finding::info(self.id(), FindingKind::Info, "Git Branch", branch.as_str().trim())
                    .with_subtitle("Current branch name"),
            );
        }

        if let Some(log) = ctx.stash.get(GIT_LOG) {
            let commits = log.body.lines().filter(|l| !l.trim().is_empty()).count();
            if commits > 0 {
                findings.push(
                    Finding::medium(self.id(), FindingKind::Info, "Git Commits Found", format!("{} commits in log", commits))
                        .with_subtitle("Commit history accessible")
                        .with_detail("commits", commits),
                );
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok, ok_with_headers};
    use crate::tools::testing;

    #[test]
    fn test_exposure_rules() {
        assert_eq!(exposure("/.git/HEAD", "ref: refs/heads/main\n", "").unwrap().severity, Severity::Critical);
        assert_eq!(exposure("/.git/config", "[core]\nbare = false", "").unwrap().title, "Git Config Exposed");
        assert!(exposure("/.git/index", "<html>", "text/html").is_none());
        assert_eq!(exposure("/.env", "DB_PASS=x", "text/plain").unwrap().severity, Severity::Critical);
        assert!(exposure("/.env", "<html>nope</html>", "text/html").is_none());
        assert!(exposure("/config.json", r#"{"theme":"dark"}"#, "application/json").is_none());
        assert_eq!(exposure("/config.json", r#"{"api_key":"x"}"#, "application/json").unwrap().kind, FindingKind::Secret);
        assert_eq!(exposure("/dump.sql", "INSERT INTO users", "").unwrap().title, "Database Backup Exposed");
        assert_eq!(exposure("/phpinfo.php", "PHP Version 8.1", "text/html").unwrap().severity, Severity::Medium);
        assert_eq!(exposure("/.htpasswd", "admin:$apr1$x", "").unwrap().severity, Severity::Critical);
        assert_eq!(exposure("/robots.txt", &"Disallow: /\n".repeat(20), "text/plain").unwrap().severity, Severity::Low);
        assert!(exposure("/robots.txt", "short", "text/plain").is_none());
    }

    #[tokio::test]
    async fn test_repository_post_pass() {
        let transport = MockTransport::new(|req| match req.url.as_str() {
            "https://t/.git/HEAD" => ok(200, "ref: refs/heads/develop\n"),
            "https://t/.git/logs/HEAD" => ok(200, "a b c commit: one\nb c d commit: two\n\n"),
            "https://t/.git/config" => ok_with_headers(200, &[("Content-Type", "text/plain")], "[core]\n"),
            _ => ok_with_headers(404, &[("Content-Type", "text/html")], "<html>404</html>"),
        });
        let tool = GitLeaks {
            config: false,
            env: false,
            backup: false,
            ..GitLeaks::new("https://t/some/page")
        };

        let run = testing::run(&tool, transport).await;
        let titles: Vec<_> = run.findings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Git Repository Exposed", "Git Config Exposed", "Git File Exposed", "Git Commits Found", "Git Branch"]
        );
        let branch = run.findings.iter().find(|f| f.title == "Git Branch").unwrap();
        assert_eq!(branch.value, "develop");
        let commits = run.findings.iter().find(|f| f.title == "Git Commits Found").unwrap();
        assert_eq!(commits.detail_i64("commits"), Some(2));
    }
}
