use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Settings;
use crate::generator::{ParamList, PortPreset, split_list};
use crate::http::EgressClient;
use crate::models::HttpMethod;
use crate::scanner::Tool;
use crate::signatures::TechCategory;
use crate::tools::{
    ApiRecon, AuthBypass, CachePoison, CertWatch, DnsTracer, GitLeaks, HeaderAudit, JsHunter, ParamFuzz, PortRush,
    ProtoDetect, RemotePage, SqliDetect, SubRecon, Wayback, WebTechFp, portrush::PortSelection,
};

#[derive(Parser)]
#[command(name = "probekit")]
#[command(version, about = "Probe-and-classify reconnaissance toolkit for web targets")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// JSON settings file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Pause between sequential requests (ms)
    #[arg(long, global = true)]
    pub delay: Option<u64>,

    /// Per-request timeout (ms)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Batch width for parallel tools
    #[arg(long, global = true)]
    pub concurrent: Option<usize>,

    #[arg(long, global = true)]
    pub no_redirects: bool,

    /// Extra request header, `Name: value`
    #[arg(short = 'H', long = "header", global = true)]
    pub headers: Vec<String>,

    /// Write the run to this file
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    #[arg(long, global = true, value_enum, default_value = "json")]
    pub format: ReportFormat,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[arg(long, global = true)]
    pub no_progress: bool,
}

impl GlobalArgs {
    /// Settings from the config file (or defaults) with flag overrides applied.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(delay) = self.delay {
            settings.delay = delay;
        }
        if let Some(timeout) = self.timeout {
            settings.timeout = timeout;
        }
        if let Some(concurrent) = self.concurrent {
            settings.concurrent = concurrent.max(1);
        }
        if self.no_redirects {
            settings.follow_redirects = false;
        }
        settings.add_header_lines(self.headers.iter().map(String::as_str));
        Ok(settings)
    }

    pub fn log_filter(&self) -> String {
        if self.verbose { "probekit=debug".to_string() } else { self.log_level.clone() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Html,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover API documentation, GraphQL and common API routes
    Apirecon {
        url: String,
        #[arg(long)]
        no_swagger: bool,
        #[arg(long)]
        no_graphql: bool,
        #[arg(long)]
        no_common: bool,
        #[arg(long)]
        no_versions: bool,
    },

    /// Try authorization bypasses: IDOR, verb tampering, header and path tricks
    Authbypass {
        url: String,
        /// Authorization value of a privileged session
        #[arg(long)]
        high_token: Option<String>,
        /// Authorization value of an unprivileged session
        #[arg(long)]
        low_token: Option<String>,
        /// Comma separated IDs to substitute
        #[arg(long)]
        ids: Option<String>,
        #[arg(long)]
        no_idor: bool,
        #[arg(long)]
        no_methods: bool,
        #[arg(long)]
        no_headers: bool,
        #[arg(long)]
        no_paths: bool,
    },

    /// Find hidden query parameters
    Paramfuzz {
        url: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
        #[arg(long, value_enum, value_delimiter = ',', default_value = "common")]
        lists: Vec<ParamList>,
        /// File with one extra parameter name per line
        #[arg(long)]
        wordlist: Option<String>,
    },

    /// Error, time, boolean and union based SQL injection checks
    Sqlidetect {
        url: String,
        #[arg(long)]
        no_error: bool,
        #[arg(long)]
        no_time: bool,
        #[arg(long)]
        no_boolean: bool,
        #[arg(long)]
        no_union: bool,
    },

    /// Enumerate subdomains from CT logs and a wordlist
    Subrecon {
        domain: String,
        #[arg(long)]
        no_crtsh: bool,
        #[arg(long)]
        no_wordlist: bool,
        #[arg(long)]
        no_alive_check: bool,
        #[arg(long)]
        no_takeover: bool,
    },

    /// HTTP-inferred port scan
    Portrush {
        host: String,
        #[arg(long, value_enum, default_value = "common")]
        preset: PortPreset,
        /// Custom list such as `80,443,8000-8100`; overrides the preset
        #[arg(short, long)]
        ports: Option<String>,
        #[arg(long)]
        batch: Option<usize>,
    },

    /// Identify protocols, admin panels, exposed services and WebSockets
    Protodetect {
        host: String,
        #[arg(short, long, value_delimiter = ',')]
        ports: Vec<u16>,
        #[arg(long)]
        no_detect: bool,
        #[arg(long)]
        no_admin: bool,
        #[arg(long)]
        no_services: bool,
        #[arg(long)]
        no_websocket: bool,
    },

    /// Audit security headers, cookies and CORS
    Headeraudit { url: String },

    /// Fingerprint the technologies behind a page
    Webtechfp {
        url: String,
        #[arg(long, value_enum, value_delimiter = ',')]
        categories: Vec<TechCategory>,
    },

    /// Web cache poisoning checks
    Cachepoison {
        url: String,
        #[arg(long)]
        no_detect: bool,
        #[arg(long)]
        no_unkeyed: bool,
        #[arg(long)]
        no_pollution: bool,
        #[arg(long)]
        no_fat_get: bool,
    },

    /// DNS records, mail security and subdomains over DNS-over-HTTPS
    Dnstracer {
        domain: String,
        /// Record types to query, e.g. `A,MX,TXT`
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        #[arg(long)]
        no_records: bool,
        #[arg(long)]
        no_zone_transfer: bool,
        #[arg(long)]
        no_security: bool,
        #[arg(long)]
        no_subdomains: bool,
    },

    /// Look for exposed VCS metadata, config, env and backup files
    Gitleaks {
        url: String,
        #[arg(long)]
        no_git: bool,
        #[arg(long)]
        no_config: bool,
        #[arg(long)]
        no_env: bool,
        #[arg(long)]
        no_backup: bool,
    },

    /// Certificate transparency and HTTPS header review
    Certwatch {
        domain: String,
        #[arg(long)]
        no_certificates: bool,
        #[arg(long)]
        no_ct_logs: bool,
        #[arg(long)]
        no_analyze: bool,
    },

    /// Mine archived URLs from the Wayback Machine
    Wayback {
        domain: String,
        #[arg(long)]
        no_urls: bool,
        #[arg(long)]
        no_params: bool,
        #[arg(long)]
        no_files: bool,
        #[arg(long)]
        no_endpoints: bool,
    },

    /// Extract endpoints and secrets from a page's JavaScript
    Jshunter {
        url: String,
        /// Also fetch and analyse external scripts
        #[arg(long)]
        deep: bool,
        #[arg(long)]
        no_endpoints: bool,
        #[arg(long)]
        no_secrets: bool,
        #[arg(long)]
        no_domains: bool,
        #[arg(long)]
        no_paths: bool,
    },

    /// Render a saved JSON run as HTML or JSON
    Report {
        #[arg(short, long)]
        input: String,
    },
}

impl Commands {
    /// The tool this command runs. `None` for `report`.
    pub fn into_tool(self, client: &EgressClient) -> anyhow::Result<Option<Box<dyn Tool>>> {
        let tool: Box<dyn Tool> = match self {
            Commands::Apirecon {
                url,
                no_swagger,
                no_graphql,
                no_common,
                no_versions,
            } => Box::new(ApiRecon {
                swagger: !no_swagger,
                graphql: !no_graphql,
                common: !no_common,
                versions: !no_versions,
                ..ApiRecon::new(url)
            }),
            Commands::Authbypass {
                url,
                high_token,
                low_token,
                ids,
                no_idor,
                no_methods,
                no_headers,
                no_paths,
            } => Box::new(AuthBypass {
                high_token,
                low_token,
                id_values: ids.map(|ids| split_list(&ids, &[','])).unwrap_or_default(),
                idor: !no_idor,
                methods: !no_methods,
                headers: !no_headers,
                paths: !no_paths,
                ..AuthBypass::new(url)
            }),
            Commands::Paramfuzz {
                url,
                method,
                lists,
                wordlist,
            } => {
                let method = HttpMethod::parse(&method)
                    .ok_or_else(|| anyhow::anyhow!("Unsupported method '{}'", method))?;
                let custom = wordlist.map(std::fs::read_to_string).transpose()?;
                Box::new(ParamFuzz {
                    method,
                    lists,
                    custom,
                    ..ParamFuzz::new(url)
                })
            }
            Commands::Sqlidetect {
                url,
                no_error,
                no_time,
                no_boolean,
                no_union,
            } => Box::new(SqliDetect {
                error_based: !no_error,
                time_based: !no_time,
                boolean_based: !no_boolean,
                union: !no_union,
                ..SqliDetect::new(url)
            }),
            Commands::Subrecon {
                domain,
                no_crtsh,
                no_wordlist,
                no_alive_check,
                no_takeover,
            } => Box::new(SubRecon {
                crtsh: !no_crtsh,
                wordlist: !no_wordlist,
                alive_check: !no_alive_check,
                takeover: !no_takeover,
                ..SubRecon::new(domain)
            }),
            Commands::Portrush {
                host,
                preset,
                ports,
                batch,
            } => Box::new(PortRush {
                ports: match ports {
                    Some(spec) => PortSelection::Custom(spec),
                    None => PortSelection::Preset(preset),
                },
                batch,
                ..PortRush::new(host)
            }),
            Commands::Protodetect {
                host,
                ports,
                no_detect,
                no_admin,
                no_services,
                no_websocket,
            } => Box::new(ProtoDetect {
                ports,
                detect: !no_detect,
                admin: !no_admin,
                services: !no_services,
                websocket: !no_websocket,
                ..ProtoDetect::new(host)
            }),
            Commands::Headeraudit { url } => Box::new(HeaderAudit::new(url)),
            Commands::Webtechfp { url, categories } => {
                let mut tool = WebTechFp::new(url);
                if !categories.is_empty() {
                    tool.categories = categories;
                }
                Box::new(tool)
            }
            Commands::Cachepoison {
                url,
                no_detect,
                no_unkeyed,
                no_pollution,
                no_fat_get,
            } => Box::new(CachePoison {
                detect_cache: !no_detect,
                unkeyed_headers: !no_unkeyed,
                param_pollution: !no_pollution,
                fat_get: !no_fat_get,
                ..CachePoison::new(url)
            }),
            Commands::Dnstracer {
                domain,
                types,
                no_records,
                no_zone_transfer,
                no_security,
                no_subdomains,
            } => {
                let mut tool = DnsTracer {
                    records: !no_records,
                    zone_transfer: !no_zone_transfer,
                    security: !no_security,
                    subdomains: !no_subdomains,
                    ..DnsTracer::new(domain)
                };
                if !types.is_empty() {
                    tool.record_types = types.iter().map(|t| t.trim().to_uppercase()).collect();
                }
                Box::new(tool)
            }
            Commands::Gitleaks {
                url,
                no_git,
                no_config,
                no_env,
                no_backup,
            } => Box::new(GitLeaks {
                git: !no_git,
                config: !no_config,
                env: !no_env,
                backup: !no_backup,
                ..GitLeaks::new(url)
            }),
            Commands::Certwatch {
                domain,
                no_certificates,
                no_ct_logs,
                no_analyze,
            } => Box::new(CertWatch {
                certificates: !no_certificates,
                ct_logs: !no_ct_logs,
                analyze: !no_analyze,
                ..CertWatch::new(domain)
            }),
            Commands::Wayback {
                domain,
                no_urls,
                no_params,
                no_files,
                no_endpoints,
            } => Box::new(Wayback {
                urls: !no_urls,
                params: !no_params,
                files: !no_files,
                endpoints: !no_endpoints,
                ..Wayback::new(domain)
            }),
            Commands::Jshunter {
                url,
                deep,
                no_endpoints,
                no_secrets,
                no_domains,
                no_paths,
            } => {
                let url = crate::tools::parse_url(&url)?.to_string();
                Box::new(JsHunter {
                    deep_scan: deep,
                    endpoints: !no_endpoints,
                    secrets: !no_secrets,
                    domains: !no_domains,
                    paths: !no_paths,
                    ..JsHunter::new(Arc::new(RemotePage::new(client.clone(), url)))
                })
            }
            Commands::Report { .. } => return Ok(None),
        };
        Ok(Some(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, ok};
    use crate::models::ToolId;

    fn client() -> EgressClient {
        EgressClient::new(MockTransport::new(|_| ok(200, "")), Arc::new(Settings::default()))
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from([
            "probekit",
            "headeraudit",
            "https://t.test",
            "--delay",
            "0",
            "--concurrent",
            "0",
            "--no-redirects",
            "-H",
            "X-Team: red",
        ])
        .unwrap();

        let settings = cli.global.settings().unwrap();
        assert_eq!(settings.delay, 0);
        assert_eq!(settings.concurrent, 1);
        assert!(!settings.follow_redirects);
        assert_eq!(settings.custom_headers["X-Team"], "red");
        assert_eq!(settings.timeout, 10_000);
        assert_eq!(cli.global.format, ReportFormat::Json);
    }

    #[test]
    fn test_tool_flags() {
        let cli = Cli::try_parse_from(["probekit", "portrush", "box", "-p", "22,8000-8002", "--batch", "3"]).unwrap();
        let tool = cli.command.into_tool(&client()).unwrap().unwrap();
        assert_eq!(tool.id(), ToolId::PortRush);
        assert_eq!(tool.config()["ports"]["custom"], "22,8000-8002");
        assert_eq!(tool.config()["batch"], 3);

        let cli = Cli::try_parse_from(["probekit", "paramfuzz", "t.test", "--lists", "admin,debug", "-m", "post"])
            .unwrap();
        let tool = cli.command.into_tool(&client()).unwrap().unwrap();
        assert_eq!(tool.config()["lists"], serde_json::json!(["admin", "debug"]));
        assert_eq!(tool.config()["method"], "POST");
    }

    #[test]
    fn test_report_has_no_tool() {
        let cli = Cli::try_parse_from(["probekit", "report", "-i", "run.json", "--format", "html"]).unwrap();
        assert_eq!(cli.global.format, ReportFormat::Html);
        assert!(cli.command.into_tool(&client()).unwrap().is_none());
    }

    #[test]
    fn test_bad_method_rejected() {
        let cli = Cli::try_parse_from(["probekit", "paramfuzz", "t.test", "-m", "BREW"]).unwrap();
        assert!(cli.command.into_tool(&client()).is_err());
    }
}
