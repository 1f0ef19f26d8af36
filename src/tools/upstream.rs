use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

pub const CRTSH_TIMEOUT_MS: u64 = 15_000;
pub const DOH_TIMEOUT_MS: u64 = 10_000;
pub const WAYBACK_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrtEntry {
    #[serde(default)]
    pub name_value: Option<String>,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub issuer_name: Option<String>,
}

impl CrtEntry {
    pub fn names(&self) -> impl Iterator<Item = String> + '_ {
        self.name_value
            .as_deref()
            .unwrap_or_default()
            .lines()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DohResponse {
    #[serde(rename = "Answer", default)]
    pub answer: Vec<DohRecord>,
    #[serde(rename = "AD", default)]
    pub authenticated: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DohRecord {
    #[serde(default)]
    pub data: String,
    #[serde(rename = "TTL", default)]
    pub ttl: Option<u64>,
}

pub fn crtsh_wildcard_url(domain: &str) -> String {
    format!("https://crt.sh/?q=%25.{}&output=json", domain)
}

pub fn crtsh_url(domain: &str) -> String {
    format!("https://crt.sh/?q={}&output=json", urlencoding::encode(domain))
}

pub fn doh_url(name: &str, record_type: &str) -> String {
    format!(
        "https://dns.google/resolve?name={}&type={}",
        urlencoding::encode(name),
        record_type
    )
}

pub fn wayback_cdx_url(domain: &str) -> String {
    format!(
        "https://web.archive.org/cdx/search/cdx?url=*.{}/*&output=json&fl=original,timestamp,statuscode,mimetype&collapse=urlkey&limit=5000",
        domain
    )
}

pub fn archived_url(timestamp: &str, original: &str) -> String {
    format!("https://web.archive.org/web/{}/{}", timestamp, original)
}

pub fn parse_json<T: DeserializeOwned>(source: &str, body: &str) -> Option<T> {
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(source, error = %e, "upstream response not parseable");
            None
        }
    }
}
