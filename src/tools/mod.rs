//! The fifteen tool strategies plugged into the engine.

pub mod apirecon;
pub mod authbypass;
pub mod cachepoison;
pub mod certwatch;
pub mod dnstracer;
pub mod gitleaks;
pub mod headeraudit;
pub mod jshunter;
pub mod paramfuzz;
pub mod portrush;
pub mod protodetect;
pub mod sqlidetect;
pub mod subrecon;
pub mod upstream;
pub mod wayback;
pub mod webtechfp;

pub use apirecon::ApiRecon;
pub use authbypass::AuthBypass;
pub use cachepoison::CachePoison;
pub use certwatch::CertWatch;
pub use dnstracer::DnsTracer;
pub use gitleaks::GitLeaks;
pub use headeraudit::HeaderAudit;
pub use jshunter::{JsHunter, PageContent, PageInfo, RemotePage, ScriptSource};
pub use paramfuzz::ParamFuzz;
pub use portrush::PortRush;
pub use protodetect::ProtoDetect;
pub use sqlidetect::SqliDetect;
pub use subrecon::SubRecon;
pub use wayback::Wayback;
pub use webtechfp::WebTechFp;

use url::Url;

use crate::error::{EngineError, EngineResult};

pub fn require(value: &str, name: &'static str) -> EngineResult<()> {
    if value.trim().is_empty() {
        return Err(EngineError::MissingInput(name));
    }
    Ok(())
}

pub fn parse_url(input: &str) -> EngineResult<Url> {
    let input = input.trim();
    let candidate = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    let url = Url::parse(&candidate).map_err(|e| EngineError::invalid_target(input, e.to_string()))?;
    if url.host_str().is_none() {
        return Err(EngineError::invalid_target(input, "no host"));
    }
    Ok(url)
}

pub fn normalize_origin(input: &str) -> EngineResult<String> {
    Ok(parse_url(input)?.origin().ascii_serialization())
}

pub fn normalize_host(input: &str) -> String {
    let host = strip_scheme(input.trim());
    let host = host.split('/').next().unwrap_or_default();
    host.split(':').next().unwrap_or_default().to_string()
}

pub fn normalize_domain(input: &str) -> String {
    let host = normalize_host(input).to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

fn strip_scheme(input: &str) -> &str {
    input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
        .unwrap_or(input)
}

pub fn add_query_param(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}={}",
        url,
        separator,
        urlencoding::encode(name),
        urlencoding::encode(value)
    )
}

pub fn set_query_param(url: &Url, name: &str, value: &str) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == name { value.to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();

    let mut target = url.clone();
    target.query_pairs_mut().clear().extend_pairs(pairs);
    target.to_string()
}

pub fn query_names(url: &Url) -> Vec<String> {
    crate::generator::dedup_preserving(url.query_pairs().map(|(k, _)| k.into_owned()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_origin() {
        assert_eq!(normalize_origin("example.com/a/b?c=1").unwrap(), "https://example.com");
        assert_eq!(normalize_origin("http://h:8080/x").unwrap(), "http://h:8080");
        assert!(normalize_origin("https://").is_err());
    }

    #[test]
    fn test_normalize_host_and_domain() {
        assert_eq!(normalize_host("https://api.test:8443/x"), "api.test");
        assert_eq!(normalize_host("10.0.0.1"), "10.0.0.1");
        assert_eq!(normalize_domain("http://WWW.Example.com/path"), "example.com");
    }

    #[test]
    fn test_query_helpers() {
        assert_eq!(add_query_param("https://t/a", "q", "a b"), "https://t/a?q=a%20b");
        assert_eq!(add_query_param("https://t/a?x=1", "q", "1"), "https://t/a?x=1&q=1");

        let url = Url::parse("https://t/s?id=1&name=x&id=2").unwrap();
        assert_eq!(query_names(&url), vec!["id", "name"]);
        assert_eq!(set_query_param(&url, "name", "' OR 1=1"), "https://t/s?id=1&name=%27+OR+1%3D1&id=2");
    }

    #[test]
    fn test_require() {
        assert!(require("  ", "url").is_err());
        assert!(require("x", "url").is_ok());
    }
}
