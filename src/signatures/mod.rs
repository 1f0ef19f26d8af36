mod tables;
mod tech;

pub use tech::{TECH_SIGNATURES, TechCategory, TechHit, TechSignature, fingerprint};

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::warn;

pub const CODE_SCAN_LIMIT: usize = 100_000;
pub const MARKUP_SCAN_LIMIT: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Secrets,
    Endpoints,
    Domains,
    Paths,
    Emails,
    Ips,
    SqlErrors,
    Takeover,
    TakeoverCname,
    CacheHeaders,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureMatch {
    pub id: &'static str,
    pub label: &'static str,
    pub matched: String,
}

struct Signature {
    id: &'static str,
    label: &'static str,
    regex: Regex,
}

pub struct SignatureRegistry {
    banks: HashMap<Category, Vec<Signature>>,
}

static GLOBAL: Lazy<SignatureRegistry> = Lazy::new(SignatureRegistry::new);

impl SignatureRegistry {
    pub fn global() -> &'static SignatureRegistry {
        &GLOBAL
    }

    pub fn new() -> Self {
        let mut banks = HashMap::new();
        banks.insert(Category::Secrets, compile(tables::SECRET_PATTERNS));
        banks.insert(Category::Endpoints, compile(tables::ENDPOINT_PATTERNS));
        banks.insert(Category::Domains, compile(tables::DOMAIN_PATTERNS));
        banks.insert(Category::Paths, compile(tables::PATH_PATTERNS));
        banks.insert(Category::Emails, compile(tables::EMAIL_PATTERNS));
        banks.insert(Category::Ips, compile(tables::IP_PATTERNS));
        banks.insert(Category::SqlErrors, compile(tables::SQL_ERROR_PATTERNS));
        banks.insert(Category::Takeover, compile(tables::TAKEOVER_PATTERNS));
        banks.insert(Category::TakeoverCname, literal_bank(tables::TAKEOVER_CNAME_SUFFIXES));
        banks.insert(Category::CacheHeaders, header_bank(tables::CACHE_HEADER_NAMES));
        Self { banks }
    }

    pub fn matches(&self, category: Category, text: &str) -> Vec<SignatureMatch> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for signature in self.bank(category) {
            for caps in signature.regex.captures_iter(text) {
                let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                let hit = SignatureMatch {
                    id: signature.id,
                    label: signature.label,
                    matched: m.as_str().to_string(),
                };
                if seen.insert((hit.id, hit.matched.clone())) {
                    found.push(hit);
                }
            }
        }

        found
    }

    pub fn first_match(&self, category: Category, text: &str) -> Option<SignatureMatch> {
        self.bank(category).iter().find_map(|signature| {
            signature.regex.captures(text).and_then(|caps| {
                caps.get(1).or_else(|| caps.get(0)).map(|m| SignatureMatch {
                    id: signature.id,
                    label: signature.label,
                    matched: m.as_str().to_string(),
                })
            })
        })
    }

    pub fn is_match(&self, category: Category, text: &str) -> bool {
        self.bank(category).iter().any(|s| s.regex.is_match(text))
    }

    pub fn len(&self, category: Category) -> usize {
        self.bank(category).len()
    }

    fn bank(&self, category: Category) -> &[Signature] {
        self.banks.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn bounded(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn compile(defs: &[tables::Def]) -> Vec<Signature> {
    defs.iter()
        .filter_map(|&(id, label, pattern)| match Regex::new(pattern) {
            Ok(regex) => Some(Signature { id, label, regex }),
            Err(e) => {
                warn!(id, error = %e, "skipping signature that failed to compile");
                None
            }
        })
        .collect()
}

fn literal_bank(literals: &[&'static str]) -> Vec<Signature> {
    literals
        .iter()
        .copied()
        .filter_map(|literal| {
            Regex::new(&format!("(?i){}", regex::escape(literal)))
                .ok()
                .map(|regex| Signature {
                    id: literal,
                    label: literal,
                    regex,
                })
        })
        .collect()
}

fn header_bank(names: &[&'static str]) -> Vec<Signature> {
    names
        .iter()
        .copied()
        .filter_map(|name| {
            Regex::new(&format!(r"(?im)^{}: *(.*?)\s*$", regex::escape(name)))
                .ok()
                .map(|regex| Signature {
                    id: name,
                    label: name,
                    regex,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_compiles() {
        let registry = SignatureRegistry::new();
        assert_eq!(registry.len(Category::Secrets), tables::SECRET_PATTERNS.len());
        assert_eq!(registry.len(Category::Endpoints), tables::ENDPOINT_PATTERNS.len());
        assert_eq!(registry.len(Category::Domains), tables::DOMAIN_PATTERNS.len());
        assert_eq!(registry.len(Category::Ips), tables::IP_PATTERNS.len());
        assert_eq!(registry.len(Category::SqlErrors), tables::SQL_ERROR_PATTERNS.len());
        assert_eq!(registry.len(Category::Takeover), tables::TAKEOVER_PATTERNS.len());
        assert_eq!(registry.len(Category::TakeoverCname), tables::TAKEOVER_CNAME_SUFFIXES.len());
        assert_eq!(registry.len(Category::CacheHeaders), tables::CACHE_HEADER_NAMES.len());
    }

    #[test]
    fn test_sql_error_first_family_wins() {
        let registry = SignatureRegistry::global();
        let body = "You have an error in your SQL syntax; check the manual that corresponds to your MySQL server";
        let hit = registry.first_match(Category::SqlErrors, body).unwrap();
        assert_eq!(hit.id, "mysql");
        assert_eq!(hit.label, "MySQL");

        let hit = registry.first_match(Category::SqlErrors, "ORA-00933: SQL command not properly ended").unwrap();
        assert_eq!(hit.label, "Oracle");

        assert!(registry.first_match(Category::SqlErrors, "<html>Welcome</html>").is_none());
    }

    #[test]
    fn test_prefix_secrets_are_case_sensitive() {
        let registry = SignatureRegistry::global();
        let token = format!("ghp_{}", "a1B2c3D4e5".repeat(4).chars().take(36).collect::<String>());

        let hits = registry.matches(Category::Secrets, &format!("const t = '{}';", token));
        assert!(hits.iter().any(|h| h.id == "github-pat" && h.matched == token));

        let shouted = token.replacen("ghp_", "GHP_", 1);
        let hits = registry.matches(Category::Secrets, &format!("const t = '{}';", shouted));
        assert!(hits.iter().all(|h| h.id != "github-pat"));
    }

    #[test]
    fn test_generic_secret_reports_capture() {
        let registry = SignatureRegistry::global();
        let hits = registry.matches(Category::Secrets, r#"{"API_KEY": "abcdefghijklmnopqrstuvwx"}"#);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "api-key");
        assert_eq!(hits[0].matched, "abcdefghijklmnopqrstuvwx");
    }

    #[test]
    fn test_matches_are_distinct() {
        let registry = SignatureRegistry::global();
        let text = r#"fetch("/api/users"); fetch("/api/users"); x = "/api/users";"#;
        let hits = registry.matches(Category::Endpoints, text);
        let api: Vec<_> = hits.iter().filter(|h| h.id == "api-path").collect();
        assert_eq!(api.len(), 1);
        assert_eq!(api[0].matched, "/api/users");
    }

    #[test]
    fn test_takeover_is_case_insensitive() {
        let registry = SignatureRegistry::global();
        let hit = registry.first_match(Category::Takeover, "<h1>NoSuchBucket</h1>").unwrap();
        assert_eq!(hit.label, "AWS S3");
        assert!(registry.is_match(Category::Takeover, "there isn't a github pages site here."));
        assert!(registry.is_match(Category::TakeoverCname, "foo.HEROKUAPP.com."));
        assert!(!registry.is_match(Category::TakeoverCname, "example.org."));
    }

    #[test]
    fn test_cache_headers_capture_values() {
        let registry = SignatureRegistry::global();
        let headers = "age: 12\ncontent-type: text/html\nx-cache: HIT from edge";
        let hits = registry.matches(Category::CacheHeaders, headers);
        let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["x-cache", "age"]);
        assert_eq!(hits[0].matched, "HIT from edge");
        assert_eq!(hits[1].matched, "12");
    }

    #[test]
    fn test_bounded() {
        assert_eq!(bounded("abcdef", 3), "abc");
        assert_eq!(bounded("ab", 3), "ab");
        assert_eq!(bounded("aé", 2), "a");
    }
}
