use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::dedup_preserving;

pub const DEFAULT_TEST_IDS: &[&str] = &["1", "0", "-1", "999999", "admin", "null", "undefined"];

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d+)(?:/|$)").expect("static pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCandidate {
    pub test_id: String,
    pub url: String,
}

pub fn detect_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    NUMERIC_SEGMENT
        .captures(parsed.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn substitute_ids(url: &str, supplied: &[String]) -> Vec<IdCandidate> {
    let Ok(parsed) = Url::parse(url) else {
        return Vec::new();
    };
    let path = parsed.path().to_string();
    let segment = NUMERIC_SEGMENT.captures(&path).and_then(|caps| caps.get(1));
    let original = segment.map(|m| m.as_str().to_string());

    let supplied: Vec<String> = supplied.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    if segment.is_none() && supplied.is_empty() {
        return Vec::new();
    }

    let ids = dedup_preserving(supplied.into_iter().chain(DEFAULT_TEST_IDS.iter().map(|s| s.to_string())));

    ids.into_iter()
        .filter(|id| Some(id) != original.as_ref())
        .map(|test_id| {
            let new_path = match segment {
                Some(m) => format!("{}{}{}", &path[..m.start()], test_id, &path[m.end()..]),
                None => format!("{}/{}", path.trim_end_matches('/'), test_id),
            };
            let mut target = parsed.clone();
            target.set_path(&new_path);
            IdCandidate {
                test_id,
                url: target.to_string(),
            }
        })
        .collect()
}
