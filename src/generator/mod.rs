pub mod headers;
pub mod ids;
pub mod params;
pub mod paths;
pub mod ports;
pub mod subdomains;

pub use headers::HeaderFanout;
pub use ids::{DEFAULT_TEST_IDS, IdCandidate, detect_id, substitute_ids};
pub use params::{ParamList, ParamWordlists};
pub use paths::{expand_versions, union_paths, with_versions};
pub use ports::{PortPreset, parse_port_spec, port_severity, service_name};
pub use subdomains::{DNS_PREFIXES, SUBDOMAIN_PREFIXES};

use std::collections::HashSet;

use crate::models::{HttpMethod, ProbeDescriptor};

#[derive(Debug, Default)]
pub struct CandidateSet {
    seen: HashSet<(HttpMethod, String, Vec<(String, String)>)>,
    items: Vec<ProbeDescriptor>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, probe: ProbeDescriptor) -> bool {
        if self.seen.insert(probe.dedup_key()) {
            self.items.push(probe);
            true
        } else {
            false
        }
    }

    pub fn extend(&mut self, probes: impl IntoIterator<Item = ProbeDescriptor>) {
        for probe in probes {
            self.push(probe);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<ProbeDescriptor> {
        self.items
            .into_iter()
            .enumerate()
            .map(|(i, mut probe)| {
                probe.id = i + 1;
                probe
            })
            .collect()
    }
}

pub fn dedup_preserving<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

pub fn split_list(input: &str, separators: &[char]) -> Vec<String> {
    input
        .split(|c| separators.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Purpose;

    #[test]
    fn test_candidate_set_drops_duplicates() {
        let mut set = CandidateSet::new();
        assert!(set.push(ProbeDescriptor::get("http://t/a", Purpose::PathDiscovery)));
        assert!(!set.push(ProbeDescriptor::get("http://t/a", Purpose::Lookup)));
        assert!(set.push(ProbeDescriptor::get("http://t/a", Purpose::HeaderBypass).with_header("X-A", "1")));
        assert!(!set.push(ProbeDescriptor::get("http://t/a", Purpose::HeaderBypass).with_header("x-a", "1")));
        assert!(set.push(ProbeDescriptor::new(HttpMethod::Post, "http://t/a", Purpose::MethodProbe)));

        let probes = set.into_vec();
        assert_eq!(probes.len(), 3);
        assert_eq!(probes.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_generated_tables_have_no_duplicates() {
        let mut set = CandidateSet::new();
        for path in with_versions(union_paths(&[paths::SWAGGER_PATHS, paths::GRAPHQL_PATHS, paths::API_PATHS])) {
            set.push(ProbeDescriptor::get(format!("https://t{}", path), Purpose::PathDiscovery));
        }
        let before = set.len();
        let probes = set.into_vec();
        let keys: HashSet<_> = probes.iter().map(|p| p.dedup_key()).collect();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b,,c\n d ", &[',', '\n']), vec!["a", "b", "c", "d"]);
        assert!(split_list("  \n ", &['\n']).is_empty());
    }

    #[test]
    fn test_dedup_preserving() {
        let items = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_preserving(items), vec!["b", "a"]);
    }
}
