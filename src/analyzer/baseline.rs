use std::collections::BTreeMap;

use crate::models::ResponseRecord;

pub const PLAIN: &str = "plain";
pub const NO_AUTH: &str = "no-auth";
pub const HIGH_PRIV: &str = "high-priv";
pub const LOW_PRIV: &str = "low-priv";

#[derive(Debug, Clone, Default)]
pub struct Baseline {
    records: BTreeMap<String, ResponseRecord>,
}

impl Baseline {
    pub fn single(name: &str, record: ResponseRecord) -> Self {
        Self::from_records([(name.to_string(), record)])
    }

    pub fn from_records(records: impl IntoIterator<Item = (String, ResponseRecord)>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResponseRecord> {
        self.records.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
