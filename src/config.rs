use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::analyzer::DiffThresholds;
use crate::error::EngineResult;

/// Process-wide defaults every run starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Pause between sequential dispatches, in milliseconds.
    pub delay: u64,
    /// Batch width for tools that dispatch in parallel.
    pub concurrent: usize,
    /// Per-request timeout, in milliseconds.
    pub timeout: u64,
    pub follow_redirects: bool,
    pub custom_headers: BTreeMap<String, String>,
    pub thresholds: DiffThresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delay: 100,
            concurrent: 5,
            timeout: 10_000,
            follow_redirects: true,
            custom_headers: BTreeMap::new(),
            thresholds: DiffThresholds::default(),
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn delay_duration(&self) -> Duration {
        Duration::from_millis(self.delay)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Parses `Name: value` pairs into the custom header map.
    pub fn add_header_lines<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() {
                    self.custom_headers.insert(name.to_string(), value.trim().to_string());
                }
            }
        }
    }
}

/// Shared settings value. Runs take a snapshot at start and keep it.
#[derive(Debug, Default)]
pub struct SettingsStore {
    current: RwLock<Arc<Settings>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, settings: Settings) {
        let next = Arc::new(settings);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
