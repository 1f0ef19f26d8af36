use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::error::{EngineError, EngineResult};
use crate::models::{ToolId, ToolRun};

#[derive(Debug, Default)]
pub struct RunRegistry {
    active: Mutex<HashSet<ToolId>>,
    results: Mutex<HashMap<ToolId, ToolRun>>,
}

#[must_use]
pub struct ActiveRun<'a> {
    registry: &'a RunRegistry,
    tool: ToolId,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        lock(&self.registry.active).remove(&self.tool);
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, tool: ToolId) -> EngineResult<ActiveRun<'_>> {
        if !lock(&self.active).insert(tool) {
            return Err(EngineError::AlreadyRunning(tool));
        }
        Ok(ActiveRun { registry: self, tool })
    }

    pub fn is_running(&self, tool: ToolId) -> bool {
        lock(&self.active).contains(&tool)
    }

    pub fn store(&self, run: ToolRun) {
        lock(&self.results).insert(run.tool, run);
    }

    pub fn latest(&self, tool: ToolId) -> Option<ToolRun> {
        lock(&self.results).get(&tool).cloned()
    }

    pub fn clear(&self, tool: ToolId) -> Option<ToolRun> {
        lock(&self.results).remove(&tool)
    }

    pub fn reset(&self) {
        lock(&self.results).clear();
    }

    pub fn all(&self) -> Vec<ToolRun> {
        let results = lock(&self.results);
        ToolId::ALL
            .iter()
            .filter_map(|tool| results.get(tool).cloned())
            .collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_flight() {
        let registry = RunRegistry::new();
        let guard = registry.begin(ToolId::PortRush).unwrap();
        assert!(registry.is_running(ToolId::PortRush));
        assert!(matches!(
            registry.begin(ToolId::PortRush),
            Err(EngineError::AlreadyRunning(ToolId::PortRush))
        ));
        assert!(registry.begin(ToolId::SubRecon).is_ok());

        drop(guard);
        assert!(!registry.is_running(ToolId::PortRush));
        assert!(registry.begin(ToolId::PortRush).is_ok());
    }

    #[test]
    fn test_store_clear_reset() {
        let registry = RunRegistry::new();
        registry.store(ToolRun::start(ToolId::Wayback, "t", json!({})));
        registry.store(ToolRun::start(ToolId::ApiRecon, "t", json!({})));

        assert_eq!(registry.all().iter().map(|r| r.tool).collect::<Vec<_>>(), vec![ToolId::Wayback, ToolId::ApiRecon]);
        assert!(registry.clear(ToolId::Wayback).is_some());
        assert!(registry.latest(ToolId::Wayback).is_none());

        registry.reset();
        assert!(registry.all().is_empty());
    }
}
