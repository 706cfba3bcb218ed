//! Name-to-workload lookup

use super::{EchoFileWorkload, Workload};
use crate::error::WorkloadError;
use std::collections::BTreeMap;

/// Constructor for a registered workload.
pub type WorkloadFactory = fn() -> Box<dyn Workload>;

fn echo_file() -> Box<dyn Workload> {
    Box::new(EchoFileWorkload::new())
}

/// Workloads selectable by name.
#[derive(Clone)]
pub struct WorkloadRegistry {
    factories: BTreeMap<String, WorkloadFactory>,
}

impl WorkloadRegistry {
    /// Registry with no workloads.
    pub fn empty() -> Self {
        WorkloadRegistry {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in workloads.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(EchoFileWorkload::NAME, echo_file);
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, factory: WorkloadFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Construct the workload registered as `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Workload>, WorkloadError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| WorkloadError::Unknown {
                name: name.to_string(),
            })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for WorkloadRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_echo_is_registered() {
        let registry = WorkloadRegistry::default();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["echo-file"]);
        let workload = registry.create("echo-file").unwrap();
        assert_eq!(workload.name(), "echo-file");
    }

    #[test]
    fn test_unknown_name() {
        let registry = WorkloadRegistry::empty();
        assert!(matches!(
            registry.create("echo-file"),
            Err(WorkloadError::Unknown { .. })
        ));
    }

    #[test]
    fn test_register_custom_name() {
        let mut registry = WorkloadRegistry::empty();
        registry.register("custom", echo_file);
        assert!(registry.create("custom").is_ok());
        assert_eq!(registry.names().count(), 1);
    }
}
