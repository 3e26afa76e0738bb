//! Program registry: route path → submitted source text.
//!
//! Read by the listing view and the admin API, written only by the
//! registration step. Readers take a snapshot and release the lock before
//! doing any further work.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::pipeline::error::RegisterError;

/// One registered program as shown to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub path: String,
    pub source: String,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<HashMap<String, String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, source: String) -> Result<(), RegisterError> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if entries.contains_key(path) {
            return Err(RegisterError::Duplicate(path.to_string()));
        }
        entries.insert(path.to_string(), source);
        Ok(())
    }

    /// Copy of all entries, sorted by path.
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        let copied: HashMap<String, String> = {
            let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            entries.clone()
        };

        let mut snapshot: Vec<RegistryEntry> = copied
            .into_iter()
            .map(|(path, source)| RegistryEntry { path, source })
            .collect();
        snapshot.sort_by(|a, b| a.path.cmp(&b.path));
        snapshot
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_sorted_copy() {
        let registry = Registry::new();
        registry.insert("/b", "source b".into()).unwrap();
        registry.insert("/a", "source a".into()).unwrap();

        let snapshot = registry.snapshot();
        registry.insert("/c", "source c".into()).unwrap();

        assert_eq!(
            snapshot,
            vec![
                RegistryEntry { path: "/a".into(), source: "source a".into() },
                RegistryEntry { path: "/b".into(), source: "source b".into() },
            ]
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_entries_are_never_overwritten() {
        let registry = Registry::new();
        registry.insert("/a", "original".into()).unwrap();
        assert!(registry.insert("/a", "other".into()).is_err());
        assert_eq!(registry.snapshot()[0].source, "original");
    }
}
