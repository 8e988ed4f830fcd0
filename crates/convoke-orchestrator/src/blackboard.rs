//! Shared key/value scratch space
//!
//! Missions publish each delegated result under `<trace_id>/<role>` so that
//! observers can inspect partial results while a mission is still running.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A value and the time it was written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlackboardEntry {
    pub value: Value,
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Blackboard {
    entries: Mutex<HashMap<String, BlackboardEntry>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, BlackboardEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self, key: impl Into<String>, value: Value) {
        self.entries().insert(
            key.into(),
            BlackboardEntry {
                value,
                written_at: Utc::now(),
            },
        );
    }

    pub fn read(&self, key: &str) -> Option<Value> {
        self.entries().get(key).map(|e| e.value.clone())
    }

    /// All keys, sorted
    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Entries whose key starts with `prefix`, oldest write first
    pub fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, BlackboardEntry)> {
        let mut found: Vec<_> = self
            .entries()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        found.sort_by(|a, b| a.1.written_at.cmp(&b.1.written_at).then_with(|| a.0.cmp(&b.0)));
        found
    }

    /// Remove entries whose key starts with `prefix`; returns how many
    pub fn clear_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_read_overwrite() {
        let board = Blackboard::new();
        board.write("m1/coder", json!("draft"));
        board.write("m1/coder", json!("final"));
        assert_eq!(board.read("m1/coder"), Some(json!("final")));
        assert_eq!(board.read("m1/tester"), None);
    }

    #[test]
    fn test_prefix_operations() {
        let board = Blackboard::new();
        board.write("m1/coder", json!(1));
        board.write("m1/tester", json!(2));
        board.write("m2/coder", json!(3));

        assert_eq!(board.entries_with_prefix("m1/").len(), 2);
        assert_eq!(board.clear_prefix("m1/"), 2);
        assert_eq!(board.list_keys(), vec!["m2/coder"]);

        board.clear();
        assert!(board.list_keys().is_empty());
    }
}
