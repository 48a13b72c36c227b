use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::Recipe;

/// Frozen record of one successful generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub ingredients: Vec<String>,
    pub recipes: Vec<Recipe>,
}

impl HistoryEntry {
    /// Ids are UUIDv7, so they sort by creation time within a session.
    pub fn new(ingredients: Vec<String>, recipes: Vec<Recipe>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            ingredients,
            recipes,
        }
    }
}

/// Session-scoped, newest-first list of history entries. Entries are never
/// mutated or removed once appended.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct HistoryLedger {
    entries: Vec<Arc<HistoryEntry>>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: HistoryEntry) -> Arc<HistoryEntry> {
        let entry = Arc::new(entry);
        self.entries.insert(0, Arc::clone(&entry));
        entry
    }

    pub fn list(&self) -> &[Arc<HistoryEntry>] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<Arc<HistoryEntry>> {
        self.entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn latest(&self) -> Option<Arc<HistoryEntry>> {
        self.entries.first().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
