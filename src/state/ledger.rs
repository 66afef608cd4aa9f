use crate::storage::KeyValueStore;
use crate::types::{CandidateId, HistoryEntry};
use std::collections::HashSet;
use std::sync::Arc;

pub const STREAK_KEY: &str = "framequiz.streak";
pub const HISTORY_KEY: &str = "framequiz.history";

/// Persisted streak counter and round history (newest first)
pub struct Ledger {
    store: Arc<dyn KeyValueStore>,
    streak: u32,
    history: Vec<HistoryEntry>,
    history_limit: usize,
}

impl Ledger {
    /// Load the ledger, falling back to zero/empty on absent or corrupt data
    pub fn load(store: Arc<dyn KeyValueStore>, history_limit: usize) -> Self {
        let streak = match store.read_int(STREAK_KEY) {
            Some(value) => u32::try_from(value).unwrap_or_else(|_| {
                tracing::warn!(value, "Stored streak out of range, resetting");
                0
            }),
            None => 0,
        };

        let mut history: Vec<HistoryEntry> = match store.read_json(HISTORY_KEY) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Stored history is malformed, starting empty");
                Vec::new()
            }),
            None => Vec::new(),
        };
        history.truncate(history_limit);

        tracing::info!(streak, history = history.len(), "Ledger loaded");

        Self {
            store,
            streak,
            history,
            history_limit,
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Ids of the `count` most recent rounds
    pub fn recent_ids(&self, count: usize) -> HashSet<CandidateId> {
        self.history
            .iter()
            .take(count)
            .map(|entry| entry.candidate_id)
            .collect()
    }

    /// Apply a finished round: update the streak, prepend the entry, persist both.
    /// Returns the new streak.
    pub fn record(&mut self, entry: HistoryEntry) -> u32 {
        self.streak = if entry.correct { self.streak + 1 } else { 0 };

        self.history.insert(0, entry);
        self.history.truncate(self.history_limit);

        self.persist();
        self.streak
    }

    fn persist(&self) {
        if let Err(e) = self.store.write_int(STREAK_KEY, i64::from(self.streak)) {
            tracing::error!(error = %e, "Failed to persist streak");
        }

        match serde_json::to_value(&self.history) {
            Ok(value) => {
                if let Err(e) = self.store.write_json(HISTORY_KEY, &value) {
                    tracing::error!(error = %e, "Failed to persist history");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize history"),
        }
    }
}
