//! Recently active identities.
//!
//! Purely advisory. Every observed `pixel`, `image` or `active` event
//! refreshes its identity; anything unseen for longer than the activity
//! window drops out, whether or not new events arrive.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::consts::ACTIVITY_WINDOW;

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub key: String,
    pub meta: Value,
    pub last_seen: Instant,
}

#[derive(Debug, Clone)]
pub struct Presence {
    window: Duration,
    records: BTreeMap<String, ActivityRecord>,
}

impl Default for Presence {
    fn default() -> Self {
        Self::new(ACTIVITY_WINDOW)
    }
}

impl Presence {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, records: BTreeMap::new() }
    }

    /// Upsert `key` as seen at `now`, then prune.
    pub fn observe_at(&mut self, key: &str, meta: Value, now: Instant) {
        self.records.insert(
            key.to_owned(),
            ActivityRecord { key: key.to_owned(), meta, last_seen: now },
        );
        self.prune_at(now);
    }

    /// Drop records older than the window. Returns how many were dropped.
    pub fn prune_at(&mut self, now: Instant) -> usize {
        let before = self.records.len();
        let window = self.window;
        self.records
            .retain(|_, record| now.saturating_duration_since(record.last_seen) <= window);
        before - self.records.len()
    }

    /// Active identities, sorted by key.
    #[must_use]
    pub fn players(&self) -> Vec<&ActivityRecord> {
        self.records.values().collect()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ActivityRecord> {
        self.records.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
