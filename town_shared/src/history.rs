//! Bounded chat and interaction histories.
//!
//! Both logs keep the newest entries only: appending past the cap evicts the
//! oldest entry first.

use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::net::{InteractionData, InteractionKind, InteractionResult};

/// Chat entries kept locally.
pub const CHAT_HISTORY_CAP: usize = 100;
/// Interaction results kept locally.
pub const INTERACTION_HISTORY_CAP: usize = 50;

/// FIFO log with a fixed capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    cap: usize,
}

impl<T> BoundedHistory<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Rebuilds a log from persisted entries, keeping the newest `cap`.
    pub fn from_entries(entries: Vec<T>, cap: usize) -> Self {
        let mut history = Self::new(cap);
        for entry in entries {
            history.push(entry);
        }
        history
    }

    /// Appends an entry, returning the evicted one if the log was full.
    pub fn push(&mut self, entry: T) -> Option<T> {
        if self.cap == 0 {
            return Some(entry);
        }
        self.entries.push_back(entry);
        if self.entries.len() > self.cap {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Entries oldest first, in a form suitable for persisting.
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

/// A received chat line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub from: String,
    #[serde(default)]
    pub from_nickname: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
}

/// An interaction result with the local time it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEntry {
    #[serde(rename = "type", default)]
    pub kind: Option<InteractionKind>,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub data: InteractionData,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl InteractionEntry {
    /// Records `result` as received at `at`.
    pub fn stamped(result: InteractionResult, at: DateTime<Utc>) -> Self {
        Self {
            kind: result.kind,
            item_name: result.item_name,
            data: result.data,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_evicts_oldest_first() {
        let mut h = BoundedHistory::new(3);
        for i in 0..5 {
            h.push(i);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.to_vec(), vec![2, 3, 4]);
    }

    #[test]
    fn push_reports_evicted_entry() {
        let mut h = BoundedHistory::new(2);
        assert_eq!(h.push("a"), None);
        assert_eq!(h.push("b"), None);
        assert_eq!(h.push("c"), Some("a"));
    }

    #[test]
    fn chat_cap_is_never_exceeded() {
        let mut h = BoundedHistory::new(CHAT_HISTORY_CAP);
        for i in 0..(CHAT_HISTORY_CAP * 2 + 7) {
            h.push(i);
            assert!(h.len() <= CHAT_HISTORY_CAP);
        }
        assert_eq!(h.iter().next(), Some(&(CHAT_HISTORY_CAP + 7)));
        assert_eq!(h.last(), Some(&(CHAT_HISTORY_CAP * 2 + 6)));
    }

    #[test]
    fn stamped_entry_keeps_result_fields() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let entry = InteractionEntry::stamped(
            InteractionResult {
                kind: Some(InteractionKind::Chat),
                item_name: Some("chef".into()),
                data: InteractionData::default(),
            },
            at,
        );
        assert_eq!(entry.item_name.as_deref(), Some("chef"));
        assert_eq!(entry.timestamp, "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn restoring_oversized_log_keeps_newest() {
        let entries: Vec<u32> = (0..60).collect();
        let h = BoundedHistory::from_entries(entries, INTERACTION_HISTORY_CAP);
        assert_eq!(h.len(), INTERACTION_HISTORY_CAP);
        assert_eq!(h.iter().next(), Some(&10));
    }
}
