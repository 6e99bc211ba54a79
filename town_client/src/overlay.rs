//! Transient speech-bubble messages keyed by display name.
//!
//! Every `show` arms an expiry timer for its own timestamp. When a timer
//! fires it only clears the entry if that entry is still the one it was armed
//! for, so a newer message for the same name outlives older timers.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// How long a bubble stays up.
pub const MESSAGE_TTL: Duration = Duration::from_millis(5000);

/// A bubble currently shown above a character or item.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterMessage {
    pub text: String,
    pub created_at: Instant,
}

#[derive(Debug, Clone)]
struct ExpiryTimer {
    fires_at: Instant,
    name: String,
    created_at: Instant,
}

/// Per-name bubble state plus pending expiry timers.
#[derive(Debug, Default)]
pub struct MessageOverlay {
    messages: HashMap<String, CharacterMessage>,
    /// Ordered by `fires_at`, since `show` is called with non-decreasing times.
    timers: VecDeque<ExpiryTimer>,
}

impl MessageOverlay {
    /// Shows `text` above `name`, replacing any current bubble for it.
    pub fn show(&mut self, name: &str, text: &str, now: Instant) {
        self.messages.insert(
            name.to_string(),
            CharacterMessage {
                text: text.to_string(),
                created_at: now,
            },
        );
        let timer = ExpiryTimer {
            fires_at: now + MESSAGE_TTL,
            name: name.to_string(),
            created_at: now,
        };
        // Keep the queue sorted even if a caller's clock steps backwards.
        let at = self
            .timers
            .iter()
            .rposition(|t| t.fires_at <= timer.fires_at)
            .map_or(0, |i| i + 1);
        self.timers.insert(at, timer);
    }

    /// Fires every timer due at `now`. Returns the names whose bubble was cleared.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let mut cleared = Vec::new();
        while let Some(timer) = self.timers.front() {
            if timer.fires_at > now {
                break;
            }
            let Some(timer) = self.timers.pop_front() else {
                break;
            };
            let current = self
                .messages
                .get(&timer.name)
                .is_some_and(|m| m.created_at == timer.created_at);
            if current {
                self.messages.remove(&timer.name);
                cleared.push(timer.name);
            }
        }
        cleared
    }

    pub fn get(&self, name: &str) -> Option<&CharacterMessage> {
        self.messages.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).map(|m| m.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
