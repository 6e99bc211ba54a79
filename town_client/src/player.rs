//! The locally controlled player.

use town_shared::{
    model::{BagItem, Direction, Position, Stats, DEFAULT_SPRITE},
    net::{ClientEvent, JoinGame},
};

/// Local player state: the entity fields plus session and bag.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub nickname: String,
    pub sprite: String,
    pub position: Position,
    pub direction: Direction,
    pub animation_frame: u32,
    pub stats: Stats,
    pub bag: Vec<BagItem>,
}

impl Default for LocalPlayer {
    fn default() -> Self {
        Self {
            user_id: None,
            token: None,
            nickname: String::new(),
            sprite: DEFAULT_SPRITE.to_string(),
            position: Position::default(),
            direction: Direction::Down,
            animation_frame: 0,
            stats: Stats::default(),
            bag: Vec::new(),
        }
    }
}

impl LocalPlayer {
    /// Nickname shown when the profile never set one.
    pub fn default_nickname(user_id: &str) -> String {
        let prefix: String = user_id.chars().take(8).collect();
        format!("Player_{prefix}")
    }

    /// Fills an empty nickname from the user id.
    pub fn ensure_nickname(&mut self) {
        if self.nickname.trim().is_empty() {
            if let Some(id) = &self.user_id {
                self.nickname = Self::default_nickname(id);
            }
        }
    }

    /// Whether `user_id` names this player.
    pub fn is_self(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }

    /// Mirrors server-side stats.
    pub fn apply_stats(&mut self, stats: Stats) {
        self.stats = stats.clamped();
    }

    /// Announcement sent right after connecting.
    pub fn join_event(&self) -> Option<ClientEvent> {
        let token = self.token.clone()?;
        Some(ClientEvent::JoinGame(JoinGame {
            token,
            nickname: self.nickname.clone(),
            sprite: self.sprite.clone(),
            stats: self.stats,
            position: self.position.clone(),
            bag: self.bag.clone(),
        }))
    }

    /// Position update for the server.
    pub fn move_event(&self) -> Option<ClientEvent> {
        Some(ClientEvent::PlayerMove {
            user_id: self.user_id.clone()?,
            position: self.position.clone(),
            direction: self.direction,
            animation_frame: self.animation_frame,
        })
    }

    /// `bag_size` display slots, filled in bag order.
    pub fn bag_slots(&self, bag_size: usize) -> Vec<Option<&BagItem>> {
        (0..bag_size).map(|i| self.bag.get(i)).collect()
    }
}
