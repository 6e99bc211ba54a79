//! Local key-value persistence.
//!
//! Values are JSON documents under fixed keys. [`FileStore`] keeps one
//! `<key>.json` file per key in a directory; [`MemoryStore`] is used by
//! tests and when no storage directory is configured.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use town_shared::{
    error::StorageError,
    history::{
        BoundedHistory, ChatEntry, InteractionEntry, CHAT_HISTORY_CAP, INTERACTION_HISTORY_CAP,
    },
    model::{BagItem, Position, Stats, DEFAULT_SPRITE},
};
use tracing::warn;

use crate::player::LocalPlayer;

pub const TOKEN_KEY: &str = "aitown_token";
pub const PROFILE_KEY: &str = "aitown_profile";
pub const CHAT_HISTORY_KEY: &str = "aitown_chat_history";
pub const INTERACTION_HISTORY_KEY: &str = "aitown_interaction_history";
pub const MUSIC_ENABLED_KEY: &str = "aitown_music_enabled";

/// Raw string storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One JSON file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        fs::write(self.path(key), value).map_err(io_err)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persisted player profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub nickname: String,
    #[serde(default = "default_sprite")]
    pub sprite: String,
    #[serde(flatten)]
    pub stats: Stats,
    #[serde(default)]
    pub bag: Vec<BagItem>,
    #[serde(default)]
    pub position: Position,
}

fn default_sprite() -> String {
    DEFAULT_SPRITE.to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            nickname: String::new(),
            sprite: default_sprite(),
            stats: Stats::default(),
            bag: Vec::new(),
            position: Position::default(),
        }
    }
}

impl Profile {
    pub fn of(player: &LocalPlayer) -> Self {
        Self {
            nickname: player.nickname.clone(),
            sprite: player.sprite.clone(),
            stats: player.stats,
            bag: player.bag.clone(),
            position: player.position.clone(),
        }
    }

    /// Copies the profile onto `player`, leaving session fields alone.
    pub fn apply_to(self, player: &mut LocalPlayer) {
        player.nickname = self.nickname;
        player.sprite = self.sprite;
        player.stats = self.stats.clamped();
        player.bag = self.bag;
        player.position = self.position;
    }
}

/// Everything restored at startup.
#[derive(Debug, Clone)]
pub struct SavedState {
    pub token: Option<String>,
    pub profile: Option<Profile>,
    pub chat_history: BoundedHistory<ChatEntry>,
    pub interaction_history: BoundedHistory<InteractionEntry>,
    pub music_enabled: bool,
}

/// Typed access to the client's keys.
pub struct Storage {
    store: Box<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Malformed {
                key: key.to_string(),
                source,
            })
    }

    fn write<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Malformed {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &raw)
    }

    /// Reads a key, treating unreadable values as absent.
    fn read_or_warn<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read(key).unwrap_or_else(|e| {
            warn!(key, error = %e, "Ignoring stored value");
            None
        })
    }

    /// The token is stored as a raw string, not a JSON document.
    pub fn token(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .store
            .get(TOKEN_KEY)?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    pub fn save_token(&mut self, token: &str) -> Result<(), StorageError> {
        self.store.set(TOKEN_KEY, token)
    }

    pub fn profile(&self) -> Result<Option<Profile>, StorageError> {
        self.read(PROFILE_KEY)
    }

    pub fn save_profile(&mut self, profile: &Profile) -> Result<(), StorageError> {
        self.write(PROFILE_KEY, profile)
    }

    pub fn save_chat_history(&mut self, history: &BoundedHistory<ChatEntry>) -> Result<(), StorageError> {
        self.write(CHAT_HISTORY_KEY, &history.to_vec())
    }

    pub fn save_interaction_history(
        &mut self,
        history: &BoundedHistory<InteractionEntry>,
    ) -> Result<(), StorageError> {
        self.write(INTERACTION_HISTORY_KEY, &history.to_vec())
    }

    pub fn music_enabled(&self) -> Result<bool, StorageError> {
        Ok(self.read(MUSIC_ENABLED_KEY)?.unwrap_or(true))
    }

    pub fn save_music_enabled(&mut self, enabled: bool) -> Result<(), StorageError> {
        self.write(MUSIC_ENABLED_KEY, &enabled)
    }

    /// Restores every key. Damaged entries are logged and fall back to
    /// defaults so a bad file never blocks startup.
    pub fn load_all(&self) -> SavedState {
        let token = self.token().unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring stored token");
            None
        });
        let chat: Vec<ChatEntry> = self.read_or_warn(CHAT_HISTORY_KEY).unwrap_or_default();
        let interactions: Vec<InteractionEntry> =
            self.read_or_warn(INTERACTION_HISTORY_KEY).unwrap_or_default();
        SavedState {
            token,
            profile: self.read_or_warn(PROFILE_KEY),
            chat_history: BoundedHistory::from_entries(chat, CHAT_HISTORY_CAP),
            interaction_history: BoundedHistory::from_entries(
                interactions,
                INTERACTION_HISTORY_CAP,
            ),
            music_enabled: self.read_or_warn(MUSIC_ENABLED_KEY).unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use town_shared::model::Direction;

    fn chat(n: usize) -> ChatEntry {
        ChatEntry {
            from: format!("u{n}"),
            from_nickname: None,
            to: None,
            message: format!("msg {n}"),
            timestamp: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn empty_store_yields_defaults() {
        let s = Storage::in_memory();
        let saved = s.load_all();
        assert!(saved.token.is_none());
        assert!(saved.profile.is_none());
        assert!(saved.chat_history.is_empty());
        assert!(saved.music_enabled);
    }

    #[test]
    fn profile_defaults_fill_missing_fields() {
        let p: Profile = serde_json::from_str(r#"{"nickname": "Kim", "energy": 40}"#).unwrap();
        assert_eq!(p.nickname, "Kim");
        assert_eq!(p.sprite, "character1.png");
        assert_eq!(p.stats.energy, 40.0);
        assert_eq!(p.stats.health, 100.0);
        assert_eq!(p.position, Position::new(5.0, 5.0, "campus"));
    }

    #[test]
    fn profile_round_trips_through_player() {
        let mut player = LocalPlayer {
            nickname: "Kim".into(),
            sprite: "char4.png".into(),
            position: Position::new(2.5, 3.0, "library"),
            direction: Direction::Left,
            ..Default::default()
        };
        player.stats.energy = 42.0;

        let mut s = Storage::in_memory();
        s.save_profile(&Profile::of(&player)).unwrap();

        let mut restored = LocalPlayer::default();
        s.profile().unwrap().unwrap().apply_to(&mut restored);
        assert_eq!(restored.nickname, "Kim");
        assert_eq!(restored.position, player.position);
        assert_eq!(restored.stats.energy, 42.0);
        assert_eq!(restored.direction, Direction::Down);
    }

    #[test]
    fn history_reload_keeps_newest_within_cap() {
        let mut s = Storage::in_memory();
        let entries: Vec<ChatEntry> = (0..120).map(chat).collect();
        s.write(CHAT_HISTORY_KEY, &entries).unwrap();

        let saved = s.load_all();
        assert_eq!(saved.chat_history.len(), CHAT_HISTORY_CAP);
        assert_eq!(saved.chat_history.iter().next().unwrap().message, "msg 20");
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Storage::new(FileStore::new(dir.path().join("profile")));
        s.save_token("demo-token-123").unwrap();
        s.save_music_enabled(false).unwrap();

        let s = Storage::new(FileStore::new(dir.path().join("profile")));
        let saved = s.load_all();
        assert_eq!(saved.token.as_deref(), Some("demo-token-123"));
        assert!(!saved.music_enabled);
        assert!(dir.path().join("profile/aitown_music_enabled.json").exists());
    }

    #[test]
    fn malformed_value_is_reported_then_ignored() {
        let mut mem = MemoryStore::default();
        mem.set(PROFILE_KEY, "{not json").unwrap();
        let s = Storage::new(mem);
        assert!(matches!(
            s.profile(),
            Err(StorageError::Malformed { ref key, .. }) if key == PROFILE_KEY
        ));
        assert!(s.load_all().profile.is_none());
    }
}
