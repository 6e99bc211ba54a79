//! Game data model shared by the protocol and the client.
//!
//! Field names follow the server's JSON so these types deserialize straight
//! from socket events and HTTP responses.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Scene the server places new profiles in.
pub const DEFAULT_SCENE: &str = "campus";
/// Sprite sheet used when a profile never picked one.
pub const DEFAULT_SPRITE: &str = "character1.png";
/// Upper bound for energy, happiness and health.
pub const STAT_MAX: f32 = 100.0;

/// Tile-space position plus the scene it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub scene: String,
}

impl Position {
    pub fn new(x: f32, y: f32, scene: impl Into<String>) -> Self {
        Self {
            x,
            y,
            scene: scene.into(),
        }
    }

    pub fn point(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(5.0, 5.0, DEFAULT_SCENE)
    }
}

/// Facing direction of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    /// Row of a character sprite sheet holding this facing.
    pub fn sprite_row(self) -> u32 {
        match self {
            Direction::Down => 0,
            Direction::Left => 1,
            Direction::Right => 2,
            Direction::Up => 3,
        }
    }
}

/// Which table an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    HumanPlayer,
    AiPlayer,
    AiCharacter,
    /// Any `type` this client does not know; the entity is still kept.
    #[serde(other)]
    Unknown,
}

/// Energy, happiness and health, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default = "full_stat")]
    pub energy: f32,
    #[serde(default = "full_stat")]
    pub happiness: f32,
    #[serde(default = "full_stat")]
    pub health: f32,
}

fn full_stat() -> f32 {
    STAT_MAX
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            energy: STAT_MAX,
            happiness: STAT_MAX,
            health: STAT_MAX,
        }
    }
}

impl Stats {
    /// Copy with every value clamped into range.
    pub fn clamped(self) -> Self {
        Self {
            energy: self.energy.clamp(0.0, STAT_MAX),
            happiness: self.happiness.clamp(0.0, STAT_MAX),
            health: self.health.clamp(0.0, STAT_MAX),
        }
    }
}

/// A renderable character: remote human player, AI player or AI character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Set for human players.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Set for AI-driven entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite: Option<String>,
    pub position: Position,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub animation_frame: u32,
    #[serde(flatten)]
    pub stats: Stats,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
}

impl Entity {
    /// Label drawn above the entity and used to key speech bubbles.
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }
}

/// A placed scene object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default = "unit_size")]
    pub size: f32,
    #[serde(default)]
    pub obstacle: bool,
    #[serde(default)]
    pub name: String,
    /// Server-defined interaction payload, forwarded untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<serde_json::Value>,
}

fn unit_size() -> f32 {
    1.0
}

impl Item {
    pub fn point(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Something carried in a player's bag. Extra server fields are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BagItem {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Spawn location inside a scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
}

/// A named tile map with its items. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub floor_texture: Option<String>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub spawn_points: Vec<SpawnPoint>,
}

impl Scene {
    /// True when `(x, y)` lies in `[0, width) x [0, height)`.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.contains_x(x) && self.contains_y(y)
    }

    pub fn contains_x(&self, x: f32) -> bool {
        x >= 0.0 && x < self.width
    }

    pub fn contains_y(&self, y: f32) -> bool {
        y >= 0.0 && y < self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_defaults_fill_missing_fields() {
        let e: Entity = serde_json::from_str(
            r#"{"name":"chef","position":{"x":3,"y":4,"scene":"campus"}}"#,
        )
        .unwrap();
        assert_eq!(e.direction, Direction::Down);
        assert_eq!(e.animation_frame, 0);
        assert_eq!(e.stats, Stats::default());
        assert_eq!(e.display_name(), "chef");
    }

    #[test]
    fn nickname_wins_over_name() {
        let e: Entity = serde_json::from_str(
            r#"{"nickname":"Ann","name":"a","position":{"x":0,"y":0,"scene":"s"},"type":"ai_player"}"#,
        )
        .unwrap();
        assert_eq!(e.display_name(), "Ann");
        assert_eq!(e.kind, Some(EntityKind::AiPlayer));
    }

    #[test]
    fn scene_bounds_are_half_open() {
        let scene = Scene {
            name: "s".into(),
            width: 10.0,
            height: 10.0,
            floor_texture: None,
            items: Vec::new(),
            spawn_points: Vec::new(),
        };
        assert!(scene.contains(0.0, 9.99));
        assert!(!scene.contains(10.0, 5.0));
        assert!(!scene.contains(-0.1, 5.0));
    }

    #[test]
    fn sprite_rows_follow_sheet_layout() {
        assert_eq!(Direction::Down.sprite_row(), 0);
        assert_eq!(Direction::Left.sprite_row(), 1);
        assert_eq!(Direction::Right.sprite_row(), 2);
        assert_eq!(Direction::Up.sprite_row(), 3);
    }
}
