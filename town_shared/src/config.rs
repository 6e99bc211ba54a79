//! Configuration system.
//!
//! Two layers: `GameConfig` is handed out by the server at login, while
//! `ClientConfig` describes how this client reaches the server and where it
//! keeps local state. Both load from JSON strings (file IO left to app).

use serde::{Deserialize, Deserializer, Serialize};

/// Gameplay and viewport settings sent by the server on login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Max per-axis distance (tiles) at which an item can be interacted with.
    #[serde(default = "default_interaction_distance")]
    pub interaction_distance: f32,
    /// Number of bag slots.
    #[serde(default = "default_bag_size")]
    pub bag_size: usize,
    /// Pixels per tile. Zero, negative or null falls back to the default.
    #[serde(default = "default_tile_size", deserialize_with = "positive_tile_size")]
    pub tile_size: f32,
    /// Viewport width in tiles.
    #[serde(default = "default_view_width")]
    pub view_width: u32,
    /// Viewport height in tiles.
    #[serde(default = "default_view_height")]
    pub view_height: u32,
    /// Server-side simulation speed. Not used by the client.
    #[serde(default = "default_game_speed")]
    pub game_speed: f32,
    /// Server-side day length. Not used by the client.
    #[serde(default = "default_day_length")]
    pub day_length_seconds: u32,
}

fn default_interaction_distance() -> f32 {
    2.0
}

fn default_bag_size() -> usize {
    10
}

fn default_tile_size() -> f32 {
    64.0
}

fn positive_tile_size<'de, D: Deserializer<'de>>(d: D) -> Result<f32, D::Error> {
    let raw = Option::<f32>::deserialize(d)?;
    Ok(raw.filter(|t| *t > 0.0).unwrap_or_else(default_tile_size))
}

fn default_view_width() -> u32 {
    15
}

fn default_view_height() -> u32 {
    11
}

fn default_game_speed() -> f32 {
    1.0
}

fn default_day_length() -> u32 {
    300
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            interaction_distance: default_interaction_distance(),
            bag_size: default_bag_size(),
            tile_size: default_tile_size(),
            view_width: default_view_width(),
            view_height: default_view_height(),
            game_speed: default_game_speed(),
            day_length_seconds: default_day_length(),
        }
    }
}

impl GameConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Canvas size in pixels.
    pub fn canvas_size(&self) -> (f32, f32) {
        (
            self.view_width as f32 * self.tile_size,
            self.view_height as f32 * self.tile_size,
        )
    }
}

/// Local client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Socket server address, e.g. `127.0.0.1:5000`.
    pub server_addr: String,
    /// Base URL of the HTTP API and static assets.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Serve assets from this directory instead of over HTTP.
    #[serde(default)]
    pub asset_dir: Option<String>,
    /// Directory holding persisted local state.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,
    /// Target frames per second of the main loop.
    #[serde(default = "default_frame_hz")]
    pub frame_hz: u32,
    /// Login token; falls back to the persisted one.
    #[serde(default)]
    pub token: Option<String>,
    /// Nickname override; falls back to the persisted profile.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Sprite override; falls back to the persisted profile.
    #[serde(default)]
    pub sprite: Option<String>,
}

fn default_api_base() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_storage_dir() -> String {
    ".aitown".to_string()
}

fn default_frame_hz() -> u32 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:5001".to_string(),
            api_base: default_api_base(),
            asset_dir: None,
            storage_dir: default_storage_dir(),
            frame_hz: default_frame_hz(),
            token: None,
            nickname: None,
            sprite: None,
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
