//! `town_client`
//!
//! Client-side systems:
//! - Asset cache with in-flight dedup and background preloading
//! - Input capture, local prediction and obstacle collision
//! - Entity synchronization from server snapshots and deltas
//! - Camera, scene renderer and speech bubbles over a draw backend
//! - Transient message overlay and the proximity interaction trigger
//! - Local storage, HTTP API and the socket link
//! - `GameClient`, which ties them into a frame loop

pub mod api;
pub mod assets;
pub mod audio;
pub mod bubble;
pub mod client;
pub mod collision;
pub mod input;
pub mod interaction;
pub mod link;
pub mod overlay;
pub mod player;
pub mod prediction;
pub mod renderer;
pub mod storage;
pub mod sync;

pub use client::{ClientDeps, ClientState, GameClient};
