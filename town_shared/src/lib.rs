//! `town_shared`
//!
//! Shared libraries used by the client and its test harness.
//!
//! Design goals:
//! - Wire types that deserialize directly from the game server's JSON.
//! - Clear separation of concerns (net, model, config, history, render).
//! - Traits for abstraction and dependency injection.
//! - No `unsafe`.

pub mod config;
pub mod error;
pub mod history;
pub mod math;
pub mod model;
pub mod net;
pub mod render;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::history::*;
    pub use crate::math::*;
    pub use crate::model::*;
    pub use crate::net::*;
}
