//! Local prediction.
//!
//! Runs synchronously inside the simulation step: samples the held keys,
//! resolves the move against the current scene, advances the walk cycle and
//! drains energy. The caller relays the resulting `player_move` event.

use std::time::{Duration, Instant};

use town_shared::{model::Scene, net::ClientEvent};

use crate::{
    collision::{resolve_step, ImageWidths},
    input::MoveIntent,
    player::LocalPlayer,
};

/// Wall-clock time each walk-cycle frame is shown.
pub const FRAME_DURATION: Duration = Duration::from_millis(200);
/// Frames in a walk cycle (sprite sheet columns).
pub const ANIMATION_FRAMES: u32 = 3;
/// Energy spent per tick of movement input.
pub const ENERGY_PER_TICK: f32 = 0.01;

/// Advances the walk cycle on a fixed wall-clock cadence, independent of
/// how often ticks run.
#[derive(Debug, Clone, Default)]
pub struct AnimationClock {
    last_advance: Option<Instant>,
}

impl AnimationClock {
    /// Steps `frame` if more than [`FRAME_DURATION`] passed since the last step.
    pub fn advance(&mut self, frame: &mut u32, now: Instant) -> bool {
        let due = self
            .last_advance
            .map_or(true, |last| now.saturating_duration_since(last) > FRAME_DURATION);
        if due {
            *frame = (*frame + 1) % ANIMATION_FRAMES;
            self.last_advance = Some(now);
        }
        due
    }
}

/// What one prediction tick did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickOutcome {
    /// Position changed.
    pub moved: bool,
    /// Stats changed and should be persisted.
    pub stats_changed: bool,
    /// Event to relay to the server.
    pub event: Option<ClientEvent>,
}

/// Runs one prediction tick for the local player.
///
/// Without movement input nothing changes. With input, the position only
/// changes when a scene is loaded; the frame, energy and relayed event
/// update regardless.
pub fn predict_tick(
    player: &mut LocalPlayer,
    clock: &mut AnimationClock,
    intent: Option<MoveIntent>,
    scene: Option<&Scene>,
    images: &dyn ImageWidths,
    tile_size: f32,
    now: Instant,
) -> TickOutcome {
    let Some(intent) = intent else {
        return TickOutcome::default();
    };

    player.direction = intent.direction;

    let mut moved = false;
    if let Some(scene) = scene {
        let from = player.position.point();
        let to = resolve_step(from, &intent, scene, images, tile_size);
        if to != from {
            player.position.x = to.x;
            player.position.y = to.y;
            moved = true;
        }
    }

    clock.advance(&mut player.animation_frame, now);

    let before = player.stats.energy;
    player.stats.energy = (player.stats.energy - ENERGY_PER_TICK).max(0.0);

    TickOutcome {
        moved,
        stats_changed: player.stats.energy != before,
        event: player.move_event(),
    }
}
