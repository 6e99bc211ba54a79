//! Entity synchronization.
//!
//! Merges server snapshots and deltas into the local entity tables. This is
//! the only writer of the tables; the renderer only reads them. Snapshot
//! events (`game_state`, `ai_update`) replace tables wholesale, deltas
//! patch single records.

use town_shared::{
    model::{Entity, EntityKind},
    net::{EntityMap, ServerEvent},
};
use tracing::{debug, warn};

use crate::{assets::character_asset, player::LocalPlayer};

/// Remote entities known to this client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityTables {
    /// Human players keyed by user id. May include the local player.
    pub players: EntityMap,
    /// AI-driven players keyed by name.
    pub ai_players: EntityMap,
    /// AI-driven fixed characters keyed by name.
    pub ai_characters: EntityMap,
}

impl EntityTables {
    /// Table holding `kind`; entities of an unknown kind have none.
    pub fn table(&self, kind: EntityKind) -> Option<&EntityMap> {
        match kind {
            EntityKind::HumanPlayer => Some(&self.players),
            EntityKind::AiPlayer => Some(&self.ai_players),
            EntityKind::AiCharacter => Some(&self.ai_characters),
            EntityKind::Unknown => None,
        }
    }

    /// Every entity with its table, in draw order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &String, &Entity)> {
        self.players
            .iter()
            .map(|(id, e)| (EntityKind::HumanPlayer, id, e))
            .chain(self.ai_players.iter().map(|(id, e)| (EntityKind::AiPlayer, id, e)))
            .chain(
                self.ai_characters
                    .iter()
                    .map(|(id, e)| (EntityKind::AiCharacter, id, e)),
            )
    }

    pub fn len(&self) -> usize {
        self.players.len() + self.ai_players.len() + self.ai_characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nickname of a known human player.
    pub fn player_nickname(&self, user_id: &str) -> Option<&str> {
        self.players
            .get(user_id)
            .map(|p| p.display_name())
            .filter(|n| !n.is_empty())
    }
}

/// Follow-up work produced by applying an entity event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    /// Sprite assets of entities seen in this event.
    pub preload: Vec<String>,
    /// System notices for the chat log.
    pub notices: Vec<String>,
    /// The local player's stats changed and should be persisted.
    pub self_stats_changed: bool,
    /// AI tables were replaced.
    pub ai_replaced: bool,
}

impl SyncOutcome {
    fn preload_sprites<'a>(&mut self, entities: impl IntoIterator<Item = &'a Entity>) {
        for e in entities {
            if let Some(sprite) = e.sprite.as_deref().filter(|s| !s.is_empty()) {
                let path = character_asset(sprite);
                if !self.preload.contains(&path) {
                    self.preload.push(path);
                }
            }
        }
    }
}

/// Applies an entity event. Returns `None` for events that do not touch the
/// entity tables.
pub fn apply_event(
    tables: &mut EntityTables,
    local: &mut LocalPlayer,
    event: &ServerEvent,
) -> Option<SyncOutcome> {
    let mut out = SyncOutcome::default();
    match event {
        ServerEvent::GameState(snap) => {
            tables.players = snap.players.clone();
            tables.ai_characters = snap.ai_characters.clone();
            tables.ai_players = snap.ai_players.clone();
            local.user_id = Some(snap.your_id.clone());
            debug!(
                players = tables.players.len(),
                ai_players = tables.ai_players.len(),
                ai_characters = tables.ai_characters.len(),
                your_id = %snap.your_id,
                "Game state snapshot applied"
            );
            out.preload_sprites(
                tables
                    .players
                    .values()
                    .chain(tables.ai_players.values())
                    .chain(tables.ai_characters.values()),
            );
            out.ai_replaced = true;
        }
        ServerEvent::PlayerJoined(player) => {
            let Some(user_id) = player.user_id.clone() else {
                warn!("player_joined without user_id ignored");
                return Some(out);
            };
            out.preload_sprites([player]);
            out.notices
                .push(format!("{} joined the game", player.display_name()));
            tables.players.insert(user_id, player.clone());
        }
        ServerEvent::PlayerDisconnected { user_id } => {
            if let Some(player) = tables.players.remove(user_id) {
                out.notices
                    .push(format!("{} left the game", player.display_name()));
            }
        }
        ServerEvent::PlayerMoved(moved) => {
            if let Some(player) = tables.players.get_mut(&moved.user_id) {
                player.position = moved.position.clone();
                player.direction = moved.direction;
                player.animation_frame = moved.animation_frame;
            }
        }
        ServerEvent::PlayerStatusUpdate(update) => {
            if local.is_self(&update.user_id) {
                local.apply_stats(update.stats);
                out.self_stats_changed = true;
            }
            if let Some(player) = tables.players.get_mut(&update.user_id) {
                player.stats = update.stats;
            }
        }
        ServerEvent::AiUpdate(update) => {
            tables.ai_characters = update.ai_characters.clone();
            tables.ai_players = update.ai_players.clone();
            out.preload_sprites(
                tables
                    .ai_players
                    .values()
                    .chain(tables.ai_characters.values()),
            );
            out.ai_replaced = true;
        }
        ServerEvent::InteractionResult(_) | ServerEvent::ChatMessage(_) | ServerEvent::Error { .. } => {
            return None;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use town_shared::{
        model::{Direction, Position, Stats},
        net::{AiUpdate, GameStateSnapshot, PlayerMoved, StatusUpdate},
    };

    fn human(id: &str, nick: &str, sprite: &str) -> Entity {
        Entity {
            user_id: Some(id.into()),
            nickname: Some(nick.into()),
            name: None,
            sprite: Some(sprite.into()),
            position: Position::new(1.0, 1.0, "campus"),
            direction: Direction::Down,
            animation_frame: 0,
            stats: Stats::default(),
            kind: Some(EntityKind::HumanPlayer),
        }
    }

    fn ai(name: &str, sprite: &str) -> Entity {
        Entity {
            user_id: None,
            nickname: None,
            name: Some(name.into()),
            sprite: Some(sprite.into()),
            position: Position::new(3.0, 3.0, "campus"),
            direction: Direction::Down,
            animation_frame: 0,
            stats: Stats::default(),
            kind: Some(EntityKind::AiCharacter),
        }
    }

    fn snapshot() -> ServerEvent {
        ServerEvent::GameState(GameStateSnapshot {
            players: [
                ("me".to_string(), human("me", "Me", "character1.png")),
                ("u2".to_string(), human("u2", "Bo", "char7.png")),
            ]
            .into(),
            ai_characters: [("chef".to_string(), ai("chef", "character1.png"))].into(),
            ai_players: EntityMap::new(),
            your_id: "me".into(),
        })
    }

    #[test]
    fn snapshot_replaces_tables_and_adopts_id() {
        let mut tables = EntityTables::default();
        tables
            .players
            .insert("ghost".into(), human("ghost", "Gone", "x.png"));
        let mut local = LocalPlayer::default();

        let out = apply_event(&mut tables, &mut local, &snapshot()).unwrap();
        assert_eq!(local.user_id.as_deref(), Some("me"));
        assert!(!tables.players.contains_key("ghost"));
        assert_eq!(tables.len(), 3);
        let order: Vec<(EntityKind, &str)> =
            tables.iter().map(|(kind, id, _)| (kind, id.as_str())).collect();
        assert_eq!(
            order,
            vec![
                (EntityKind::HumanPlayer, "me"),
                (EntityKind::HumanPlayer, "u2"),
                (EntityKind::AiCharacter, "chef"),
            ]
        );
        assert_eq!(tables.table(EntityKind::Unknown), None);
        assert_eq!(
            out.preload,
            vec![
                "characters/character1.png".to_string(),
                "characters/char7.png".to_string()
            ]
        );
    }

    #[test]
    fn join_then_leave_produces_notices() {
        let mut tables = EntityTables::default();
        let mut local = LocalPlayer::default();

        let out = apply_event(
            &mut tables,
            &mut local,
            &ServerEvent::PlayerJoined(human("u3", "Cy", "char7.png")),
        )
        .unwrap();
        assert_eq!(out.preload, vec!["characters/char7.png".to_string()]);
        assert_eq!(out.notices, vec!["Cy joined the game".to_string()]);

        let out = apply_event(
            &mut tables,
            &mut local,
            &ServerEvent::PlayerDisconnected {
                user_id: "u3".into(),
            },
        )
        .unwrap();
        assert_eq!(out.notices, vec!["Cy left the game".to_string()]);
        assert!(tables.is_empty());

        // Unknown id: nothing to say.
        let out = apply_event(
            &mut tables,
            &mut local,
            &ServerEvent::PlayerDisconnected {
                user_id: "u3".into(),
            },
        )
        .unwrap();
        assert!(out.notices.is_empty());
    }

    #[test]
    fn moves_patch_known_players_only() {
        let mut tables = EntityTables::default();
        let mut local = LocalPlayer::default();
        apply_event(&mut tables, &mut local, &snapshot());

        let moved = |id: &str| {
            ServerEvent::PlayerMoved(PlayerMoved {
                user_id: id.into(),
                position: Position::new(7.5, 2.0, "library"),
                direction: Direction::Up,
                animation_frame: 2,
            })
        };
        apply_event(&mut tables, &mut local, &moved("u2"));
        apply_event(&mut tables, &mut local, &moved("nobody"));

        let bo = &tables.players["u2"];
        assert_eq!(bo.position, Position::new(7.5, 2.0, "library"));
        assert_eq!(bo.direction, Direction::Up);
        assert_eq!(bo.animation_frame, 2);
        assert!(!tables.players.contains_key("nobody"));
    }

    #[test]
    fn self_status_mirrors_into_local_player() {
        let mut tables = EntityTables::default();
        let mut local = LocalPlayer::default();
        apply_event(&mut tables, &mut local, &snapshot());

        let stats = Stats {
            energy: 40.0,
            happiness: 80.0,
            health: 90.0,
        };
        let out = apply_event(
            &mut tables,
            &mut local,
            &ServerEvent::PlayerStatusUpdate(StatusUpdate {
                user_id: "me".into(),
                stats,
            }),
        )
        .unwrap();
        assert!(out.self_stats_changed);
        assert_eq!(local.stats, stats);
        assert_eq!(tables.players["me"].stats, stats);

        let out = apply_event(
            &mut tables,
            &mut local,
            &ServerEvent::PlayerStatusUpdate(StatusUpdate {
                user_id: "u2".into(),
                stats: Stats::default(),
            }),
        )
        .unwrap();
        assert!(!out.self_stats_changed);
        assert_eq!(local.stats, stats);
    }

    #[test]
    fn ai_update_replaces_not_merges() {
        let mut tables = EntityTables::default();
        let mut local = LocalPlayer::default();
        apply_event(&mut tables, &mut local, &snapshot());

        let out = apply_event(
            &mut tables,
            &mut local,
            &ServerEvent::AiUpdate(AiUpdate {
                ai_characters: EntityMap::new(),
                ai_players: [("alice_ai".to_string(), ai("alice_ai", "char3.png"))].into(),
            }),
        )
        .unwrap();
        assert!(out.ai_replaced);
        assert!(tables.ai_characters.is_empty());
        assert_eq!(tables.ai_players.len(), 1);
        assert_eq!(tables.players.len(), 2);
        assert_eq!(out.preload, vec!["characters/char3.png".to_string()]);
    }

    #[test]
    fn non_entity_events_pass_through() {
        let mut tables = EntityTables::default();
        let mut local = LocalPlayer::default();
        let ev = ServerEvent::Error {
            message: "Invalid token".into(),
        };
        assert!(apply_event(&mut tables, &mut local, &ev).is_none());
    }
}
