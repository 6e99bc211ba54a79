//! Input handling.
//!
//! A windowing layer (or the console in the `client` binary) feeds key
//! presses and UI actions in as [`InputEvent`]s. The frame loop folds them
//! into a [`KeyState`], which the prediction step samples once per tick.

use std::collections::HashSet;

use town_shared::model::Direction;

/// Keys the game reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    W,
    A,
    S,
    D,
    /// Interact with the nearest-in-order item.
    E,
    /// Toggle the bag view.
    B,
}

impl Key {
    /// Parses a browser-style key name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "arrowup" | "up" => Some(Key::ArrowUp),
            "arrowdown" | "down" => Some(Key::ArrowDown),
            "arrowleft" | "left" => Some(Key::ArrowLeft),
            "arrowright" | "right" => Some(Key::ArrowRight),
            "w" => Some(Key::W),
            "a" => Some(Key::A),
            "s" => Some(Key::S),
            "d" => Some(Key::D),
            "e" => Some(Key::E),
            "b" => Some(Key::B),
            _ => None,
        }
    }

    /// Movement direction bound to this key, if any.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Key::ArrowUp | Key::W => Some(Direction::Up),
            Key::ArrowDown | Key::S => Some(Direction::Down),
            Key::ArrowLeft | Key::A => Some(Direction::Left),
            Key::ArrowRight | Key::D => Some(Direction::Right),
            Key::E | Key::B => None,
        }
    }
}

/// Input delivered to the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    /// Send a chat line.
    Chat(String),
    /// Chat input gained (`true`) or lost focus.
    ChatFocus(bool),
    ToggleMusic,
}

/// Currently held keys plus chat focus.
#[derive(Debug, Clone, Default)]
pub struct KeyState {
    held: HashSet<Key>,
    chat_focused: bool,
}

/// Movement requested by held keys for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveIntent {
    pub dx: f32,
    pub dy: f32,
    pub direction: Direction,
}

impl KeyState {
    /// Records a key press. Ignored while chat has focus.
    pub fn press(&mut self, key: Key) {
        if self.chat_focused {
            return;
        }
        self.held.insert(key);
    }

    /// Records a key release. Ignored while chat has focus.
    pub fn release(&mut self, key: Key) {
        if self.chat_focused {
            return;
        }
        self.held.remove(&key);
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn set_chat_focus(&mut self, focused: bool) {
        self.chat_focused = focused;
    }

    pub fn chat_focused(&self) -> bool {
        self.chat_focused
    }

    fn direction_held(&self, dir: Direction) -> bool {
        self.held.iter().any(|k| k.direction() == Some(dir))
    }

    /// Facing the local sprite is drawn with: the first held direction in
    /// up, down, left, right order, else down.
    pub fn facing(&self) -> Direction {
        [Direction::Up, Direction::Down, Direction::Left, Direction::Right]
            .into_iter()
            .find(|dir| self.direction_held(*dir))
            .unwrap_or(Direction::Down)
    }

    /// Samples movement for this tick.
    ///
    /// Directions are checked up, down, left, right; a later check overrides
    /// an earlier one on the same axis, and the last matching check sets the
    /// facing. `None` while chat is focused or no movement key is held.
    pub fn move_intent(&self) -> Option<MoveIntent> {
        if self.chat_focused {
            return None;
        }
        let mut dx = 0.0;
        let mut dy = 0.0;
        let mut direction = None;

        if self.direction_held(Direction::Up) {
            dy = -1.0;
            direction = Some(Direction::Up);
        }
        if self.direction_held(Direction::Down) {
            dy = 1.0;
            direction = Some(Direction::Down);
        }
        if self.direction_held(Direction::Left) {
            dx = -1.0;
            direction = Some(Direction::Left);
        }
        if self.direction_held(Direction::Right) {
            dx = 1.0;
            direction = Some(Direction::Right);
        }

        direction.map(|direction| MoveIntent { dx, dy, direction })
    }
}
