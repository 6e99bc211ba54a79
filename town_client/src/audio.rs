//! Background music switch. Playback itself belongs to the platform layer;
//! the client only tracks and persists the choice.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicToggle {
    enabled: bool,
}

impl Default for MusicToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl MusicToggle {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(self) -> bool {
        self.enabled
    }

    /// Flips the switch and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn label(self) -> &'static str {
        if self.enabled {
            "music on"
        } else {
            "music off"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_and_flips() {
        let mut m = MusicToggle::default();
        assert!(m.is_enabled());
        assert!(!m.toggle());
        assert_eq!(m.label(), "music off");
        assert!(m.toggle());
    }
}
