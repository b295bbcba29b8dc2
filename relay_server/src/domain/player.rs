// Domain-level player state and the value types it is built from.

use std::fmt;

/// Transport-assigned identity of a single connection.
///
/// Identities are never reused within a process; a reconnecting client gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// World-space coordinates. Both components are always finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    x: f64,
    y: f64,
}

impl Position {
    /// Returns `None` when either component is NaN or infinite.
    pub fn new(x: f64, y: f64) -> Option<Self> {
        if x.is_finite() && y.is_finite() {
            Some(Self { x, y })
        } else {
            None
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

/// Visual variants a player may pick.
pub const SKINS: [&str; 10] = [
    "player", "knight", "archer", "mage", "rogue", "pirate", "viking", "samurai", "wizard",
    "ranger",
];

/// A skin name that is known to be on the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Skin(&'static str);

impl Skin {
    /// Looks up `name` in the allow-list. Matching is exact (case-sensitive).
    pub fn parse(name: &str) -> Option<Self> {
        SKINS.into_iter().find(|skin| *skin == name).map(Skin)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Default for Skin {
    fn default() -> Self {
        Skin(SKINS[0])
    }
}

impl fmt::Display for Skin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub const DEFAULT_X: f64 = 400.0;
pub const DEFAULT_Y: f64 = 300.0;
pub const DEFAULT_ANIMATION: &str = "down";

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: ConnectionId,
    pub position: Position,
    // Free-form; the client decides which tags exist.
    pub animation_tag: String,
    pub skin: Skin,
}

impl PlayerState {
    /// State every player starts with when their connection is accepted.
    pub fn spawn(id: ConnectionId) -> Self {
        Self {
            id,
            position: Position {
                x: DEFAULT_X,
                y: DEFAULT_Y,
            },
            animation_tag: DEFAULT_ANIMATION.to_string(),
            skin: Skin::default(),
        }
    }

    pub fn apply(&mut self, update: PlayerUpdate) {
        if let Some(position) = update.position {
            self.position = position;
        }
        if let Some(animation_tag) = update.animation_tag {
            self.animation_tag = animation_tag;
        }
        if let Some(skin) = update.skin {
            self.skin = skin;
        }
    }
}

/// Partial update built only from already validated values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerUpdate {
    pub position: Option<Position>,
    pub animation_tag: Option<String>,
    pub skin: Option<Skin>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_rejects_non_finite_components() {
        assert!(Position::new(f64::NAN, 1.0).is_none());
        assert!(Position::new(1.0, f64::INFINITY).is_none());
        assert!(Position::new(f64::NEG_INFINITY, f64::NAN).is_none());
        assert!(Position::new(-12.5, 0.0).is_some());
    }

    #[test]
    fn skin_allow_list_has_ten_entries_and_includes_default() {
        assert_eq!(SKINS.len(), 10);
        assert_eq!(Skin::default().as_str(), "player");
        assert_eq!(Skin::parse("knight").map(|s| s.as_str()), Some("knight"));
    }

    #[test]
    fn skin_parse_rejects_unknown_and_differently_cased_names() {
        assert!(Skin::parse("ninja").is_none());
        assert!(Skin::parse("Knight").is_none());
        assert!(Skin::parse("").is_none());
    }

    #[test]
    fn spawn_uses_default_state() {
        let state = PlayerState::spawn(ConnectionId(7));
        assert_eq!(state.id, ConnectionId(7));
        assert_eq!(state.position.x(), 400.0);
        assert_eq!(state.position.y(), 300.0);
        assert_eq!(state.animation_tag, "down");
        assert_eq!(state.skin.as_str(), "player");
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut state = PlayerState::spawn(ConnectionId(1));
        state.apply(PlayerUpdate {
            skin: Skin::parse("mage"),
            ..PlayerUpdate::default()
        });

        assert_eq!(state.skin.as_str(), "mage");
        assert_eq!(state.animation_tag, "down");
        assert_eq!(state.position.x(), 400.0);
    }
}
