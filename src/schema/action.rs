use serde::{Deserialize, Serialize};

/// Direction of a dodge roll. Tracked across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// An action the player can choose during a combat round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerAction {
    Attack,
    Dodge(Side),
    Heal,
    Special,
    Flee,
}

impl PlayerAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Attack => ActionKind::Attack,
            Self::Dodge(_) => ActionKind::Dodge,
            Self::Heal => ActionKind::Heal,
            Self::Special => ActionKind::Special,
            Self::Flee => ActionKind::Flee,
        }
    }

    /// Parse the single-key shorthand used by terminal front ends.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "a" | "attack" => Some(Self::Attack),
            "d" | "dl" | "dodge" | "dodge_left" => Some(Self::Dodge(Side::Left)),
            "dr" | "dodge_right" => Some(Self::Dodge(Side::Right)),
            "h" | "heal" => Some(Self::Heal),
            "s" | "special" => Some(Self::Special),
            "f" | "flee" => Some(Self::Flee),
            _ => None,
        }
    }
}

/// Action category recorded in the rolling history. `Stunned` is what a
/// round becomes when the turn timer expires or a flee is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Attack,
    Dodge,
    Heal,
    Special,
    Flee,
    Stunned,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Attack,
        ActionKind::Dodge,
        ActionKind::Heal,
        ActionKind::Special,
        ActionKind::Flee,
        ActionKind::Stunned,
    ];

    pub fn index(&self) -> usize {
        match self {
            Self::Attack => 0,
            Self::Dodge => 1,
            Self::Heal => 2,
            Self::Special => 3,
            Self::Flee => 4,
            Self::Stunned => 5,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Dodge => "dodge",
            Self::Heal => "heal",
            Self::Special => "special",
            Self::Flee => "flee",
            Self::Stunned => "stunned",
        }
    }
}

/// Terminal result of an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Victory,
    Defeat,
    Fled,
}

impl Outcome {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Victory => "victory",
            Self::Defeat => "defeat",
            Self::Fled => "fled",
        }
    }
}
