use serde::{Deserialize, Serialize};

/// Stat value that maps to 1.0 when normalized for the feature vector.
pub const STAT_NORM: f32 = 20.0;

/// The six primary stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Strength,
    Dexterity,
    Intellect,
    Faith,
    Endurance,
    Vitality,
}

impl StatKind {
    /// Fixed order used by the feature vector and by every stat table.
    pub const ALL: [StatKind; 6] = [
        StatKind::Strength,
        StatKind::Dexterity,
        StatKind::Intellect,
        StatKind::Faith,
        StatKind::Endurance,
        StatKind::Vitality,
    ];

    /// Position of this stat in [`StatKind::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::Strength => 0,
            Self::Dexterity => 1,
            Self::Intellect => 2,
            Self::Faith => 3,
            Self::Endurance => 4,
            Self::Vitality => 5,
        }
    }

    /// Short display form: "STR", "DEX", ...
    pub fn abbrev(&self) -> &'static str {
        match self {
            Self::Strength => "STR",
            Self::Dexterity => "DEX",
            Self::Intellect => "INT",
            Self::Faith => "FTH",
            Self::Endurance => "END",
            Self::Vitality => "VIT",
        }
    }

    /// The stat an adversary inflates to answer a player who leans on `self`.
    ///
    /// Heavy hitters meet evasive mobs, evasive players meet hard hitters,
    /// casters meet warded mobs and tanks meet enemies that outlast them.
    pub fn complement(&self) -> StatKind {
        match self {
            Self::Strength => Self::Dexterity,
            Self::Dexterity => Self::Strength,
            Self::Intellect => Self::Faith,
            Self::Faith => Self::Intellect,
            Self::Endurance => Self::Vitality,
            Self::Vitality => Self::Strength,
        }
    }
}

/// A block of primary stats. Every value is kept at 1 or above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub strength: u32,
    pub dexterity: u32,
    pub intellect: u32,
    pub faith: u32,
    pub endurance: u32,
    pub vitality: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self::uniform(10)
    }
}

impl Stats {
    pub fn new(
        strength: u32,
        dexterity: u32,
        intellect: u32,
        faith: u32,
        endurance: u32,
        vitality: u32,
    ) -> Self {
        Self {
            strength: strength.max(1),
            dexterity: dexterity.max(1),
            intellect: intellect.max(1),
            faith: faith.max(1),
            endurance: endurance.max(1),
            vitality: vitality.max(1),
        }
    }

    pub fn uniform(value: u32) -> Self {
        Self::new(value, value, value, value, value, value)
    }

    pub fn get(&self, kind: StatKind) -> u32 {
        match kind {
            StatKind::Strength => self.strength,
            StatKind::Dexterity => self.dexterity,
            StatKind::Intellect => self.intellect,
            StatKind::Faith => self.faith,
            StatKind::Endurance => self.endurance,
            StatKind::Vitality => self.vitality,
        }
    }

    /// Set a stat, clamping to the floor of 1.
    pub fn set(&mut self, kind: StatKind, value: u32) {
        let value = value.max(1);
        match kind {
            StatKind::Strength => self.strength = value,
            StatKind::Dexterity => self.dexterity = value,
            StatKind::Intellect => self.intellect = value,
            StatKind::Faith => self.faith = value,
            StatKind::Endurance => self.endurance = value,
            StatKind::Vitality => self.vitality = value,
        }
    }

    /// Stat scaled into [0, 1] against [`STAT_NORM`].
    pub fn normalized(&self, kind: StatKind) -> f32 {
        (self.get(kind) as f32 / STAT_NORM).clamp(0.0, 1.0)
    }

    /// The highest stat; ties resolve to the earliest in [`StatKind::ALL`].
    pub fn strongest(&self) -> StatKind {
        let mut best = StatKind::Strength;
        for kind in StatKind::ALL {
            if self.get(kind) > self.get(best) {
                best = kind;
            }
        }
        best
    }

    pub fn total(&self) -> u32 {
        StatKind::ALL.iter().map(|k| self.get(*k)).sum()
    }
}
