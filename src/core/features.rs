/// The positional feature vector every generator reads.
///
/// Slot order is a contract: generators index into it by the constants
/// below, so any change here is a breaking change to all of them.
use log::warn;
use serde::Serialize;

pub const FEATURE_LEN: usize = 20;

// Slots 0..6 are the normalized primary stats in `StatKind::ALL` order.
pub const STATS: usize = 0;
pub const FLOOR: usize = 6;
pub const CLASS: usize = 7;
pub const LAST_ACTION: usize = 8;
pub const PREDICTABILITY: usize = 9;
pub const SANITY: usize = 10;
pub const DEATHS: usize = 11;
pub const ALLY_COUNT: usize = 12;
pub const FLEE_COUNT: usize = 13;
pub const HEAL_SPAM: usize = 14;
pub const MOB_FARM: usize = 15;
pub const PASSIVE_RATIO: usize = 16;
pub const AGGRESSIVE_RATIO: usize = 17;
pub const DODGE_SKEW: usize = 18;
pub const ITEM_USAGE: usize = 19;

/// Floors in a full descent.
pub const MAX_FLOOR: u8 = 5;
/// Deaths at which the deaths slot reads 1.0. The slot itself is capped at 4.
pub const DEATH_NORM: f32 = 5.0;
pub const DEATH_CAP: f32 = 4.0;
/// Allies at which the ally slot saturates.
pub const ALLY_NORM: f32 = 5.0;
/// Flees, heals and low-tier kills at which their slots saturate.
pub const COUNT_NORM: f32 = 10.0;

/// Values substituted for slots a short vector does not carry: an
/// average player on floor 1 with full sanity and no history.
pub const DEFAULTS: [f32; FEATURE_LEN] = [
    0.5, 0.5, 0.5, 0.5, 0.5, 0.5, // stats
    0.2, // floor
    0.0, // class
    0.0, // last action
    0.5, // predictability
    1.0, // sanity
    0.0, // deaths
    0.0, 0.0, 0.0, 0.0, // allies, flees, heals, low-tier kills
    0.0, 0.0, 0.0, // passive, aggressive, dodge skew
    0.0, // item usage
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    values: [f32; FEATURE_LEN],
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self { values: DEFAULTS }
    }
}

impl FeatureVector {
    /// Build from raw values. Missing trailing slots take their defaults and
    /// non-finite entries are replaced by the slot default; extra values are
    /// ignored. Never fails.
    pub fn new(raw: &[f32]) -> Self {
        if raw.len() < FEATURE_LEN {
            warn!(
                "feature vector has {} of {} slots; defaulting the rest",
                raw.len(),
                FEATURE_LEN
            );
        }
        let mut values = DEFAULTS;
        for (slot, value) in raw.iter().take(FEATURE_LEN).enumerate() {
            if value.is_finite() {
                values[slot] = *value;
            } else {
                warn!("feature slot {} is not finite; using default", slot);
            }
        }
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, slot: usize) -> f32 {
        self.values.get(slot).copied().unwrap_or(0.0)
    }

    pub fn stat(&self, kind: crate::schema::stats::StatKind) -> f32 {
        self.values[STATS + kind.index()]
    }

    pub fn floor_norm(&self) -> f32 {
        self.values[FLOOR]
    }

    /// Floor number recovered from the floor slot, in [1, MAX_FLOOR].
    pub fn floor(&self) -> u8 {
        let floor = (self.values[FLOOR] * MAX_FLOOR as f32).round();
        (floor as u8).clamp(1, MAX_FLOOR)
    }

    pub fn predictability(&self) -> f32 {
        self.values[PREDICTABILITY]
    }

    pub fn sanity_norm(&self) -> f32 {
        self.values[SANITY]
    }

    pub fn deaths_norm(&self) -> f32 {
        self.values[DEATHS]
    }

    pub fn flee_count(&self) -> f32 {
        self.values[FLEE_COUNT]
    }

    pub fn heal_spam(&self) -> f32 {
        self.values[HEAL_SPAM]
    }

    pub fn mob_farm(&self) -> f32 {
        self.values[MOB_FARM]
    }

    /// How hard content leans against the player, in [0, 1].
    pub fn entity_bias(&self) -> f32 {
        entity_bias(self.floor_norm(), self.deaths_norm(), self.sanity_norm())
    }
}

pub fn entity_bias(floor_norm: f32, deaths_norm: f32, sanity_norm: f32) -> f32 {
    let raw = (floor_norm + deaths_norm + (1.0 - sanity_norm)) * 0.15;
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn normalize_deaths(deaths: u64) -> f32 {
    (deaths as f32 / DEATH_NORM).clamp(0.0, DEATH_CAP)
}

/// Map a run tally into [0, 1], saturating at `norm`.
pub fn normalize_count(count: u32, norm: f32) -> f32 {
    (count as f32 / norm).clamp(0.0, 1.0)
}
