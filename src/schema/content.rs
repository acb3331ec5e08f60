/// Generated content. Created per call, owned by the encounter or room that
/// asked for it, discarded when that encounter ends.
use serde::{Deserialize, Serialize};

use super::pattern::{Pattern, PhaseSchedule};
use super::stats::Stats;

/// Mob family, purely descriptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MobClass {
    Aberrant,
    Hollow,
    Corrupted,
    Phantom,
}

impl MobClass {
    pub const ALL: [MobClass; 4] = [
        MobClass::Aberrant,
        MobClass::Hollow,
        MobClass::Corrupted,
        MobClass::Phantom,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Aberrant => "Aberrant",
            Self::Hollow => "Hollow",
            Self::Corrupted => "Corrupted",
            Self::Phantom => "Phantom",
        }
    }
}

/// Special abilities attached to mobs that counter a specific build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    /// Counters strength builds: physical damage taken x0.75.
    ArmorPlating,
    /// Counters caster builds: arcane and holy damage taken x0.7.
    MagicDampening,
    /// Counters repetitive play: repeated dodges fail, repeated attacks x0.8.
    PatternPrediction,
}

impl Ability {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ArmorPlating => "armor_plating",
            Self::MagicDampening => "magic_dampening",
            Self::PatternPrediction => "pattern_prediction",
        }
    }

    pub fn counter_strategy(&self) -> &'static str {
        match self {
            Self::ArmorPlating => "Hardened plates blunt brute force.",
            Self::MagicDampening => "A dead field swallows spellwork.",
            Self::PatternPrediction => "It has already read your next move.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mob {
    pub name: String,
    pub class: MobClass,
    pub stats: Stats,
    pub abilities: Vec<Ability>,
}

impl Mob {
    pub fn max_health(&self) -> u32 {
        (self.stats.vitality * 10).max(1)
    }

    /// Weak fodder; killing many of these reads as farming.
    pub fn is_low_tier(&self) -> bool {
        self.stats.total() < 30
    }

    pub fn has(&self, ability: Ability) -> bool {
        self.abilities.contains(&ability)
    }
}

/// Boss special ability fired alongside the regular action from phase 2 on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BossSpecial {
    EntityCorruption,
    AdaptiveCounter,
}

impl BossSpecial {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::EntityCorruption => "entity_corruption",
            Self::AdaptiveCounter => "adaptive_counter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boss {
    pub name: String,
    pub health: u32,
    pub stats: Stats,
    pub patterns: Vec<Pattern>,
    /// In [0, 1]; shortens the turn timer and rises with phases.
    pub aggression: f32,
    pub special: BossSpecial,
    pub phase_schedule: PhaseSchedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrapKind {
    PoisonMist,
    AmbushSpawn,
    VoidDrain,
    CorruptionField,
    PhantomPain,
}

impl TrapKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::PoisonMist => "poison_mist",
            Self::AmbushSpawn => "ambush_spawn",
            Self::VoidDrain => "void_drain",
            Self::CorruptionField => "corruption_field",
            Self::PhantomPain => "phantom_pain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trap {
    pub kind: TrapKind,
    /// Always in [1, 5].
    pub severity: u8,
    pub effect: String,
}

/// What an environmental hazard does to whoever walks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HazardKind {
    /// Damage rolled uniformly in `[min, max]`.
    Damage { min: u32, max: u32 },
    StatDrain,
    MemoryTrap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub name: String,
    pub kind: HazardKind,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: usize,
    pub connections: Vec<usize>,
    pub trap_chance: f32,
    pub description: String,
}

/// A floor's room graph. Rooms are chained in order so the last room is
/// always reachable; shortcut edges appear with probability `exit_density`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub rooms: Vec<Room>,
    pub exit_density: f32,
    pub trap_density: f32,
    pub description: String,
}

impl Layout {
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub damage: u32,
    pub defense: u32,
    pub effect: u32,
    pub rarity: u32,
    pub curse_risk: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopOffer {
    pub item: Item,
    /// Ashlight; always at least 1.
    pub price: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub flavor: String,
    pub price_multiplier: f32,
    pub offers: Vec<ShopOffer>,
}

/// Numeric parameters for the presentation layer's UI corruption.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiDistortion {
    pub enabled: bool,
    pub delay_ms: u32,
    /// In [0, 0.8].
    pub shuffle_chance: f32,
    /// In [0, 0.5].
    pub phantom_chance: f32,
    pub glitch_colors: bool,
}

impl UiDistortion {
    pub fn disabled() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomKind {
    Safe,
    Combat,
    Shop,
    Miniboss,
    Boss,
    /// Hearth of Still Flame: rest, level up, roll skills.
    Hearth,
    Hazard,
    /// Hidden chamber with an ashlight cache.
    Secret,
}

/// Secondary effect stamped onto a chapter slot in chaos mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChaosEffect {
    Inverted,
    Bleeding,
    Silent,
    Mirrored,
}

impl ChaosEffect {
    pub const ALL: [ChaosEffect; 4] = [
        ChaosEffect::Inverted,
        ChaosEffect::Bleeding,
        ChaosEffect::Silent,
        ChaosEffect::Mirrored,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSlot {
    pub kind: RoomKind,
    pub chaos: Option<ChaosEffect>,
}

/// Nine-slot plan for one chapter of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterBlueprint {
    pub slots: Vec<ChapterSlot>,
    pub chaos_mode: bool,
}

/// End-of-run read on the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub lines: Vec<String>,
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}
