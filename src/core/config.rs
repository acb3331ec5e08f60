/// Engine configuration, loaded from RON. Every field has a default, so a
/// config file only needs the values it changes.
use log::info;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub memory_path: PathBuf,
    pub lore_path: PathBuf,
    pub seed: u64,
    pub history_len: usize,
    pub combat: CombatConfig,
    pub generation: GenerationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_path: PathBuf::from("memory/entity.json"),
            lore_path: PathBuf::from("memory/game_bible.ron"),
            seed: 0,
            history_len: 10,
            combat: CombatConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load a config file. A missing file yields the defaults.
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse_ron(&contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no config at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Turn timer for regular fights: max(floor, base × (1 − aggression × scale)).
    pub regular_timer_base: f32,
    pub regular_timer_scale: f32,
    pub regular_timer_floor: u64,
    pub boss_timer_base: f32,
    pub boss_timer_scale: f32,
    pub boss_timer_floor: u64,
    /// Ashlight spent per heal.
    pub heal_cost: u32,
    /// Dodge succeeds with probability base + DEX / 20.
    pub dodge_base_chance: f32,
    pub dodge_stamina_cost: u32,
    /// Divisor applied to a dodged hit.
    pub dodge_divisor: u32,
    pub boss_special_chance: f32,
    /// Boss flee: bias at or above `deny` is refused, below `allow` always
    /// succeeds; in between it is a coin flip.
    pub flee_deny_bias: f32,
    pub flee_allow_bias: f32,
    /// Entity amplification kicks in above this bias.
    pub amplify_bias: f32,
    /// Apply the generated UI distortion to player input.
    pub distort_input: bool,
    /// Safety cap on rounds per encounter; reaching it counts as a flight.
    pub max_rounds: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            regular_timer_base: 6.0,
            regular_timer_scale: 0.4,
            regular_timer_floor: 3,
            boss_timer_base: 5.0,
            boss_timer_scale: 0.5,
            boss_timer_floor: 2,
            heal_cost: 8,
            dodge_base_chance: 0.5,
            dodge_stamina_cost: 1,
            dodge_divisor: 3,
            boss_special_chance: 0.3,
            flee_deny_bias: 0.3,
            flee_allow_bias: 0.2,
            amplify_bias: 0.6,
            distort_input: false,
            max_rounds: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Deaths at which chapter blueprints enter chaos mode.
    pub chaos_deaths: u64,
    pub chaos_chance: f32,
    /// Flee slot above which layouts stretch out. The count slots are
    /// tallies divided by ten, so 0.5 means more than five flees.
    pub flee_threshold: f32,
    /// Heal-spam slot above which traps turn to poison.
    pub heal_spam_threshold: f32,
    /// Mob-farm slot above which traps turn to ambushes.
    pub mob_farm_threshold: f32,
    /// Counter abilities attach above this bias.
    pub ability_bias: f32,
    /// Chance a planned fight becomes a hazard room.
    pub hazard_chance: f32,
    /// Chance a planned fight becomes a secret room.
    pub secret_chance: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            chaos_deaths: 10,
            chaos_chance: 0.2,
            flee_threshold: 0.5,
            heal_spam_threshold: 0.3,
            mob_farm_threshold: 0.5,
            ability_bias: 0.4,
            hazard_chance: 0.2,
            secret_chance: 0.1,
        }
    }
}
