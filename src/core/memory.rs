/// Behavioral memory: the cross-run record of how this player plays.
///
/// One document per player identity, rewritten wholesale and synced to disk
/// after every mutation. Each store has exactly one writer (its session);
/// nothing here coordinates concurrent writers.
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::persist::{self, WriteOutcome};
use crate::schema::action::{ActionKind, PlayerAction, Side};
use crate::schema::class::ClassId;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("counter '{key}' cannot decrease ({current} -> {requested})")]
    CounterRegression {
        key: String,
        current: u64,
        requested: u64,
    },
    #[error("key '{0}' does not hold a counter")]
    NotACounter(String),
}

/// Keys whose values may only grow. `item_usage_this_run` is run-scoped
/// and deliberately absent.
const MONOTONIC_KEYS: &[&str] = &[
    "dodge_left_count",
    "dodge_right_count",
    "passive_fights",
    "aggressive_fights",
    "total_fights",
    "repeat_action_count",
    "times_restarted",
    "floors_cleared",
];

/// NPCs present in a fresh memory document.
const DEFAULT_NPCS: &[&str] = &[
    "The Lorekeeper",
    "Blacktongue",
    "Ash Sister",
    "Faceless Merchant",
    "Still Flame Warden",
    "The Hollowed",
];

pub const FACELESS_MERCHANT: &str = "Faceless Merchant";
/// Unforgiven snubs the merchant tolerates before leaving for good.
const MERCHANT_PATIENCE: u64 = 5;

// Per-NPC tallies kept in `NpcRecord::counters`.
pub const IGNORED: &str = "ignored";
pub const FORGIVEN: &str = "forgiven";
pub const LORE_UNLOCKED: &str = "lore_unlocked";
pub const UPGRADES: &str = "upgrades_done";
pub const RIDDLES_ANSWERED: &str = "riddles_answered";
pub const RIDDLES_FAILED: &str = "riddles_failed";
pub const UNDERPAID: &str = "underpaid";

/// Share of fights above which a behavior type dominates.
const BEHAVIOR_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NpcMood {
    #[default]
    Neutral,
    Respectful,
    Mocking,
    Hostile,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NpcRecord {
    #[serde(default)]
    pub visits: u64,
    #[serde(default)]
    pub mood: NpcMood,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub insulted: bool,
    /// Per-NPC tallies: insults, riddles_answered, underpaid, ...
    #[serde(default)]
    pub counters: BTreeMap<String, u64>,
    /// The NPC has left and will not come back.
    #[serde(default)]
    pub departed: bool,
}

impl NpcRecord {
    pub fn count(&self, key: &str) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    /// Snubs not yet made up for by an apology.
    pub fn unforgiven(&self) -> u64 {
        self.count(IGNORED).saturating_sub(self.count(FORGIVEN))
    }
}

/// One NPC interaction to fold into the log.
#[derive(Debug, Clone, PartialEq)]
pub enum NpcInteraction {
    Visit,
    Choice(String),
    /// Set the mood outright instead of deriving it.
    Mood(NpcMood),
    Count(String),
    Insulted,
    /// Every snub so far is forgiven.
    Forgiven,
}

/// A dialogue choice the player makes in front of an NPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcChoice {
    Leave,
    RequestLore,
    UpgradeWeapon,
    Riddle { solved: bool },
    Insult,
    Apologize,
    Underpay,
}

impl NpcChoice {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Leave => "leave",
            Self::RequestLore => "request_lore",
            Self::UpgradeWeapon => "upgrade_weapon",
            Self::Riddle { .. } => "request_riddle",
            Self::Insult => "insult",
            Self::Apologize => "apologize",
            Self::Underpay => "underpay",
        }
    }

    fn interactions(&self) -> Vec<NpcInteraction> {
        let mut log = vec![NpcInteraction::Choice(self.tag().to_string())];
        log.push(match self {
            Self::Leave => NpcInteraction::Count(IGNORED.to_string()),
            Self::RequestLore => NpcInteraction::Count(LORE_UNLOCKED.to_string()),
            Self::UpgradeWeapon => NpcInteraction::Count(UPGRADES.to_string()),
            Self::Riddle { solved: true } => NpcInteraction::Count(RIDDLES_ANSWERED.to_string()),
            Self::Riddle { solved: false } => NpcInteraction::Count(RIDDLES_FAILED.to_string()),
            Self::Insult => NpcInteraction::Insulted,
            Self::Apologize => NpcInteraction::Forgiven,
            Self::Underpay => NpcInteraction::Count(UNDERPAID.to_string()),
        });
        log
    }
}

/// The mood an NPC settles into given what it remembers of the player.
/// Betrayed NPCs are hostile for good; the rest follow their own grudges.
pub fn derive_mood(npc: &str, record: &NpcRecord, deaths: u64, betrayed: bool) -> NpcMood {
    if betrayed {
        return NpcMood::Hostile;
    }
    match npc {
        "The Lorekeeper" => {
            if record.unforgiven() > 3 {
                NpcMood::Mocking
            } else if record.count(LORE_UNLOCKED) > 2 || record.visits > 5 {
                NpcMood::Respectful
            } else {
                NpcMood::Neutral
            }
        }
        "Blacktongue" => {
            let upgrades = record.count(UPGRADES);
            if upgrades > 10 {
                NpcMood::Mocking
            } else if upgrades > 3 {
                NpcMood::Respectful
            } else if record.visits == 0 {
                // Strangers get the back of his hand.
                NpcMood::Hostile
            } else {
                NpcMood::Neutral
            }
        }
        "Ash Sister" => {
            let (answered, failed) = (record.count(RIDDLES_ANSWERED), record.count(RIDDLES_FAILED));
            if record.insulted {
                NpcMood::Hostile
            } else if failed > answered {
                NpcMood::Mocking
            } else if answered > 2 {
                NpcMood::Respectful
            } else {
                NpcMood::Neutral
            }
        }
        FACELESS_MERCHANT => {
            if record.count(UNDERPAID) > 2 || record.unforgiven() > 4 {
                NpcMood::Hostile
            } else if record.visits > 3 {
                NpcMood::Respectful
            } else {
                NpcMood::Neutral
            }
        }
        "The Hollowed" => {
            if deaths > 5 {
                NpcMood::Mocking
            } else if deaths > 2 {
                NpcMood::Respectful
            } else {
                NpcMood::Neutral
            }
        }
        _ => NpcMood::Neutral,
    }
}

/// A permanent betrayal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Betrayal {
    pub npc: String,
    pub kind: String,
    /// `times_restarted` at the moment of the betrayal.
    pub run: u64,
}

/// The persisted memory document. Missing keys take their defaults on
/// load; unknown keys are carried in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryDocument {
    pub class_selected: Option<ClassId>,
    pub class_history: Vec<ClassId>,
    pub dodge_left_count: u64,
    pub dodge_right_count: u64,
    pub weapon_usage_histogram: BTreeMap<String, u64>,
    pub passive_fights: u64,
    pub aggressive_fights: u64,
    pub total_fights: u64,
    pub repeat_action_count: u64,
    pub item_usage_this_run: u64,
    pub deaths_per_boss: BTreeMap<String, u64>,
    pub boss_defeat_order: Vec<String>,
    pub times_restarted: u64,
    pub floors_cleared: u64,
    pub betrayals: Vec<Betrayal>,
    pub npc_interaction_log: BTreeMap<String, NpcRecord>,
    /// Every skill ever rolled, in order. Append-only.
    pub skills_unlocked: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self {
            class_selected: None,
            class_history: Vec::new(),
            dodge_left_count: 0,
            dodge_right_count: 0,
            weapon_usage_histogram: BTreeMap::new(),
            passive_fights: 0,
            aggressive_fights: 0,
            total_fights: 0,
            repeat_action_count: 0,
            item_usage_this_run: 0,
            deaths_per_boss: BTreeMap::new(),
            boss_defeat_order: Vec::new(),
            times_restarted: 0,
            floors_cleared: 0,
            betrayals: Vec::new(),
            npc_interaction_log: DEFAULT_NPCS
                .iter()
                .map(|name| (name.to_string(), NpcRecord::default()))
                .collect(),
            skills_unlocked: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DodgePreference {
    Left,
    Right,
    Balanced,
}

impl DodgePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Balanced => "balanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorType {
    Passive,
    Aggressive,
    Balanced,
}

impl BehaviorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passive => "passive",
            Self::Aggressive => "aggressive",
            Self::Balanced => "balanced",
        }
    }
}

/// Read-only digest of memory consumed by the feature vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptationSnapshot {
    pub dodge_preference: DodgePreference,
    pub behavior_type: BehaviorType,
    pub most_used_weapon: Option<String>,
    pub item_usage: u64,
    pub deaths: u64,
    pub boss_deaths: BTreeMap<String, u64>,
    pub repeat_actions: u64,
    pub passive_ratio: f32,
    pub aggressive_ratio: f32,
    /// (left - right) / (left + right), 0 when no dodges are recorded.
    pub dodge_skew: f32,
    pub betrayals: usize,
}

impl Default for AdaptationSnapshot {
    fn default() -> Self {
        BehaviorMemory::in_memory().adaptation_snapshot()
    }
}

/// Durable cross-run behavior store.
#[derive(Debug, Clone)]
pub struct BehaviorMemory {
    path: Option<PathBuf>,
    doc: MemoryDocument,
}

impl BehaviorMemory {
    /// Open the memory document at `path`.
    ///
    /// A missing document is created with defaults. An unreadable or corrupt
    /// one is moved aside to `<path>.corrupt` and replaced by defaults. This
    /// never fails: losing memory is recoverable, crashing the game is not.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (doc, needs_write) = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<MemoryDocument>(&contents) {
                Ok(doc) => (doc, false),
                Err(e) => {
                    warn!(
                        "memory document {} is corrupt ({}); reinitializing with defaults",
                        path.display(),
                        e
                    );
                    persist::quarantine(&path);
                    (MemoryDocument::default(), true)
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no memory document at {}; creating one", path.display());
                (MemoryDocument::default(), true)
            }
            Err(e) => {
                warn!(
                    "memory document {} is unreadable ({}); reinitializing with defaults",
                    path.display(),
                    e
                );
                (MemoryDocument::default(), true)
            }
        };

        let memory = Self {
            path: Some(path),
            doc,
        };
        if needs_write {
            memory.persist();
        }
        memory
    }

    /// Read the document at `path` as is. Unlike `open`, nothing is
    /// created, repaired or moved aside; a missing or corrupt document is
    /// an error.
    pub fn inspect(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)?;
        let doc = serde_json::from_str(&contents)?;
        Ok(Self {
            path: Some(path),
            doc,
        })
    }

    /// A memory with no backing file. Every write reports `Volatile`.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            doc: MemoryDocument::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn document(&self) -> &MemoryDocument {
        &self.doc
    }

    // ------------------------------------------------------------------
    // Generic key/value access
    // ------------------------------------------------------------------

    /// Read any top-level key, typed or unknown, as JSON.
    pub fn get(&self, key: &str) -> Option<Value> {
        match serde_json::to_value(&self.doc) {
            Ok(Value::Object(mut map)) => map.remove(key),
            _ => None,
        }
    }

    /// Write a top-level key. Values for typed keys must match their type;
    /// monotonic counters reject smaller values.
    pub fn set(&mut self, key: &str, value: Value) -> Result<WriteOutcome, MemoryError> {
        let mut map = match serde_json::to_value(&self.doc)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        if MONOTONIC_KEYS.contains(&key) {
            let current = map.get(key).and_then(Value::as_u64).unwrap_or(0);
            let requested = value
                .as_u64()
                .ok_or_else(|| MemoryError::NotACounter(key.to_string()))?;
            if requested < current {
                return Err(MemoryError::CounterRegression {
                    key: key.to_string(),
                    current,
                    requested,
                });
            }
        }

        map.insert(key.to_string(), value);
        self.doc = serde_json::from_value(Value::Object(map))?;
        Ok(self.persist())
    }

    /// Add `amount` to a numeric key, creating it at zero if absent.
    pub fn increment(&mut self, key: &str, amount: u64) -> Result<WriteOutcome, MemoryError> {
        let current = match self.get(key) {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| MemoryError::NotACounter(key.to_string()))?,
        };
        self.set(key, Value::from(current.saturating_add(amount)))
    }

    // ------------------------------------------------------------------
    // Deaths, bosses, betrayals
    // ------------------------------------------------------------------

    /// Record one death. `times_restarted` grows by exactly one.
    pub fn record_death(&mut self, boss_id: Option<&str>, floor: u8) -> WriteOutcome {
        self.doc.times_restarted += 1;
        if let Some(boss) = boss_id {
            *self.doc.deaths_per_boss.entry(boss.to_string()).or_insert(0) += 1;
        }
        self.doc.floors_cleared = self.doc.floors_cleared.max(u64::from(floor));
        info!(
            "death #{} recorded (boss: {}, floor {})",
            self.doc.times_restarted,
            boss_id.unwrap_or("-"),
            floor
        );
        self.persist()
    }

    pub fn record_boss_defeat(&mut self, boss_id: &str) -> WriteOutcome {
        if !self.doc.boss_defeat_order.iter().any(|b| b == boss_id) {
            self.doc.boss_defeat_order.push(boss_id.to_string());
        }
        debug!("boss defeat recorded: {}", boss_id);
        self.persist()
    }

    /// Raise the deepest-floor mark.
    pub fn record_floor_reached(&mut self, floor: u8) -> WriteOutcome {
        self.doc.floors_cleared = self.doc.floors_cleared.max(u64::from(floor));
        self.persist()
    }

    /// Betrayals are append-only and outlive every future run.
    pub fn add_betrayal(&mut self, npc: &str, kind: &str) -> WriteOutcome {
        self.doc.betrayals.push(Betrayal {
            npc: npc.to_string(),
            kind: kind.to_string(),
            run: self.doc.times_restarted,
        });
        info!("betrayal of {} ({}) recorded", npc, kind);
        self.persist()
    }

    pub fn is_betrayed(&self, npc: &str) -> bool {
        self.doc.betrayals.iter().any(|b| b.npc == npc)
    }

    pub fn betrayals(&self) -> &[Betrayal] {
        &self.doc.betrayals
    }

    // ------------------------------------------------------------------
    // Behavior tracking
    // ------------------------------------------------------------------

    /// Record a combat action; dodges feed the direction counters and a
    /// weapon, when given, feeds the usage histogram.
    pub fn track_combat_action(
        &mut self,
        action: PlayerAction,
        weapon: Option<&str>,
    ) -> WriteOutcome {
        match action {
            PlayerAction::Dodge(Side::Left) => self.doc.dodge_left_count += 1,
            PlayerAction::Dodge(Side::Right) => self.doc.dodge_right_count += 1,
            _ => {}
        }
        if let Some(weapon) = weapon {
            *self
                .doc
                .weapon_usage_histogram
                .entry(weapon.to_string())
                .or_insert(0) += 1;
        }
        self.persist()
    }

    /// Classify a finished fight by its opening move.
    pub fn track_behavior_pattern(&mut self, first_action: ActionKind) -> WriteOutcome {
        self.doc.total_fights += 1;
        match first_action {
            ActionKind::Dodge | ActionKind::Heal => self.doc.passive_fights += 1,
            ActionKind::Attack | ActionKind::Special => self.doc.aggressive_fights += 1,
            ActionKind::Flee | ActionKind::Stunned => {}
        }
        self.persist()
    }

    /// Count a repeat when the last three actions are identical. Returns
    /// `None` when nothing changed.
    pub fn track_repeat_actions(&mut self, history: &[ActionKind]) -> Option<WriteOutcome> {
        let n = history.len();
        if n < 3 {
            return None;
        }
        let tail = &history[n - 3..];
        if tail.iter().all(|a| *a == tail[0]) {
            self.doc.repeat_action_count += 1;
            Some(self.persist())
        } else {
            None
        }
    }

    pub fn record_item_use(&mut self) -> WriteOutcome {
        self.doc.item_usage_this_run += 1;
        self.persist()
    }

    pub fn record_class_selection(&mut self, class: ClassId) -> WriteOutcome {
        self.doc.class_selected = Some(class);
        self.doc.class_history.push(class);
        self.persist()
    }

    /// Fold one interaction into the NPC's log. The mood is re-derived
    /// afterwards unless the interaction sets it; a visit is judged on the
    /// history before it.
    pub fn update_npc_interaction(&mut self, npc: &str, interaction: NpcInteraction) -> WriteOutcome {
        self.fold_npc(npc, [interaction]);
        self.persist()
    }

    /// Record a dialogue choice with everything it implies for the NPC.
    pub fn record_npc_choice(&mut self, npc: &str, choice: NpcChoice) -> WriteOutcome {
        self.fold_npc(npc, choice.interactions());
        self.persist()
    }

    fn fold_npc(&mut self, npc: &str, interactions: impl IntoIterator<Item = NpcInteraction>) {
        let deaths = self.doc.times_restarted;
        let betrayed = self.is_betrayed(npc);
        let record = self
            .doc
            .npc_interaction_log
            .entry(npc.to_string())
            .or_default();
        for interaction in interactions {
            match interaction {
                NpcInteraction::Visit => {
                    record.mood = derive_mood(npc, record, deaths, betrayed);
                    record.visits += 1;
                    continue;
                }
                NpcInteraction::Mood(mood) => {
                    record.mood = mood;
                    continue;
                }
                NpcInteraction::Choice(choice) => record.choices.push(choice),
                NpcInteraction::Count(counter) => *record.counters.entry(counter).or_insert(0) += 1,
                NpcInteraction::Insulted => record.insulted = true,
                NpcInteraction::Forgiven => {
                    let ignored = record.count(IGNORED);
                    record.counters.insert(FORGIVEN.to_string(), ignored);
                }
            }
            record.mood = derive_mood(npc, record, deaths, betrayed);
        }
        if npc == FACELESS_MERCHANT && !record.departed && record.unforgiven() > MERCHANT_PATIENCE {
            info!("{} has had enough and leaves", npc);
            record.departed = true;
        }
    }

    pub fn npc(&self, npc: &str) -> Option<&NpcRecord> {
        self.doc.npc_interaction_log.get(npc)
    }

    /// Betrayed and departed NPCs are gone for every later run too.
    pub fn is_available(&self, npc: &str) -> bool {
        !self.is_betrayed(npc) && !self.npc(npc).map_or(false, |r| r.departed)
    }

    pub fn record_skill_unlocked(&mut self, name: &str) -> WriteOutcome {
        self.doc.skills_unlocked.push(name.to_string());
        self.persist()
    }

    /// Clear run-scoped counters. Everything else is kept on purpose.
    pub fn reset_run_data(&mut self) -> WriteOutcome {
        self.doc.item_usage_this_run = 0;
        self.persist()
    }

    // ------------------------------------------------------------------
    // Derived reads
    // ------------------------------------------------------------------

    pub fn deaths(&self) -> u64 {
        self.doc.times_restarted
    }

    /// Strict majority of the two dodge counters; ties are balanced.
    pub fn dodge_preference(&self) -> DodgePreference {
        let (left, right) = (self.doc.dodge_left_count, self.doc.dodge_right_count);
        if left > right {
            DodgePreference::Left
        } else if right > left {
            DodgePreference::Right
        } else {
            DodgePreference::Balanced
        }
    }

    pub fn behavior_type(&self) -> BehaviorType {
        let (passive, aggressive) = self.behavior_ratios();
        if self.doc.total_fights == 0 {
            BehaviorType::Balanced
        } else if passive > BEHAVIOR_THRESHOLD {
            BehaviorType::Passive
        } else if aggressive > BEHAVIOR_THRESHOLD {
            BehaviorType::Aggressive
        } else {
            BehaviorType::Balanced
        }
    }

    /// Argmax of the weapon histogram; ties go to the alphabetically first.
    pub fn most_used_weapon(&self) -> Option<&str> {
        let mut best: Option<(&str, u64)> = None;
        for (weapon, count) in &self.doc.weapon_usage_histogram {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((weapon.as_str(), *count));
            }
        }
        best.map(|(w, _)| w)
    }

    fn behavior_ratios(&self) -> (f32, f32) {
        if self.doc.total_fights == 0 {
            return (0.0, 0.0);
        }
        let total = self.doc.total_fights as f32;
        (
            self.doc.passive_fights as f32 / total,
            self.doc.aggressive_fights as f32 / total,
        )
    }

    pub fn adaptation_snapshot(&self) -> AdaptationSnapshot {
        let (passive_ratio, aggressive_ratio) = self.behavior_ratios();
        let (left, right) = (self.doc.dodge_left_count, self.doc.dodge_right_count);
        let dodge_skew = if left + right == 0 {
            0.0
        } else {
            (left as f32 - right as f32) / (left + right) as f32
        };
        AdaptationSnapshot {
            dodge_preference: self.dodge_preference(),
            behavior_type: self.behavior_type(),
            most_used_weapon: self.most_used_weapon().map(str::to_string),
            item_usage: self.doc.item_usage_this_run,
            deaths: self.doc.times_restarted,
            boss_deaths: self.doc.deaths_per_boss.clone(),
            repeat_actions: self.doc.repeat_action_count,
            passive_ratio,
            aggressive_ratio,
            dodge_skew,
            betrayals: self.doc.betrayals.len(),
        }
    }

    fn persist(&self) -> WriteOutcome {
        let Some(path) = &self.path else {
            return WriteOutcome::Volatile;
        };
        match serde_json::to_string_pretty(&self.doc) {
            Ok(contents) => persist::write_with_retry(path, &contents),
            Err(e) => {
                warn!("could not serialize memory document: {}", e);
                WriteOutcome::Degraded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_in(dir: &tempfile::TempDir) -> BehaviorMemory {
        BehaviorMemory::open(dir.path().join("memory/entity.json"))
    }

    #[test]
    fn dodge_preference_majority() {
        let mut memory = BehaviorMemory::in_memory();
        for _ in 0..7 {
            memory.track_combat_action(PlayerAction::Dodge(Side::Left), None);
        }
        for _ in 0..2 {
            memory.track_combat_action(PlayerAction::Dodge(Side::Right), None);
        }
        assert_eq!(memory.dodge_preference(), DodgePreference::Left);
        assert_eq!(memory.dodge_preference().as_str(), "left");
    }

    #[test]
    fn dodge_preference_tie_is_balanced() {
        let mut memory = BehaviorMemory::in_memory();
        assert_eq!(memory.dodge_preference(), DodgePreference::Balanced);
        memory.track_combat_action(PlayerAction::Dodge(Side::Left), None);
        memory.track_combat_action(PlayerAction::Dodge(Side::Right), None);
        assert_eq!(memory.dodge_preference(), DodgePreference::Balanced);
    }

    #[test]
    fn behavior_type_thresholds() {
        let mut memory = BehaviorMemory::in_memory();
        assert_eq!(memory.behavior_type(), BehaviorType::Balanced);

        for _ in 0..7 {
            memory.track_behavior_pattern(ActionKind::Dodge);
        }
        for _ in 0..3 {
            memory.track_behavior_pattern(ActionKind::Attack);
        }
        assert_eq!(memory.behavior_type(), BehaviorType::Passive);

        // 7 passive of 16 total, 9 aggressive: neither exceeds 0.6
        for _ in 0..6 {
            memory.track_behavior_pattern(ActionKind::Attack);
        }
        assert_eq!(memory.behavior_type(), BehaviorType::Balanced);

        for _ in 0..20 {
            memory.track_behavior_pattern(ActionKind::Special);
        }
        assert_eq!(memory.behavior_type(), BehaviorType::Aggressive);
    }

    #[test]
    fn deaths_are_counted_once_each() {
        let mut memory = BehaviorMemory::in_memory();
        memory.record_death(Some("Ash-Soaked Knight"), 1);
        memory.record_death(None, 2);
        memory.record_death(Some("Ash-Soaked Knight"), 1);
        memory.record_death(Some("The Watcher in Code"), 2);
        assert_eq!(memory.deaths(), 4);
        assert_eq!(memory.document().deaths_per_boss["Ash-Soaked Knight"], 2);
        assert_eq!(memory.document().deaths_per_boss["The Watcher in Code"], 1);
        assert_eq!(memory.document().floors_cleared, 2);
    }

    #[test]
    fn betrayal_is_permanent_and_tagged_with_run() {
        let mut memory = BehaviorMemory::in_memory();
        memory.record_death(None, 1);
        memory.add_betrayal("Ash Sister", "direct_challenge");
        memory.reset_run_data();
        memory.record_death(None, 1);
        assert!(memory.is_betrayed("Ash Sister"));
        assert!(!memory.is_betrayed("Blacktongue"));
        assert_eq!(memory.betrayals()[0].run, 1);
    }

    #[test]
    fn most_used_weapon_is_argmax() {
        let mut memory = BehaviorMemory::in_memory();
        assert_eq!(memory.most_used_weapon(), None);
        memory.track_combat_action(PlayerAction::Attack, Some("Twinblades"));
        memory.track_combat_action(PlayerAction::Attack, Some("Greatblade"));
        memory.track_combat_action(PlayerAction::Attack, Some("Greatblade"));
        assert_eq!(memory.most_used_weapon(), Some("Greatblade"));
    }

    #[test]
    fn set_rejects_counter_regression() {
        let mut memory = BehaviorMemory::in_memory();
        memory.increment("times_restarted", 3).unwrap();
        let err = memory.set("times_restarted", json!(1)).unwrap_err();
        assert!(matches!(err, MemoryError::CounterRegression { current: 3, .. }));
        assert_eq!(memory.deaths(), 3);
    }

    #[test]
    fn set_rejects_type_mismatch_on_typed_key() {
        let mut memory = BehaviorMemory::in_memory();
        assert!(memory.set("betrayals", json!("oops")).is_err());
        assert!(memory.betrayals().is_empty());
    }

    #[test]
    fn unknown_keys_live_in_extra() {
        let mut memory = BehaviorMemory::in_memory();
        memory.set("lore_unlocked", json!(["first"])).unwrap();
        memory.increment("secret_doors", 2).unwrap();
        memory.increment("secret_doors", 1).unwrap();
        assert_eq!(memory.get("lore_unlocked"), Some(json!(["first"])));
        assert_eq!(memory.get("secret_doors"), Some(json!(3)));
        assert!(memory.document().extra.contains_key("secret_doors"));
    }

    #[test]
    fn increment_refuses_non_counters() {
        let mut memory = BehaviorMemory::in_memory();
        let err = memory.increment("weapon_usage_histogram", 1).unwrap_err();
        assert!(matches!(err, MemoryError::NotACounter(_)));
    }

    #[test]
    fn missing_document_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory_in(&dir);
        assert!(memory.path().unwrap().exists());
        assert_eq!(memory.deaths(), 0);
        assert_eq!(memory.document().npc_interaction_log.len(), DEFAULT_NPCS.len());
    }

    #[test]
    fn mutations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut memory = memory_in(&dir);
            assert!(memory.record_death(Some("X"), 3).is_durable());
            memory.add_betrayal("Faceless Merchant", "theft");
        }
        let memory = memory_in(&dir);
        assert_eq!(memory.deaths(), 1);
        assert_eq!(memory.document().deaths_per_boss["X"], 1);
        assert!(memory.is_betrayed("Faceless Merchant"));
    }

    #[test]
    fn corrupt_document_resets_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entity.json");
        std::fs::write(&path, "{ this is not json").unwrap();
        let memory = BehaviorMemory::open(&path);
        assert_eq!(memory.deaths(), 0);
        assert!(dir.path().join("entity.json.corrupt").exists());
        let reread: MemoryDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reread.times_restarted, 0);
    }

    #[test]
    fn inspect_reports_instead_of_repairing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        match BehaviorMemory::inspect(&missing) {
            Err(MemoryError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected an io error, got {:?}", other.map(|m| m.deaths())),
        }
        assert!(!missing.exists());

        let path = dir.path().join("entity.json");
        std::fs::write(&path, "{ this is not json").unwrap();
        assert!(matches!(
            BehaviorMemory::inspect(&path),
            Err(MemoryError::Json(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ this is not json");
        assert!(!dir.path().join("entity.json.corrupt").exists());

        std::fs::write(&path, r#"{ "times_restarted": 2 }"#).unwrap();
        assert_eq!(BehaviorMemory::inspect(&path).unwrap().deaths(), 2);
    }

    #[test]
    fn forward_compatible_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entity.json");
        std::fs::write(
            &path,
            r#"{ "times_restarted": 4, "future_feature": { "level": 2 } }"#,
        )
        .unwrap();

        let mut memory = BehaviorMemory::open(&path);
        assert_eq!(memory.deaths(), 4);
        assert_eq!(memory.document().dodge_left_count, 0);
        memory.record_death(None, 1);

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["future_feature"]["level"], json!(2));
        assert_eq!(raw["times_restarted"], json!(5));
    }

    #[test]
    fn write_failure_degrades_without_losing_state() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let mut memory = BehaviorMemory::open(blocker.join("entity.json"));
        assert_eq!(memory.record_death(None, 1), WriteOutcome::Degraded);
        assert_eq!(memory.deaths(), 1);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let mut memory = BehaviorMemory::in_memory();
        memory.track_combat_action(PlayerAction::Dodge(Side::Right), Some("Twinblades"));
        memory.record_death(Some("B"), 2);
        assert_eq!(memory.adaptation_snapshot(), memory.adaptation_snapshot());
    }

    #[test]
    fn reset_run_data_only_touches_run_counters() {
        let mut memory = BehaviorMemory::in_memory();
        memory.record_item_use();
        memory.record_item_use();
        memory.track_combat_action(PlayerAction::Dodge(Side::Left), None);
        memory.record_death(None, 1);
        memory.reset_run_data();
        let doc = memory.document();
        assert_eq!(doc.item_usage_this_run, 0);
        assert_eq!(doc.dodge_left_count, 1);
        assert_eq!(doc.times_restarted, 1);
    }

    #[test]
    fn repeat_actions_need_three_identical() {
        let mut memory = BehaviorMemory::in_memory();
        assert!(memory
            .track_repeat_actions(&[ActionKind::Attack, ActionKind::Attack])
            .is_none());
        assert!(memory
            .track_repeat_actions(&[ActionKind::Dodge, ActionKind::Attack, ActionKind::Attack])
            .is_none());
        assert!(memory
            .track_repeat_actions(&[ActionKind::Attack, ActionKind::Attack, ActionKind::Attack])
            .is_some());
        assert_eq!(memory.document().repeat_action_count, 1);
    }

    #[test]
    fn npc_log_tracks_interactions() {
        let mut memory = BehaviorMemory::in_memory();
        memory.update_npc_interaction("Ash Sister", NpcInteraction::Visit);
        memory.update_npc_interaction("Ash Sister", NpcInteraction::Count("riddles_answered".into()));
        memory.update_npc_interaction("Ash Sister", NpcInteraction::Mood(NpcMood::Respectful));
        memory.update_npc_interaction("Stranger", NpcInteraction::Choice("leave".into()));
        let sister = memory.npc("Ash Sister").unwrap();
        assert_eq!(sister.visits, 1);
        assert_eq!(sister.counters["riddles_answered"], 1);
        assert_eq!(sister.mood, NpcMood::Respectful);
        assert_eq!(memory.npc("Stranger").unwrap().choices, vec!["leave".to_string()]);
    }

    #[test]
    fn moods_follow_each_npc_grudges() {
        let mut memory = BehaviorMemory::in_memory();
        for _ in 0..3 {
            memory.record_npc_choice("The Lorekeeper", NpcChoice::RequestLore);
        }
        assert_eq!(memory.npc("The Lorekeeper").unwrap().mood, NpcMood::Respectful);

        memory.record_npc_choice("Ash Sister", NpcChoice::Riddle { solved: false });
        assert_eq!(memory.npc("Ash Sister").unwrap().mood, NpcMood::Mocking);
        memory.record_npc_choice("Ash Sister", NpcChoice::Riddle { solved: true });
        assert_eq!(memory.npc("Ash Sister").unwrap().mood, NpcMood::Neutral);
        memory.record_npc_choice("Ash Sister", NpcChoice::Insult);
        assert_eq!(memory.npc("Ash Sister").unwrap().mood, NpcMood::Hostile);

        for _ in 0..4 {
            memory.record_npc_choice("Blacktongue", NpcChoice::UpgradeWeapon);
        }
        assert_eq!(memory.npc("Blacktongue").unwrap().mood, NpcMood::Respectful);

        assert_eq!(memory.npc("Still Flame Warden").unwrap().mood, NpcMood::Neutral);
    }

    #[test]
    fn first_visit_to_blacktongue_is_cold() {
        let mut memory = BehaviorMemory::in_memory();
        memory.update_npc_interaction("Blacktongue", NpcInteraction::Visit);
        assert_eq!(memory.npc("Blacktongue").unwrap().mood, NpcMood::Hostile);
        memory.update_npc_interaction("Blacktongue", NpcInteraction::Visit);
        assert_eq!(memory.npc("Blacktongue").unwrap().mood, NpcMood::Neutral);
    }

    #[test]
    fn the_hollowed_reads_the_death_count() {
        let mut memory = BehaviorMemory::in_memory();
        for _ in 0..3 {
            memory.record_death(None, 1);
        }
        memory.update_npc_interaction("The Hollowed", NpcInteraction::Visit);
        assert_eq!(memory.npc("The Hollowed").unwrap().mood, NpcMood::Respectful);
        for _ in 0..3 {
            memory.record_death(None, 1);
        }
        memory.update_npc_interaction("The Hollowed", NpcInteraction::Visit);
        assert_eq!(memory.npc("The Hollowed").unwrap().mood, NpcMood::Mocking);
    }

    #[test]
    fn snubbed_merchant_leaves_for_good() {
        let mut memory = BehaviorMemory::in_memory();
        for _ in 0..5 {
            memory.record_npc_choice(FACELESS_MERCHANT, NpcChoice::Leave);
        }
        let merchant = memory.npc(FACELESS_MERCHANT).unwrap();
        assert_eq!(merchant.mood, NpcMood::Hostile);
        assert!(!merchant.departed);

        // An apology clears the slate.
        memory.record_npc_choice(FACELESS_MERCHANT, NpcChoice::Apologize);
        assert_eq!(memory.npc(FACELESS_MERCHANT).unwrap().mood, NpcMood::Neutral);
        for _ in 0..5 {
            memory.record_npc_choice(FACELESS_MERCHANT, NpcChoice::Leave);
        }
        assert!(memory.is_available(FACELESS_MERCHANT));
        memory.record_npc_choice(FACELESS_MERCHANT, NpcChoice::Leave);
        assert!(memory.npc(FACELESS_MERCHANT).unwrap().departed);
        assert!(!memory.is_available(FACELESS_MERCHANT));
        // Only the merchant walks out.
        for _ in 0..10 {
            memory.record_npc_choice("The Lorekeeper", NpcChoice::Leave);
        }
        assert!(memory.is_available("The Lorekeeper"));
        assert_eq!(memory.npc("The Lorekeeper").unwrap().mood, NpcMood::Mocking);
    }

    #[test]
    fn betrayal_outranks_every_grudge() {
        let mut memory = BehaviorMemory::in_memory();
        memory.add_betrayal("The Lorekeeper", "theft");
        for _ in 0..3 {
            memory.record_npc_choice("The Lorekeeper", NpcChoice::RequestLore);
        }
        assert_eq!(memory.npc("The Lorekeeper").unwrap().mood, NpcMood::Hostile);
        assert!(!memory.is_available("The Lorekeeper"));
    }

    #[test]
    fn unlocked_skills_accumulate() {
        let mut memory = BehaviorMemory::in_memory();
        memory.record_skill_unlocked("Iron Will");
        memory.record_skill_unlocked("Iron Will");
        assert_eq!(memory.document().skills_unlocked.len(), 2);
    }
}
