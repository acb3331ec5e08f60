/// Per-attempt player state. Created at class selection, reset on death.
///
/// Every mutator clamps at the boundary: health and stamina never exceed
/// their maxima, sanity stays in [0, 100], the floor in [1, 5].
use log::debug;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use super::features::{self, FeatureVector, FEATURE_LEN, MAX_FLOOR};
use super::memory::AdaptationSnapshot;
use crate::schema::action::ActionKind;
use crate::schema::class::{ClassId, InventoryItem, ItemEffect, Passive, Weapon};
use crate::schema::skill::{Skill, SkillSlot, BATTLE_RHYTHM};
use crate::schema::stats::{StatKind, Stats};

pub const MAX_SANITY: u32 = 100;
pub const ALLY_TRUST: i32 = 3;
pub const ENEMY_TRUST: i32 = -3;
pub const DEFAULT_HISTORY_LEN: usize = 10;

/// Fixed-size ring buffer of the most recent action kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionHistory {
    capacity: usize,
    actions: VecDeque<ActionKind>,
}

impl ActionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            actions: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, action: ActionKind) {
        if self.actions.len() == self.capacity {
            self.actions.pop_front();
        }
        self.actions.push_back(action);
    }

    pub fn last(&self) -> Option<ActionKind> {
        self.actions.back().copied()
    }

    /// The most recent `n` actions, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ActionKind> {
        let skip = self.actions.len().saturating_sub(n);
        self.actions.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// How predictable the recent history is, in [0, 1].
    ///
    /// Half comes from low Shannon entropy of the action distribution
    /// (normalized by log2 of the number of kinds), half from the share
    /// of consecutive pairs that repeat. Empty or single-action histories
    /// read as 0.5.
    pub fn predictability(&self) -> f32 {
        let n = self.actions.len();
        if n < 2 {
            return 0.5;
        }

        let mut counts = [0usize; ActionKind::ALL.len()];
        for action in &self.actions {
            counts[action.index()] += 1;
        }
        let entropy: f32 = counts
            .iter()
            .filter(|c| **c > 0)
            .map(|c| {
                let p = *c as f32 / n as f32;
                -p * p.log2()
            })
            .sum();
        let max_entropy = (ActionKind::ALL.len() as f32).log2();
        let order = 1.0 - entropy / max_entropy;

        let repeats = self
            .actions
            .iter()
            .zip(self.actions.iter().skip(1))
            .filter(|(a, b)| a == b)
            .count();
        let repetition = repeats as f32 / (n - 1) as f32;

        (0.5 * order + 0.5 * repetition).clamp(0.0, 1.0)
    }
}

/// A lingering corruption field laid by a trap: actions may misfire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorruptionField {
    pub failure_chance: f32,
    pub turns: u32,
}

/// Item effects still waiting to play out in combat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wards {
    pub regen_per_turn: u32,
    pub regen_turns: u8,
    pub blind_turns: u8,
    pub weaken_turns: u8,
    pub mirror: bool,
}

/// One spent item charge and what it did.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUse {
    pub item: InventoryItem,
    pub effect: ItemEffect,
    /// Health restored on the spot.
    pub healed: u32,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RunState {
    class: ClassId,
    passive: Passive,
    stats: Stats,
    weapon: Weapon,
    inventory: Vec<InventoryItem>,
    health: u32,
    max_health: u32,
    stamina: u32,
    max_stamina: u32,
    sanity: u32,
    ashlight: u32,
    floor: u8,
    history: ActionHistory,
    trust: FxHashMap<String, i32>,
    flee_count: u32,
    heals_this_floor: u32,
    low_tier_kills: u32,
    kills: u32,
    corruption: Option<CorruptionField>,
    wards: Wards,
    skills: [Option<Skill>; 3],
}

impl RunState {
    pub fn new(class: ClassId, history_len: usize) -> Self {
        let profile = class.profile();
        let max_health = profile.max_health();
        let max_stamina = profile.max_stamina();
        Self {
            class,
            passive: profile.passive,
            stats: profile.stats,
            weapon: profile.weapon,
            inventory: vec![profile.starting_item],
            health: max_health,
            max_health,
            stamina: max_stamina,
            max_stamina,
            sanity: MAX_SANITY,
            ashlight: 0,
            floor: 1,
            history: ActionHistory::new(history_len),
            trust: FxHashMap::default(),
            flee_count: 0,
            heals_this_floor: 0,
            low_tier_kills: 0,
            kills: 0,
            corruption: None,
            wards: Wards::default(),
            skills: [None; 3],
        }
    }

    // -- accessors ------------------------------------------------------

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn passive(&self) -> Passive {
        self.passive
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stat(&self, kind: StatKind) -> u32 {
        self.stats.get(kind)
    }

    pub fn weapon(&self) -> &Weapon {
        &self.weapon
    }

    pub fn inventory(&self) -> &[InventoryItem] {
        &self.inventory
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn max_health(&self) -> u32 {
        self.max_health
    }

    pub fn stamina(&self) -> u32 {
        self.stamina
    }

    pub fn max_stamina(&self) -> u32 {
        self.max_stamina
    }

    pub fn sanity(&self) -> u32 {
        self.sanity
    }

    pub fn ashlight(&self) -> u32 {
        self.ashlight
    }

    pub fn floor(&self) -> u8 {
        self.floor
    }

    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    pub fn predictability(&self) -> f32 {
        self.history.predictability()
    }

    pub fn flee_count(&self) -> u32 {
        self.flee_count
    }

    pub fn heals_this_floor(&self) -> u32 {
        self.heals_this_floor
    }

    pub fn low_tier_kills(&self) -> u32 {
        self.low_tier_kills
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn health_fraction(&self) -> f32 {
        self.health as f32 / self.max_health.max(1) as f32
    }

    // -- resources ------------------------------------------------------

    /// Apply damage and return the amount actually taken.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.health);
        self.health -= taken;
        taken
    }

    /// Restore health up to the maximum; returns the amount restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.max_health - self.health);
        self.health += restored;
        restored
    }

    /// Pay a stamina cost. Returns false and leaves stamina untouched when
    /// the pool cannot cover it.
    pub fn spend_stamina(&mut self, cost: u32) -> bool {
        if self.stamina < cost {
            return false;
        }
        self.stamina -= cost;
        true
    }

    /// Remove stamina down to zero regardless of the pool.
    pub fn drain_stamina(&mut self, amount: u32) {
        self.stamina = self.stamina.saturating_sub(amount);
    }

    pub fn restore_stamina(&mut self, amount: u32) {
        self.stamina = self.stamina.saturating_add(amount).min(self.max_stamina);
    }

    /// Between-fight regeneration: 5 + END / 3, plus 2 with Battle Rhythm
    /// equipped.
    pub fn regen_stamina(&mut self) {
        let rhythm = match self.skill(SkillSlot::Passive) {
            Some(skill) if skill.name == BATTLE_RHYTHM => 2,
            _ => 0,
        };
        self.restore_stamina(5 + self.stats.endurance / 3 + rhythm);
    }

    /// Rest at a hearth: health and stamina back to full.
    pub fn rest(&mut self) {
        self.health = self.max_health;
        self.stamina = self.max_stamina;
    }

    pub fn gain_ashlight(&mut self, amount: u32) {
        self.ashlight = self.ashlight.saturating_add(amount);
    }

    pub fn spend_ashlight(&mut self, cost: u32) -> bool {
        if self.ashlight < cost {
            return false;
        }
        self.ashlight -= cost;
        true
    }

    pub fn adjust_sanity(&mut self, delta: i32) {
        let next = self.sanity as i64 + delta as i64;
        self.sanity = next.clamp(0, MAX_SANITY as i64) as u32;
    }

    pub fn restore_sanity(&mut self) {
        self.sanity = MAX_SANITY;
    }

    /// Spend `stat × 2` ashlight to raise a stat by one. Returns false when
    /// the player cannot afford it.
    pub fn level_stat(&mut self, kind: StatKind) -> bool {
        let cost = self.stats.get(kind) * 2;
        if !self.spend_ashlight(cost) {
            return false;
        }
        self.stats.set(kind, self.stats.get(kind) + 1);
        self.update_derived();
        true
    }

    pub fn level_cost(&self, kind: StatKind) -> u32 {
        self.stats.get(kind) * 2
    }

    fn update_derived(&mut self) {
        self.max_health = 50 + self.stats.vitality * 5;
        self.max_stamina = 50 + self.stats.endurance * 3;
        self.health = self.health.min(self.max_health);
        self.stamina = self.stamina.min(self.max_stamina);
    }

    // -- inventory --------------------------------------------------------

    pub fn add_item(&mut self, item: InventoryItem) {
        self.inventory.push(item);
    }

    /// Consume one use of the named item and apply its effect. Spent items
    /// leave the inventory. Instant heals land now; everything else is
    /// banked as a ward for the next combat rounds.
    pub fn use_item(&mut self, name: &str) -> Option<ItemUse> {
        let index = self
            .inventory
            .iter()
            .position(|i| i.name == name && i.uses > 0)?;
        let item = &mut self.inventory[index];
        item.uses -= 1;
        let used = item.clone();
        if item.uses == 0 {
            self.inventory.remove(index);
        }

        let effect = used.use_effect();
        let mut healed = 0;
        match effect {
            ItemEffect::Heal(amount) => healed = self.heal(amount),
            ItemEffect::HealOverTime { amount, turns } => {
                self.wards.regen_per_turn = amount.div_ceil(turns as u32);
                self.wards.regen_turns = turns;
            }
            ItemEffect::Blind { turns } => {
                self.wards.blind_turns = self.wards.blind_turns.saturating_add(turns)
            }
            ItemEffect::Weaken { turns } => {
                self.wards.weaken_turns = self.wards.weaken_turns.saturating_add(turns)
            }
            ItemEffect::Mirror => self.wards.mirror = true,
            ItemEffect::Disappointment | ItemEffect::Inert => {}
        }
        debug!("used {}: {:?}", used.name, effect);
        Some(ItemUse {
            message: effect.describe(),
            item: used,
            effect,
            healed,
        })
    }

    pub fn wards(&self) -> &Wards {
        &self.wards
    }

    /// One turn of healing over time. Returns the health restored.
    pub fn tick_regeneration(&mut self) -> u32 {
        if self.wards.regen_turns == 0 {
            return 0;
        }
        self.wards.regen_turns -= 1;
        let per_turn = self.wards.regen_per_turn;
        if self.wards.regen_turns == 0 {
            self.wards.regen_per_turn = 0;
        }
        self.heal(per_turn)
    }

    /// Spend one blinded enemy turn, if any are banked.
    pub fn take_blind(&mut self) -> bool {
        take_turn(&mut self.wards.blind_turns)
    }

    /// Spend one weakened enemy turn, if any are banked.
    pub fn take_weaken(&mut self) -> bool {
        take_turn(&mut self.wards.weaken_turns)
    }

    pub fn take_mirror(&mut self) -> bool {
        std::mem::take(&mut self.wards.mirror)
    }

    // -- skills ---------------------------------------------------------

    /// Equip `skill` into `slot`, replacing whatever was there. Refused when
    /// the skill does not fit the slot.
    pub fn equip_skill(&mut self, skill: Skill, slot: SkillSlot) -> bool {
        if skill.slot != slot {
            return false;
        }
        if let Some(old) = self.skills[slot.index()].replace(skill) {
            debug!("{} replaces {} in the {} slot", skill.name, old.name, slot.as_str());
        }
        true
    }

    pub fn skill(&self, slot: SkillSlot) -> Option<Skill> {
        self.skills[slot.index()]
    }

    // -- history and counters ------------------------------------------

    pub fn record_action(&mut self, action: ActionKind) {
        self.history.push(action);
        if action == ActionKind::Heal {
            self.heals_this_floor += 1;
        }
    }

    pub fn record_flee(&mut self) {
        self.flee_count += 1;
    }

    pub fn record_kill(&mut self, low_tier: bool) {
        self.kills += 1;
        if low_tier {
            self.low_tier_kills += 1;
        }
    }

    // -- corruption -----------------------------------------------------

    pub fn set_corruption(&mut self, field: CorruptionField) {
        self.corruption = Some(field);
    }

    pub fn corruption(&self) -> Option<CorruptionField> {
        self.corruption
    }

    /// Failure chance for this turn, ticking the field down by one turn.
    pub fn tick_corruption(&mut self) -> Option<f32> {
        let field = self.corruption.as_mut()?;
        let chance = field.failure_chance;
        field.turns = field.turns.saturating_sub(1);
        if field.turns == 0 {
            self.corruption = None;
        }
        Some(chance)
    }

    // -- relations ------------------------------------------------------

    pub fn adjust_trust(&mut self, npc: &str, delta: i32) -> i32 {
        let trust = self.trust.entry(npc.to_string()).or_insert(0);
        *trust = trust.saturating_add(delta);
        *trust
    }

    pub fn set_trust(&mut self, npc: &str, value: i32) {
        self.trust.insert(npc.to_string(), value);
    }

    pub fn trust(&self, npc: &str) -> i32 {
        self.trust.get(npc).copied().unwrap_or(0)
    }

    pub fn is_ally(&self, npc: &str) -> bool {
        self.trust(npc) >= ALLY_TRUST
    }

    pub fn is_enemy(&self, npc: &str) -> bool {
        self.trust(npc) <= ENEMY_TRUST
    }

    pub fn ally_count(&self) -> usize {
        self.trust.values().filter(|t| **t >= ALLY_TRUST).count()
    }

    pub fn enemy_count(&self) -> usize {
        self.trust.values().filter(|t| **t <= ENEMY_TRUST).count()
    }

    // -- progression ----------------------------------------------------

    /// Move one floor down. Returns false on the last floor.
    pub fn descend(&mut self) -> bool {
        if self.floor >= MAX_FLOOR {
            return false;
        }
        self.floor += 1;
        self.heals_this_floor = 0;
        debug!("descended to floor {}", self.floor);
        true
    }

    /// Start over after a death: floor 1, resources and sanity restored,
    /// ashlight halved, inventory, history and run counters cleared.
    pub fn reset_after_death(&mut self) {
        self.floor = 1;
        self.health = self.max_health;
        self.stamina = self.max_stamina;
        self.sanity = MAX_SANITY;
        self.ashlight /= 2;
        self.inventory.clear();
        self.history.clear();
        self.trust.clear();
        self.flee_count = 0;
        self.heals_this_floor = 0;
        self.low_tier_kills = 0;
        self.kills = 0;
        self.corruption = None;
        self.wards = Wards::default();
        self.skills = [None; 3];
    }

    // -- features -------------------------------------------------------

    /// Encode this run plus the memory snapshot as the positional vector.
    pub fn feature_vector(&self, memory: &AdaptationSnapshot) -> FeatureVector {
        let mut values = [0.0f32; FEATURE_LEN];
        for kind in StatKind::ALL {
            values[features::STATS + kind.index()] = self.stats.normalized(kind);
        }
        values[features::FLOOR] = self.floor as f32 / MAX_FLOOR as f32;
        values[features::CLASS] =
            self.class.index() as f32 / (ClassId::ALL.len() - 1) as f32;
        values[features::LAST_ACTION] = self
            .history
            .last()
            .map(|a| a.index() as f32 / (ActionKind::ALL.len() - 1) as f32)
            .unwrap_or(0.0);
        values[features::PREDICTABILITY] = self.predictability();
        values[features::SANITY] = self.sanity as f32 / MAX_SANITY as f32;
        values[features::DEATHS] = features::normalize_deaths(memory.deaths);
        values[features::ALLY_COUNT] =
            features::normalize_count(self.ally_count() as u32, features::ALLY_NORM);
        values[features::FLEE_COUNT] =
            features::normalize_count(self.flee_count, features::COUNT_NORM);
        values[features::HEAL_SPAM] =
            features::normalize_count(self.heals_this_floor, features::COUNT_NORM);
        values[features::MOB_FARM] =
            features::normalize_count(self.low_tier_kills, features::COUNT_NORM);
        values[features::PASSIVE_RATIO] = memory.passive_ratio;
        values[features::AGGRESSIVE_RATIO] = memory.aggressive_ratio;
        values[features::DODGE_SKEW] = memory.dodge_skew;
        values[features::ITEM_USAGE] = (memory.item_usage as f32 / 10.0).min(1.0);
        FeatureVector::new(&values)
    }
}

fn take_turn(turns: &mut u8) -> bool {
    if *turns == 0 {
        return false;
    }
    *turns -= 1;
    true
}
