/// Turn-based combat.
///
/// One state machine serves mobs and bosses alike; bosses simply carry a
/// non-empty phase schedule and a special. Each round the enemy's action is
/// chosen and shown first, the player answers within the turn timer, the
/// player's action resolves, and only a surviving enemy strikes back.
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

use super::classes::{ClassKit, School};
use super::config::CombatConfig;
use super::features::FeatureVector;
use super::generator::{ContentGenerator, LoreContext};
use super::input::{ActionSource, TurnView};
use super::memory::BehaviorMemory;
use super::narration::{narrate, phantom_input, shuffle_choices, NarrationContext, NarrationFilter};
use super::run_state::RunState;
use crate::schema::action::{ActionKind, Outcome, PlayerAction, Side};
use crate::schema::content::{Ability, Boss, BossSpecial, Mob, UiDistortion};
use crate::schema::pattern::{Pattern, PhaseSchedule};
use crate::schema::stats::Stats;

/// Default action set for enemies that carry no patterns of their own.
const MOB_PATTERNS: [Pattern; 3] = [Pattern::Strike, Pattern::Feint, Pattern::Defend];

const ALL_CHOICES: [PlayerAction; 6] = [
    PlayerAction::Attack,
    PlayerAction::Dodge(Side::Left),
    PlayerAction::Dodge(Side::Right),
    PlayerAction::Heal,
    PlayerAction::Special,
    PlayerAction::Flee,
];

/// The enemy side of an encounter.
#[derive(Debug, Clone, PartialEq)]
pub struct Combatant {
    pub name: String,
    pub stats: Stats,
    pub health: u32,
    pub max_health: u32,
    pub patterns: Vec<Pattern>,
    pub aggression: f32,
    pub abilities: Vec<Ability>,
    pub special: Option<BossSpecial>,
    pub schedule: PhaseSchedule,
    pub low_tier: bool,
}

impl Combatant {
    pub fn from_mob(mob: &Mob) -> Self {
        Self {
            name: mob.name.clone(),
            stats: mob.stats,
            health: mob.max_health(),
            max_health: mob.max_health(),
            patterns: MOB_PATTERNS.to_vec(),
            aggression: 0.5,
            abilities: mob.abilities.clone(),
            special: None,
            schedule: PhaseSchedule::empty(),
            low_tier: mob.is_low_tier(),
        }
    }

    pub fn from_boss(boss: &Boss) -> Self {
        let health = boss.health.max(1);
        Self {
            name: boss.name.clone(),
            stats: boss.stats,
            health,
            max_health: health,
            patterns: boss.patterns.clone(),
            aggression: boss.aggression.clamp(0.0, 1.0),
            abilities: Vec::new(),
            special: Some(boss.special),
            schedule: boss.phase_schedule.clone(),
            low_tier: false,
        }
    }

    pub fn is_boss(&self) -> bool {
        self.special.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn defense(&self) -> u32 {
        self.stats.dexterity / 2
    }

    fn has(&self, ability: Ability) -> bool {
        self.abilities.contains(&ability)
    }

    fn take_damage(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.health);
        self.health -= taken;
        taken
    }
}

/// Encounter states. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatPhase {
    AwaitingPlayerAction,
    ResolvingPlayerAction,
    AwaitingEnemyAction,
    ResolvingEnemyAction,
    CheckTerminal,
    Finished(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StunCause {
    Timeout,
    FleeDenied,
    Corruption,
}

/// Everything that happened in an encounter, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    Intro { lore: String },
    RoundStarted { round: u32, preview: Pattern },
    Stunned { cause: StunCause },
    Rejected { action: ActionKind, reason: String },
    PlayerStruck { name: String, damage: u32, message: String },
    Healed { amount: u32 },
    Dodged { success: bool },
    PhaseChanged { phase: u8, lore: String },
    EnemyActed { pattern: Pattern, damage: u32, message: String },
    BossSpecial { special: BossSpecial, damage: u32, message: String },
    Amplified { bonus: u32 },
    Evaded,
    Finished { outcome: Outcome },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncounterReport {
    pub outcome: Outcome,
    pub enemy: String,
    pub rounds: u32,
    /// 0 for regular enemies; 1 plus the number of fired triggers for bosses.
    pub boss_phase: u8,
    pub enemy_health: u32,
    pub damage_dealt: u32,
    pub damage_taken: u32,
    pub ashlight_gained: u32,
    pub events: Vec<CombatEvent>,
}

/// Per-encounter mutable state.
struct Encounter {
    enemy: Combatant,
    phase: CombatPhase,
    round: u32,
    boss_phase: u8,
    fired: usize,
    preview: Pattern,
    pending: Option<PlayerAction>,
    dodge_primed: bool,
    last_dodge_succeeded: bool,
    weakened: bool,
    guarded: bool,
    last_enemy_hit: u32,
    actions: Vec<ActionKind>,
    damage_dealt: u32,
    damage_taken: u32,
    events: Vec<CombatEvent>,
}

impl Encounter {
    fn new(enemy: Combatant) -> Self {
        let boss_phase = if enemy.is_boss() { 1 } else { 0 };
        Self {
            enemy,
            phase: CombatPhase::AwaitingPlayerAction,
            round: 0,
            boss_phase,
            fired: 0,
            preview: Pattern::Strike,
            pending: None,
            dodge_primed: false,
            last_dodge_succeeded: false,
            weakened: false,
            guarded: false,
            last_enemy_hit: 0,
            actions: Vec::new(),
            damage_dealt: 0,
            damage_taken: 0,
            events: Vec::new(),
        }
    }

    fn last_action(&self) -> Option<ActionKind> {
        self.actions.last().copied()
    }

    fn most_frequent_action(&self) -> Option<ActionKind> {
        let mut counts = [0usize; ActionKind::ALL.len()];
        for a in &self.actions {
            counts[a.index()] += 1;
        }
        let mut best: Option<ActionKind> = None;
        for kind in ActionKind::ALL {
            let count = counts[kind.index()];
            if count > 0 && best.map_or(true, |b| count > counts[b.index()]) {
                best = Some(kind);
            }
        }
        best
    }
}

pub struct CombatResolver<'a> {
    memory: &'a mut BehaviorMemory,
    generator: &'a ContentGenerator,
    config: &'a CombatConfig,
    narrator: Option<&'a dyn NarrationFilter>,
}

impl<'a> CombatResolver<'a> {
    pub fn new(
        memory: &'a mut BehaviorMemory,
        generator: &'a ContentGenerator,
        config: &'a CombatConfig,
    ) -> Self {
        Self {
            memory,
            generator,
            config,
            narrator: None,
        }
    }

    /// Use a fixed narration filter instead of the entity's adaptive voice.
    pub fn with_narrator(mut self, narrator: &'a dyn NarrationFilter) -> Self {
        self.narrator = Some(narrator);
        self
    }

    fn features(&self, run: &RunState) -> FeatureVector {
        run.feature_vector(&self.memory.adaptation_snapshot())
    }

    fn voice(&self, run: &RunState, text: &str) -> String {
        match self.narrator {
            Some(filter) => filter.filter(text, NarrationContext::Combat),
            None => self
                .generator
                .narrator(&self.features(run))
                .filter(text, NarrationContext::Combat),
        }
    }

    /// Turn timer for the current enemy.
    pub fn turn_time_limit(&self, enemy: &Combatant) -> Duration {
        let c = self.config;
        let (base, scale, floor) = if enemy.is_boss() {
            (c.boss_timer_base, c.boss_timer_scale, c.boss_timer_floor)
        } else {
            (c.regular_timer_base, c.regular_timer_scale, c.regular_timer_floor)
        };
        let secs = (base * (1.0 - enemy.aggression * scale)).max(0.0) as u64;
        Duration::from_secs(secs.max(floor))
    }

    /// Whether a flee attempt succeeds. Regular enemies always let the
    /// player go; bosses refuse outright at high bias, allow it at low
    /// bias, and flip a coin in between.
    pub fn attempt_flee(&self, run: &RunState, enemy: &Combatant, rng: &mut StdRng) -> bool {
        if !enemy.is_boss() {
            return true;
        }
        let bias = self.features(run).entity_bias();
        if bias >= self.config.flee_deny_bias {
            false
        } else if bias < self.config.flee_allow_bias {
            true
        } else {
            rng.gen_bool(0.5)
        }
    }

    /// Run an encounter to completion. Always ends in exactly one outcome.
    pub fn start_encounter(
        &mut self,
        run: &mut RunState,
        enemy: Combatant,
        input: &mut dyn ActionSource,
        rng: &mut StdRng,
    ) -> EncounterReport {
        let kit = ClassKit::for_class(run.class());
        let features = self.features(run);
        let distortion = if self.config.distort_input {
            self.generator.generate_ui_distortion(&features)
        } else {
            UiDistortion::disabled()
        };

        let mut enc = Encounter::new(enemy);
        info!(
            "encounter: {} ({} hp{}) on floor {}",
            enc.enemy.name,
            enc.enemy.max_health,
            if enc.enemy.is_boss() { ", boss" } else { "" },
            run.floor()
        );
        if enc.enemy.is_boss() {
            let lore = self.generator.generate_lore(
                &features,
                run.floor(),
                &LoreContext::BossIntro {
                    boss: enc.enemy.name.clone(),
                },
                rng,
            );
            enc.events.push(CombatEvent::Intro { lore });
        }

        let outcome = loop {
            match enc.phase {
                CombatPhase::AwaitingPlayerAction => {
                    enc.round += 1;
                    if enc.round > self.config.max_rounds {
                        warn!(
                            "encounter with {} hit the {}-round cap; ending it as a flight",
                            enc.enemy.name, self.config.max_rounds
                        );
                        enc.phase = CombatPhase::Finished(Outcome::Fled);
                        continue;
                    }
                    let mended = run.tick_regeneration();
                    if mended > 0 {
                        enc.events.push(CombatEvent::Healed { amount: mended });
                    }
                    enc.preview = self.select_pattern(run, &enc, rng);
                    enc.events.push(CombatEvent::RoundStarted {
                        round: enc.round,
                        preview: enc.preview.clone(),
                    });
                    let view = self.turn_view(run, &enc, &distortion, rng);
                    let limit = self.turn_time_limit(&enc.enemy);
                    enc.pending = input
                        .next_action(&view, limit)
                        .map(|action| phantom_input(&distortion, action, rng));
                    enc.phase = CombatPhase::ResolvingPlayerAction;
                }
                CombatPhase::ResolvingPlayerAction => {
                    let (kind, fled) = self.resolve_player(run, &mut enc, &kit, rng);
                    run.record_action(kind);
                    enc.actions.push(kind);
                    self.memory.track_repeat_actions(&enc.actions);
                    enc.phase = if fled {
                        CombatPhase::Finished(Outcome::Fled)
                    } else if !enc.enemy.is_alive() {
                        CombatPhase::Finished(Outcome::Victory)
                    } else {
                        CombatPhase::AwaitingEnemyAction
                    };
                }
                CombatPhase::AwaitingEnemyAction => {
                    self.advance_boss_phase(run, &mut enc, rng);
                    enc.phase = CombatPhase::ResolvingEnemyAction;
                }
                CombatPhase::ResolvingEnemyAction => {
                    self.resolve_enemy(run, &mut enc, &kit, rng);
                    enc.phase = CombatPhase::CheckTerminal;
                }
                CombatPhase::CheckTerminal => {
                    enc.phase = if run.is_alive() {
                        CombatPhase::AwaitingPlayerAction
                    } else {
                        CombatPhase::Finished(Outcome::Defeat)
                    };
                }
                CombatPhase::Finished(outcome) => break outcome,
            }
        };

        enc.events.push(CombatEvent::Finished { outcome });
        let ashlight_gained = self.propagate(run, &enc, outcome, &kit);
        info!(
            "encounter with {} ended in {} after {} round(s)",
            enc.enemy.name,
            outcome.tag(),
            enc.round
        );

        EncounterReport {
            outcome,
            enemy: enc.enemy.name.clone(),
            rounds: enc.round.min(self.config.max_rounds),
            boss_phase: enc.boss_phase,
            enemy_health: enc.enemy.health,
            damage_dealt: enc.damage_dealt,
            damage_taken: enc.damage_taken,
            ashlight_gained,
            events: enc.events,
        }
    }

    fn turn_view(
        &self,
        run: &RunState,
        enc: &Encounter,
        distortion: &UiDistortion,
        rng: &mut StdRng,
    ) -> TurnView {
        let mut choices = ALL_CHOICES.to_vec();
        shuffle_choices(distortion, &mut choices, rng);
        TurnView {
            round: enc.round,
            health: run.health(),
            max_health: run.max_health(),
            stamina: run.stamina(),
            max_stamina: run.max_stamina(),
            enemy_name: enc.enemy.name.clone(),
            enemy_health: enc.enemy.health,
            enemy_max_health: enc.enemy.max_health,
            preview: enc.preview.clone(),
            boss_phase: enc.boss_phase,
            choices,
        }
    }

    // ------------------------------------------------------------------
    // Enemy pattern selection
    // ------------------------------------------------------------------

    /// Candidate patterns for this draw: the enemy's own set plus counters
    /// to whatever the player did in at least two of their last three
    /// actions. The extension lasts for this draw only.
    fn candidates(&self, enc: &Encounter) -> Vec<Pattern> {
        let mut candidates = enc.enemy.patterns.clone();
        if enc.actions.len() >= 3 {
            let recent = &enc.actions[enc.actions.len() - 3..];
            let count = |kind: ActionKind| recent.iter().filter(|a| **a == kind).count();
            if count(ActionKind::Attack) >= 2 {
                candidates.extend([Pattern::CounterAttack, Pattern::Feint]);
            }
            if count(ActionKind::Dodge) >= 2 {
                candidates.extend([Pattern::AreaAttack, Pattern::PredictDodge]);
            }
            if count(ActionKind::Heal) >= 2 {
                candidates.extend([Pattern::Interrupt, Pattern::Pressure]);
            }
        }
        let mut unique: Vec<Pattern> = Vec::with_capacity(candidates.len());
        for pattern in candidates {
            if !unique.contains(&pattern) {
                unique.push(pattern);
            }
        }
        unique
    }

    fn pattern_weight(&self, pattern: &Pattern, run: &RunState, enc: &Encounter) -> f32 {
        match pattern {
            Pattern::Strike => 2.0,
            Pattern::Feint if enc.last_dodge_succeeded => 3.0,
            Pattern::CounterAttack if enc.last_action() == Some(ActionKind::Attack) => 4.0,
            Pattern::AreaAttack => 2.5,
            Pattern::Interrupt if run.stamina() < 10 => 3.0,
            _ => 1.0,
        }
    }

    fn select_pattern(&self, run: &RunState, enc: &Encounter, rng: &mut StdRng) -> Pattern {
        let candidates = self.candidates(enc);
        if candidates.is_empty() {
            warn!("{} has no patterns; falling back to strike", enc.enemy.name);
            return Pattern::Strike;
        }
        let weights: Vec<f32> = candidates
            .iter()
            .map(|p| self.pattern_weight(p, run, enc))
            .collect();
        let total: f32 = weights.iter().sum();
        let drawn = rng.gen_range(0.0..=total);
        let mut cumulative = 0.0;
        for (pattern, weight) in candidates.iter().zip(&weights) {
            cumulative += weight;
            if cumulative >= drawn {
                return pattern.clone();
            }
        }
        candidates
            .choose(rng)
            .cloned()
            .unwrap_or(Pattern::Strike)
    }

    // ------------------------------------------------------------------
    // Player side
    // ------------------------------------------------------------------

    /// Resolve the pending player action. Returns the action kind to record
    /// and whether the player got away.
    fn resolve_player(
        &mut self,
        run: &mut RunState,
        enc: &mut Encounter,
        kit: &ClassKit,
        rng: &mut StdRng,
    ) -> (ActionKind, bool) {
        let Some(action) = enc.pending.take() else {
            enc.events.push(CombatEvent::Stunned {
                cause: StunCause::Timeout,
            });
            return (ActionKind::Stunned, false);
        };

        if let Some(chance) = run.tick_corruption() {
            if rng.gen::<f32>() < chance {
                enc.events.push(CombatEvent::Stunned {
                    cause: StunCause::Corruption,
                });
                return (ActionKind::Stunned, false);
            }
        }

        match action {
            PlayerAction::Attack | PlayerAction::Special => {
                self.player_strike(run, enc, kit, action, rng);
                (action.kind(), false)
            }
            PlayerAction::Dodge(side) => {
                run.drain_stamina(self.config.dodge_stamina_cost);
                let read = enc.enemy.has(Ability::PatternPrediction)
                    && enc.last_action() == Some(ActionKind::Dodge);
                let chance = (self.config.dodge_base_chance
                    + run.stats().dexterity as f32 / 20.0)
                    .clamp(0.0, 1.0);
                let success = !read && rng.gen::<f32>() < chance;
                enc.dodge_primed = success;
                enc.last_dodge_succeeded = success;
                enc.events.push(CombatEvent::Dodged { success });
                self.memory
                    .track_combat_action(PlayerAction::Dodge(side), None);
                (ActionKind::Dodge, false)
            }
            PlayerAction::Heal => {
                if !run.spend_ashlight(self.config.heal_cost) {
                    enc.events.push(CombatEvent::Rejected {
                        action: ActionKind::Heal,
                        reason: "Not enough ashlight to heal!".to_string(),
                    });
                    return (ActionKind::Heal, false);
                }
                let mend = kit.mend(run);
                run.drain_stamina(mend.stamina_cost);
                let amount = run.heal(mend.amount);
                enc.events.push(CombatEvent::Healed { amount });
                (ActionKind::Heal, false)
            }
            PlayerAction::Flee => {
                if self.attempt_flee(run, &enc.enemy, rng) {
                    (ActionKind::Flee, true)
                } else {
                    debug!("flee from {} denied", enc.enemy.name);
                    enc.events.push(CombatEvent::Stunned {
                        cause: StunCause::FleeDenied,
                    });
                    (ActionKind::Stunned, false)
                }
            }
        }
    }

    fn player_strike(
        &mut self,
        run: &mut RunState,
        enc: &mut Encounter,
        kit: &ClassKit,
        action: PlayerAction,
        rng: &mut StdRng,
    ) {
        let strike = if action == PlayerAction::Special {
            kit.special(run, rng)
        } else {
            kit.attack(run, rng)
        };
        if !run.spend_stamina(strike.stamina_cost) {
            enc.events.push(CombatEvent::Rejected {
                action: action.kind(),
                reason: format!("Not enough stamina for {}!", strike.name),
            });
            return;
        }

        let mut damage = strike.damage;
        if !strike.ignores_defense {
            damage = damage.saturating_sub(enc.enemy.defense()).max(1);
        }
        if enc.enemy.has(Ability::ArmorPlating) && strike.school == School::Physical {
            damage = damage * 3 / 4;
        }
        if enc.enemy.has(Ability::MagicDampening) && strike.school != School::Physical {
            damage = damage * 7 / 10;
        }
        if enc.enemy.has(Ability::PatternPrediction)
            && action == PlayerAction::Attack
            && enc.last_action() == Some(ActionKind::Attack)
        {
            damage = damage * 4 / 5;
        }
        let enemy_stronger = enc.enemy.stats.total() > run.stats().total();
        damage = kit.outgoing(damage, run, enemy_stronger, rng);
        if enc.last_enemy_hit > 0 && run.take_mirror() {
            damage += enc.last_enemy_hit;
        }
        if std::mem::take(&mut enc.guarded) {
            damage /= 2;
        }
        let dealt = enc.enemy.take_damage(damage.max(1));
        enc.damage_dealt += dealt;

        if strike.stamina_gain > 0 {
            run.restore_stamina(strike.stamina_gain);
        }
        if strike.life_gain > 0 {
            run.heal(strike.life_gain);
        }
        if strike.primes_dodge {
            enc.dodge_primed = true;
        }
        if strike.weakens_enemy {
            enc.weakened = true;
        }

        let weapon = run.weapon().kind.clone();
        self.memory.track_combat_action(action, Some(weapon.as_str()));

        let message = self.voice(run, &format!("{} deals {} damage! {}", strike.name, dealt, strike.flavor));
        enc.events.push(CombatEvent::PlayerStruck {
            name: strike.name.to_string(),
            damage: dealt,
            message,
        });
    }

    // ------------------------------------------------------------------
    // Boss phases
    // ------------------------------------------------------------------

    /// Fire every threshold the enemy's health has crossed, in order. Each
    /// trigger fires once and phases only ever go up.
    fn advance_boss_phase(&self, run: &RunState, enc: &mut Encounter, rng: &mut StdRng) {
        let fraction = enc.enemy.health as f32 / enc.enemy.max_health.max(1) as f32;
        loop {
            let Some(trigger) = enc.enemy.schedule.triggers().get(enc.fired).cloned() else {
                break;
            };
            if fraction > trigger.fraction {
                break;
            }
            enc.fired += 1;
            enc.boss_phase = enc.boss_phase.saturating_add(1);
            enc.enemy.aggression =
                (enc.enemy.aggression + trigger.escalation.aggression_delta).clamp(0.0, 1.0);
            enc.enemy
                .patterns
                .extend(trigger.escalation.added_patterns.iter().cloned());

            let lore = self.generator.generate_lore(
                &self.features(run),
                run.floor(),
                &LoreContext::BossPhase(enc.boss_phase),
                rng,
            );
            info!("{} enters phase {}", enc.enemy.name, enc.boss_phase);
            enc.events.push(CombatEvent::PhaseChanged {
                phase: enc.boss_phase,
                lore,
            });
        }
    }

    // ------------------------------------------------------------------
    // Enemy side
    // ------------------------------------------------------------------

    fn resolve_enemy(
        &mut self,
        run: &mut RunState,
        enc: &mut Encounter,
        kit: &ClassKit,
        rng: &mut StdRng,
    ) {
        let pattern = enc.preview.clone();
        if run.take_blind() {
            enc.dodge_primed = false;
            enc.weakened = false;
            let message = self.voice(
                run,
                &narrate("{enemy} lashes out blindly and hits nothing.", &[("enemy", enc.enemy.name.as_str())]),
            );
            enc.events.push(CombatEvent::EnemyActed {
                pattern,
                damage: 0,
                message,
            });
            return;
        }

        let s = enc.enemy.stats;
        let primed = std::mem::take(&mut enc.dodge_primed);
        let mut template = pattern.template().to_string();

        let mut damage = match &pattern {
            Pattern::Strike => s.strength + rng.gen_range(3..=8),
            Pattern::Feint => {
                if primed {
                    s.strength + s.dexterity + rng.gen_range(5..=12)
                } else {
                    template = "{enemy} feints, but you weren't fooled.".to_string();
                    s.strength / 2
                }
            }
            Pattern::Sweep => s.strength + rng.gen_range(4..=10),
            Pattern::PhaseShift => s.strength + s.dexterity,
            Pattern::CorruptCast => {
                if rng.gen_bool(0.3) {
                    run.adjust_sanity(-2);
                    template.push_str(" Your mind reels from the corruption!");
                }
                s.intellect + rng.gen_range(10..=16)
            }
            Pattern::VoidGrab => {
                run.drain_stamina(5);
                s.strength + rng.gen_range(2..=6)
            }
            Pattern::CounterAttack => s.strength * 2 + rng.gen_range(5..=10),
            Pattern::AreaAttack => s.strength + rng.gen_range(8..=15),
            Pattern::PredictDodge => s.strength + rng.gen_range(4..=9),
            Pattern::Interrupt => {
                run.drain_stamina(5);
                s.strength / 2
            }
            Pattern::Pressure => s.strength + 3,
            Pattern::Defend => {
                enc.guarded = true;
                0
            }
            Pattern::DesperationAttack => s.strength * 2 + rng.gen_range(3..=8),
            Pattern::FinalGambit => {
                if rng.gen_bool(0.5) {
                    s.strength * 3
                } else {
                    template = "{enemy} gambles everything and overreaches!".to_string();
                    0
                }
            }
            Pattern::Unknown(tag) => {
                debug!("unknown pattern '{}' resolves as a plain attack", tag);
                s.strength + rng.gen_range(2..=6)
            }
        };

        // The primed flag is spent above; only then does the exemption apply.
        if primed && damage > 0 {
            if pattern.ignores_dodge() {
                template.push_str(" Your dodge means nothing.");
            } else {
                damage /= self.config.dodge_divisor.max(1);
                template.push_str(" But you dodge most of the damage!");
            }
        }
        if std::mem::take(&mut enc.weakened) {
            damage /= 2;
        }
        if run.take_weaken() {
            damage /= 2;
        }

        let message = self.voice(run, &narrate(&template, &[("enemy", enc.enemy.name.as_str())]));
        enc.events.push(CombatEvent::EnemyActed {
            pattern: pattern.clone(),
            damage,
            message,
        });

        if let Some(special) = enc.enemy.special {
            if enc.boss_phase >= 2 && rng.gen::<f32>() < self.config.boss_special_chance {
                damage += self.boss_special(run, enc, special, rng);
            }
        }

        let mut felt = kit.incoming(damage, rng);
        if damage > 0 && felt == 0 {
            enc.events.push(CombatEvent::Evaded);
        }

        // Amplification scales what got past the class passive.
        let bias = self.features(run).entity_bias();
        if bias > self.config.amplify_bias {
            let bonus = (felt as f32 * bias * 0.2) as u32;
            if bonus > 0 {
                felt += bonus;
                enc.events.push(CombatEvent::Amplified { bonus });
            }
        }
        if felt > 0 {
            enc.last_enemy_hit = felt;
        }
        enc.damage_taken += run.take_damage(felt);
    }

    fn boss_special(
        &self,
        run: &mut RunState,
        enc: &mut Encounter,
        special: BossSpecial,
        rng: &mut StdRng,
    ) -> u32 {
        let (damage, message) = match special {
            BossSpecial::EntityCorruption => {
                let damage = run.max_health() * 15 / 100;
                run.adjust_sanity(-5);
                let lore = self.generator.generate_lore(
                    &self.features(run),
                    run.floor(),
                    &LoreContext::Corruption,
                    rng,
                );
                (damage, format!("{} Reality warps! {} corruption damage!", lore, damage))
            }
            BossSpecial::AdaptiveCounter => match enc.most_frequent_action() {
                Some(habit) => {
                    let message = match habit {
                        ActionKind::Attack => "The boss has learned your attack patterns!",
                        ActionKind::Dodge => "The boss predicts your dodges perfectly!",
                        ActionKind::Heal => "The boss punishes your healing attempts!",
                        _ => "The boss adapts to your strategy!",
                    };
                    (enc.enemy.stats.strength + 10, message.to_string())
                }
                None => return 0,
            },
        };
        debug!("{} fires {} for {}", enc.enemy.name, special.tag(), damage);
        enc.events.push(CombatEvent::BossSpecial {
            special,
            damage,
            message,
        });
        damage
    }

    // ------------------------------------------------------------------
    // Outcome propagation
    // ------------------------------------------------------------------

    /// Push the outcome into the run and into memory. Returns the ashlight
    /// awarded.
    fn propagate(
        &mut self,
        run: &mut RunState,
        enc: &Encounter,
        outcome: Outcome,
        kit: &ClassKit,
    ) -> u32 {
        let boss = enc.enemy.is_boss();
        match outcome {
            Outcome::Victory => {
                if boss {
                    self.memory.record_boss_defeat(&enc.enemy.name);
                }
                let reward = if boss {
                    25 * run.floor() as u32
                } else {
                    enc.enemy.stats.vitality * 2 + run.floor() as u32 * 3
                };
                run.gain_ashlight(reward);
                run.record_kill(enc.enemy.low_tier);
                let heal = kit.on_kill(run);
                if heal > 0 {
                    run.heal(heal);
                }
                self.track_fight(enc);
                run.regen_stamina();
                reward
            }
            Outcome::Defeat => {
                let boss_id = boss.then_some(enc.enemy.name.as_str());
                self.memory.record_death(boss_id, run.floor());
                self.memory.reset_run_data();
                run.reset_after_death();
                0
            }
            Outcome::Fled => {
                run.record_flee();
                0
            }
        }
    }

    fn track_fight(&mut self, enc: &Encounter) {
        if let Some(first) = enc.actions.first() {
            self.memory.track_behavior_pattern(*first);
        }
    }
}
