/// The game session: owns the behavior memory, the content generator, the
/// current run and the seeded rng, and routes every operation through them.
///
/// Built via `Session::builder()`.
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use thiserror::Error;

use super::combat::{CombatResolver, Combatant, EncounterReport};
use super::config::{ConfigError, EngineConfig};
use super::features::FeatureVector;
use super::generator::{
    apply_hazard, apply_trap, generate_hazard, ContentGenerator, HazardOutcome, LoreContext,
    ProfileMetrics, TrapOutcome,
};
use super::input::ActionSource;
use super::lore::LoreStore;
use super::memory::{BehaviorMemory, NpcChoice, NpcInteraction, NpcMood};
use super::run_state::{ItemUse, RunState, ENEMY_TRUST};
use crate::schema::action::Outcome;
use crate::schema::class::{ClassId, InventoryItem};
use crate::schema::content::{
    Boss, ChapterBlueprint, Hazard, Item, Layout, Mob, Profile, Shop, Trap,
};
use crate::schema::skill::{Skill, SkillSlot, SKILLS, SKILL_ROLL_COST};
use crate::schema::stats::StatKind;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("no run in progress")]
    NoRun,
    #[error("{0} will not deal with you")]
    NpcUnavailable(String),
    #[error("no offer at slot {0}")]
    NoSuchOffer(usize),
    #[error("not enough ashlight: need {need}, have {have}")]
    InsufficientAshlight { need: u32, have: u32 },
}

const SECRET_LORE_CHANCE: f32 = 0.3;

/// What a dialogue choice did to the NPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceOutcome {
    pub choice: NpcChoice,
    pub mood: NpcMood,
    pub mood_changed: bool,
    /// The NPC walked out and is gone for good.
    pub departed: bool,
}

/// Loot from a hidden chamber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretCache {
    pub ashlight: u32,
    pub lore: Option<String>,
}

pub struct Session {
    config: EngineConfig,
    memory: BehaviorMemory,
    generator: ContentGenerator,
    run: Option<RunState>,
    rng: StdRng,
}

/// Builder for constructing a `Session`.
#[derive(Debug, Default)]
pub struct SessionBuilder {
    config: Option<EngineConfig>,
    config_file: Option<PathBuf>,
    memory_path: Option<PathBuf>,
    lore_path: Option<PathBuf>,
    seed: Option<u64>,
    in_memory: bool,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn memory(&self) -> &BehaviorMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut BehaviorMemory {
        &mut self.memory
    }

    pub fn generator(&self) -> &ContentGenerator {
        &self.generator
    }

    pub fn run(&self) -> Option<&RunState> {
        self.run.as_ref()
    }

    pub fn run_mut(&mut self) -> Option<&mut RunState> {
        self.run.as_mut()
    }

    fn active_run(&self) -> Result<&RunState, SessionError> {
        self.run.as_ref().ok_or(SessionError::NoRun)
    }

    fn active_run_mut(&mut self) -> Result<&mut RunState, SessionError> {
        self.run.as_mut().ok_or(SessionError::NoRun)
    }

    /// Begin a fresh run with `class`, replacing any run in progress.
    pub fn start_run(&mut self, class: ClassId) -> &RunState {
        self.memory.record_class_selection(class);
        info!("new run as {}", class.name());
        self.run.insert(RunState::new(class, self.config.history_len))
    }

    pub fn feature_vector(&self) -> Result<FeatureVector, SessionError> {
        Ok(self
            .active_run()?
            .feature_vector(&self.memory.adaptation_snapshot()))
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    pub fn plan_chapter(&mut self) -> Result<ChapterBlueprint, SessionError> {
        let fv = self.feature_vector()?;
        let deaths = self.memory.deaths();
        Ok(self.generator.generate_chapter(&fv, deaths, &mut self.rng))
    }

    pub fn layout(&mut self) -> Result<Layout, SessionError> {
        let fv = self.feature_vector()?;
        let floor = self.active_run()?.floor();
        Ok(self.generator.generate_layout(&fv, floor, &mut self.rng))
    }

    pub fn spawn_mob(&mut self) -> Result<Mob, SessionError> {
        let fv = self.feature_vector()?;
        let floor = self.active_run()?.floor();
        Ok(self.generator.generate_mob(&fv, floor, &mut self.rng))
    }

    pub fn spawn_boss(&mut self) -> Result<Boss, SessionError> {
        let fv = self.feature_vector()?;
        let floor = self.active_run()?.floor();
        Ok(self.generator.generate_boss(&fv, floor, &mut self.rng))
    }

    /// Walk into a hazard room. A fatal hazard ends the run like a defeat
    /// with no boss to blame.
    pub fn enter_hazard(&mut self) -> Result<(Hazard, HazardOutcome), SessionError> {
        let floor = self.active_run()?.floor();
        let hazard = generate_hazard(floor, &mut self.rng);
        let run = self.run.as_mut().ok_or(SessionError::NoRun)?;
        let outcome = apply_hazard(run, &hazard, &mut self.rng);
        if outcome.fatal {
            info!("{} ends the run on floor {}", hazard.name, floor);
            self.memory.record_death(None, floor);
            self.memory.reset_run_data();
            run.reset_after_death();
        }
        Ok((hazard, outcome))
    }

    pub fn open_secret(&mut self) -> Result<SecretCache, SessionError> {
        let fv = self.feature_vector()?;
        let ashlight = self.rng.gen_range(30..=60);
        self.active_run_mut()?.gain_ashlight(ashlight);
        let lore = if self.rng.gen::<f32>() < SECRET_LORE_CHANCE {
            Some(
                self.generator
                    .generate_lore(&fv, fv.floor(), &LoreContext::Plain, &mut self.rng),
            )
        } else {
            None
        };
        Ok(SecretCache { ashlight, lore })
    }

    /// Generate a trap for the current floor and spring it on the player.
    pub fn spring_trap(&mut self) -> Result<(Trap, TrapOutcome), SessionError> {
        let fv = self.feature_vector()?;
        let floor = self.active_run()?.floor();
        let trap = self.generator.generate_trap(&fv, floor, &mut self.rng);
        let outcome = apply_trap(self.active_run_mut()?, &trap);
        info!("trap sprung: {} (severity {})", trap.kind.tag(), trap.severity);
        Ok((trap, outcome))
    }

    pub fn whisper(&mut self) -> Result<Option<String>, SessionError> {
        let fv = self.feature_vector()?;
        Ok(self.generator.generate_whisper(&fv, &mut self.rng))
    }

    pub fn profile(&self) -> Result<Profile, SessionError> {
        let fv = self.feature_vector()?;
        let metrics = ProfileMetrics {
            betrayals: self.memory.betrayals().len(),
            flees: self.active_run()?.flee_count(),
        };
        Ok(self.generator.generate_profile(&fv, &metrics))
    }

    // ------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------

    /// Fight `enemy` to completion. A defeat also gives the entity a chance
    /// to rewrite the lore bible.
    pub fn encounter(
        &mut self,
        enemy: Combatant,
        input: &mut dyn ActionSource,
    ) -> Result<EncounterReport, SessionError> {
        let run = self.run.as_mut().ok_or(SessionError::NoRun)?;
        let report = CombatResolver::new(&mut self.memory, &self.generator, &self.config.combat)
            .start_encounter(run, enemy, input, &mut self.rng);
        if report.outcome == Outcome::Defeat {
            let edits = self
                .generator
                .mutate_bible(self.memory.deaths(), &mut self.rng);
            if !edits.is_empty() {
                info!("lore bible rewritten ({} edit(s))", edits.len());
            }
        }
        Ok(report)
    }

    pub fn fight_mob(&mut self, input: &mut dyn ActionSource) -> Result<EncounterReport, SessionError> {
        let mob = self.spawn_mob()?;
        self.encounter(Combatant::from_mob(&mob), input)
    }

    pub fn fight_boss(&mut self, input: &mut dyn ActionSource) -> Result<EncounterReport, SessionError> {
        let boss = self.spawn_boss()?;
        self.encounter(Combatant::from_boss(&boss), input)
    }

    // ------------------------------------------------------------------
    // Economy
    // ------------------------------------------------------------------

    pub fn visit_shop(&mut self) -> Result<Shop, SessionError> {
        let fv = self.feature_vector()?;
        let run = self.active_run()?;
        let (floor, currency) = (run.floor(), run.ashlight());
        Ok(self
            .generator
            .generate_shop(&fv, floor, currency, &mut self.rng))
    }

    /// Buy the offer at `slot`; the item goes into the inventory.
    pub fn buy(&mut self, shop: &Shop, slot: usize) -> Result<Item, SessionError> {
        let offer = shop.offers.get(slot).ok_or(SessionError::NoSuchOffer(slot))?;
        let run = self.active_run_mut()?;
        if !run.spend_ashlight(offer.price) {
            return Err(SessionError::InsufficientAshlight {
                need: offer.price,
                have: run.ashlight(),
            });
        }
        let item = offer.item.clone();
        run.add_item(InventoryItem::new(
            &item.name,
            1,
            &format!("+{} damage, +{} defense", item.damage, item.defense),
        ));
        Ok(item)
    }

    /// Use one charge of an inventory item. `None` when the run holds no
    /// charged item by that name.
    pub fn use_item(&mut self, name: &str) -> Result<Option<ItemUse>, SessionError> {
        let used = self.active_run_mut()?.use_item(name);
        if used.is_some() {
            self.memory.record_item_use();
        }
        Ok(used)
    }

    pub fn level_stat(&mut self, kind: StatKind) -> Result<bool, SessionError> {
        Ok(self.active_run_mut()?.level_stat(kind))
    }

    // ------------------------------------------------------------------
    // Hearth
    // ------------------------------------------------------------------

    pub fn rest(&mut self) -> Result<(), SessionError> {
        self.active_run_mut()?.rest();
        Ok(())
    }

    /// Pay for a random skill. The unlock is remembered across deaths; the
    /// skill is not equipped.
    pub fn roll_skill(&mut self) -> Result<Skill, SessionError> {
        let run = self.active_run_mut()?;
        if !run.spend_ashlight(SKILL_ROLL_COST) {
            return Err(SessionError::InsufficientAshlight {
                need: SKILL_ROLL_COST,
                have: run.ashlight(),
            });
        }
        let skill = SKILLS[self.rng.gen_range(0..SKILLS.len())];
        self.memory.record_skill_unlocked(skill.name);
        info!("skill unlocked: {} ({})", skill.name, skill.slot.as_str());
        Ok(skill)
    }

    /// Equip into the skill's own slot. False when the slot does not match.
    pub fn equip_skill(&mut self, skill: Skill, slot: SkillSlot) -> Result<bool, SessionError> {
        Ok(self.active_run_mut()?.equip_skill(skill, slot))
    }

    // ------------------------------------------------------------------
    // Progression and relations
    // ------------------------------------------------------------------

    /// Move one floor down. Returns false on the last floor.
    pub fn descend(&mut self) -> Result<bool, SessionError> {
        let run = self.active_run_mut()?;
        if !run.descend() {
            return Ok(false);
        }
        let floor = run.floor();
        self.memory.record_floor_reached(floor);
        Ok(true)
    }

    /// Talk to an NPC. Betrayed or departed NPCs refuse, in this run and
    /// every later one.
    pub fn visit_npc(&mut self, npc: &str) -> Result<i32, SessionError> {
        self.ensure_available(npc)?;
        let trust = self.active_run_mut()?.adjust_trust(npc, 1);
        self.memory.update_npc_interaction(npc, NpcInteraction::Visit);
        Ok(trust)
    }

    fn ensure_available(&self, npc: &str) -> Result<(), SessionError> {
        if self.memory.is_available(npc) {
            Ok(())
        } else {
            Err(SessionError::NpcUnavailable(npc.to_string()))
        }
    }

    /// The mood an NPC shows this run: its remembered mood, overridden by
    /// this run's trust. Enemies are hostile; allies warm a neutral NPC.
    pub fn npc_mood(&self, npc: &str) -> Result<NpcMood, SessionError> {
        let run = self.active_run()?;
        let remembered = self.memory.npc(npc).map(|r| r.mood).unwrap_or_default();
        Ok(if run.is_enemy(npc) {
            NpcMood::Hostile
        } else if run.is_ally(npc) && remembered == NpcMood::Neutral {
            NpcMood::Respectful
        } else {
            remembered
        })
    }

    /// Make a dialogue choice in front of an NPC.
    pub fn choose(&mut self, npc: &str, choice: NpcChoice) -> Result<ChoiceOutcome, SessionError> {
        self.ensure_available(npc)?;
        let before = self.npc_mood(npc)?;
        let shift = match choice {
            NpcChoice::Insult => -2,
            NpcChoice::Underpay => -1,
            NpcChoice::Leave | NpcChoice::Riddle { solved: false } => 0,
            _ => 1,
        };
        self.active_run_mut()?.adjust_trust(npc, shift);
        self.memory.record_npc_choice(npc, choice);
        let mood = self.npc_mood(npc)?;
        Ok(ChoiceOutcome {
            choice,
            mood,
            mood_changed: mood != before,
            departed: !self.memory.is_available(npc),
        })
    }

    /// Betray an NPC. The record is permanent; returns the entity's comment.
    pub fn betray(&mut self, npc: &str, kind: &str) -> Result<String, SessionError> {
        self.active_run_mut()?.set_trust(npc, ENEMY_TRUST);
        self.memory.add_betrayal(npc, kind);
        self.memory
            .update_npc_interaction(npc, NpcInteraction::Mood(NpcMood::Hostile));
        let fv = self.feature_vector()?;
        let floor = fv.floor();
        Ok(self.generator.generate_lore(
            &fv,
            floor,
            &LoreContext::Betrayal {
                npc: npc.to_string(),
            },
            &mut self.rng,
        ))
    }
}

impl SessionBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the config from a RON file. Ignored if `config` is also given.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn memory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.memory_path = Some(path.into());
        self
    }

    pub fn lore_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lore_path = Some(path.into());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Keep memory and lore off disk (for testing without files).
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    pub fn build(self) -> Result<Session, SessionError> {
        let mut config = match (self.config, self.config_file) {
            (Some(config), _) => config,
            (None, Some(path)) => EngineConfig::load_from_ron(&path)?,
            (None, None) => EngineConfig::default(),
        };
        if let Some(path) = self.memory_path {
            config.memory_path = path;
        }
        if let Some(path) = self.lore_path {
            config.lore_path = path;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        let (memory, lore) = if self.in_memory {
            (BehaviorMemory::in_memory(), LoreStore::in_memory())
        } else {
            (
                BehaviorMemory::open(config.memory_path.clone()),
                LoreStore::open(config.lore_path.clone()),
            )
        };
        let generator = ContentGenerator::new(lore, config.generation.clone());
        let rng = StdRng::seed_from_u64(config.seed);

        Ok(Session {
            config,
            memory,
            generator,
            run: None,
            rng,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::ScriptedInput;
    use crate::core::memory::FACELESS_MERCHANT;
    use crate::schema::action::PlayerAction;

    fn session(seed: u64) -> Session {
        Session::builder().in_memory().seed(seed).build().unwrap()
    }

    #[test]
    fn operations_need_a_run() {
        let mut s = session(1);
        assert!(matches!(s.spawn_mob(), Err(SessionError::NoRun)));
        assert!(matches!(s.descend(), Err(SessionError::NoRun)));
        s.start_run(ClassId::AshDancer);
        assert!(s.spawn_mob().is_ok());
    }

    #[test]
    fn start_run_records_class() {
        let mut s = session(1);
        s.start_run(ClassId::Gravebound);
        s.start_run(ClassId::SoulLeech);
        let doc = s.memory().document();
        assert_eq!(doc.class_selected, Some(ClassId::SoulLeech));
        assert_eq!(doc.class_history, vec![ClassId::Gravebound, ClassId::SoulLeech]);
    }

    #[test]
    fn descend_tracks_deepest_floor() {
        let mut s = session(2);
        s.start_run(ClassId::Wretched);
        assert!(s.descend().unwrap());
        assert!(s.descend().unwrap());
        assert_eq!(s.memory().document().floors_cleared, 3);
        assert_eq!(s.run().unwrap().floor(), 3);
    }

    #[test]
    fn betrayed_npcs_refuse_visits() {
        let mut s = session(3);
        s.start_run(ClassId::FaithBroken);
        assert_eq!(s.visit_npc("Hollow Merchant").unwrap(), 1);
        let line = s.betray("Hollow Merchant", "theft").unwrap();
        assert!(line.starts_with("Hollow Merchant will not forget."));
        assert!(s.run().unwrap().is_enemy("Hollow Merchant"));
        assert!(matches!(
            s.visit_npc("Hollow Merchant"),
            Err(SessionError::NpcUnavailable(_))
        ));
        // The record outlives the run.
        s.start_run(ClassId::FaithBroken);
        assert!(s.visit_npc("Hollow Merchant").is_err());
    }

    #[test]
    fn trust_colours_the_remembered_mood() {
        let mut s = session(8);
        s.start_run(ClassId::AshDancer);
        assert_eq!(s.npc_mood("The Lorekeeper").unwrap(), NpcMood::Neutral);
        for _ in 0..3 {
            s.visit_npc("The Lorekeeper").unwrap();
        }
        assert_eq!(s.npc_mood("The Lorekeeper").unwrap(), NpcMood::Respectful);

        let outcome = s.choose("Ash Sister", NpcChoice::Insult).unwrap();
        assert_eq!(outcome.mood, NpcMood::Hostile);
        assert!(outcome.mood_changed);
        assert_eq!(s.run().unwrap().trust("Ash Sister"), -2);
    }

    #[test]
    fn departed_merchant_refuses_everything() {
        let mut s = session(9);
        s.start_run(ClassId::Wretched);
        let mut last = None;
        for _ in 0..6 {
            last = Some(s.choose(FACELESS_MERCHANT, NpcChoice::Leave).unwrap());
        }
        assert!(last.unwrap().departed);
        assert!(matches!(
            s.visit_npc(FACELESS_MERCHANT),
            Err(SessionError::NpcUnavailable(_))
        ));
        assert!(s.choose(FACELESS_MERCHANT, NpcChoice::Apologize).is_err());
        s.start_run(ClassId::Wretched);
        assert!(s.visit_npc(FACELESS_MERCHANT).is_err());
    }

    #[test]
    fn rolling_a_skill_costs_ashlight_and_is_remembered() {
        let mut s = session(10);
        s.start_run(ClassId::VoidProphet);
        assert!(matches!(
            s.roll_skill(),
            Err(SessionError::InsufficientAshlight { need: 50, .. })
        ));
        s.run_mut().unwrap().gain_ashlight(60);
        let skill = s.roll_skill().unwrap();
        assert_eq!(s.run().unwrap().ashlight(), 10);
        assert_eq!(s.memory().document().skills_unlocked, vec![skill.name.to_string()]);
        assert!(s.run().unwrap().skill(skill.slot).is_none());
        assert!(s.equip_skill(skill, skill.slot).unwrap());
        assert_eq!(s.run().unwrap().skill(skill.slot), Some(skill));
    }

    #[test]
    fn resting_refills_the_run() {
        let mut s = session(11);
        s.start_run(ClassId::Gravebound);
        let run = s.run_mut().unwrap();
        run.take_damage(20);
        run.drain_stamina(20);
        s.rest().unwrap();
        let run = s.run().unwrap();
        assert_eq!(run.health(), run.max_health());
        assert_eq!(run.stamina(), run.max_stamina());
    }

    #[test]
    fn a_fatal_hazard_is_a_death() {
        let mut s = session(12);
        s.start_run(ClassId::AshDancer);
        let mut deaths = 0;
        for _ in 0..10 {
            let health = s.run().unwrap().health();
            s.run_mut().unwrap().take_damage(health - 1);
            let (_, outcome) = s.enter_hazard().unwrap();
            if outcome.fatal {
                deaths += 1;
                assert!(s.run().unwrap().is_alive());
                assert_eq!(s.run().unwrap().floor(), 1);
            }
        }
        // Two of floor 1's three hazards deal damage.
        assert!(deaths > 0);
        assert_eq!(s.memory().deaths(), deaths);
    }

    #[test]
    fn secrets_pay_out_ashlight() {
        let mut s = session(13);
        s.start_run(ClassId::FaithBroken);
        let before = s.run().unwrap().ashlight();
        let cache = s.open_secret().unwrap();
        assert!((30..=60).contains(&cache.ashlight));
        assert_eq!(s.run().unwrap().ashlight(), before + cache.ashlight);
    }

    #[test]
    fn buying_without_ashlight_fails() {
        let mut s = session(4);
        s.start_run(ClassId::Wretched);
        let shop = s.visit_shop().unwrap();
        assert!(matches!(
            s.buy(&shop, 0),
            Err(SessionError::InsufficientAshlight { have: 0, .. })
        ));
        assert!(matches!(s.buy(&shop, 99), Err(SessionError::NoSuchOffer(99))));
    }

    #[test]
    fn buying_fills_the_inventory() {
        let mut s = session(5);
        s.start_run(ClassId::Wretched);
        s.run_mut().unwrap().gain_ashlight(10_000);
        let shop = s.visit_shop().unwrap();
        let item = s.buy(&shop, 0).unwrap();
        assert!(s.run().unwrap().inventory().iter().any(|i| i.name == item.name));
        assert_eq!(s.run().unwrap().ashlight(), 10_000 - shop.offers[0].price);
        assert!(s.use_item(&item.name).unwrap().is_some());
        assert_eq!(s.memory().document().item_usage_this_run, 1);
    }

    #[test]
    fn fleeing_a_mob_is_counted() {
        let mut s = session(6);
        s.start_run(ClassId::AshDancer);
        let mut input = ScriptedInput::repeating(PlayerAction::Flee);
        let report = s.fight_mob(&mut input).unwrap();
        assert_eq!(report.outcome, Outcome::Fled);
        assert_eq!(s.run().unwrap().flee_count(), 1);
    }

    #[test]
    fn same_seed_same_session() {
        let play = |seed| {
            let mut s = session(seed);
            s.start_run(ClassId::VoidProphet);
            let chapter = s.plan_chapter().unwrap();
            let mut input = ScriptedInput::repeating(PlayerAction::Attack);
            let report = s.fight_mob(&mut input).unwrap();
            (chapter, report)
        };
        assert_eq!(play(77), play(77));
    }
}
