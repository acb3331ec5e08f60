/// Adaptive content generation.
///
/// Every generator reads the positional feature vector, asks its oracle for
/// a bounded output vector, and shapes that into content that leans against
/// how this player plays. Generation never fails: odd inputs fall back to
/// documented defaults.
use log::{debug, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use super::config::GenerationConfig;
use super::features::{self, FeatureVector};
use super::lore::{LoreEdit, LoreStore};
use super::narration::{EntityVoice, NarrationContext, NarrationFilter};
use super::oracle::{GeneratorKind, OracleSet, OUTPUT_SCALE};
use super::run_state::{CorruptionField, RunState};
use crate::schema::content::{
    Ability, Boss, BossSpecial, ChaosEffect, ChapterBlueprint, ChapterSlot, Hazard, HazardKind,
    Item, Layout, Mob, MobClass, Profile, Room, RoomKind, Shop, ShopOffer, Trap, TrapKind,
    UiDistortion,
};
use crate::schema::pattern::{Pattern, PhaseSchedule};
use crate::schema::stats::{StatKind, Stats};

/// Number of slots in a chapter blueprint.
pub const CHAPTER_SLOTS: usize = 9;
const BOSS_PATTERN_COUNT: usize = 4;
const SHOP_ITEMS: usize = 3;

const MOB_PREFIXES: [&str; 5] = ["Glitched", "Echo", "Void", "Corrupted", "Phantom"];
const MOB_NAMES: [&str; 5] = ["Shardfeeder", "Vessel", "Watcher", "Hollow", "Phantom"];
const MOB_SUFFIXES: [&str; 3] = ["Fragment", "Shadow", "Remnant"];
const ITEM_NAMES: [&str; 7] = [
    "Ashlight Blade",
    "Echo Shield",
    "Corrupted Ring",
    "Void Charm",
    "Shadow Catalyst",
    "Hollow Essence",
    "Code Fragment",
];
const WHISPER_PREFIXES: [&str; 4] = ["...", "Listen:", "The void whispers:", "Code fragment:"];
const FAITH_PHRASES: [&str; 3] = [
    "Faith corrodes in the depths.",
    "Your devotion feeds the void.",
    "Sacred words become hollow echoes.",
];
const FALLBACK_PHRASE: &str = "The Entity watches, unblinking.";

/// What a lore line is for; decides its framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoreContext {
    Plain,
    Whisper,
    Death,
    Betrayal { npc: String },
    BossIntro { boss: String },
    BossPhase(u8),
    Corruption,
}

/// Run-level facts the profile needs beyond the feature vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileMetrics {
    pub betrayals: usize,
    /// Raw flee tally; the feature slot saturates.
    pub flees: u32,
}

/// What springing a trap did to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapOutcome {
    pub damage: u32,
    pub stamina_drained: u32,
    pub sanity_lost: u32,
    /// Mobs the caller should spawn.
    pub ambushers: u8,
    pub corrupted: bool,
}

/// What a hazard room did to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HazardOutcome {
    pub damage: u32,
    pub stamina_drained: u32,
    pub sanity_lost: u32,
    pub fatal: bool,
}

pub struct ContentGenerator {
    oracles: OracleSet,
    lore: LoreStore,
    config: GenerationConfig,
}

impl ContentGenerator {
    pub fn new(lore: LoreStore, config: GenerationConfig) -> Self {
        Self {
            oracles: OracleSet::new(),
            lore,
            config,
        }
    }

    /// A generator with the default bible and no backing files.
    pub fn in_memory() -> Self {
        Self::new(LoreStore::in_memory(), GenerationConfig::default())
    }

    pub fn lore(&self) -> &LoreStore {
        &self.lore
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn outputs(&self, kind: GeneratorKind, fv: &FeatureVector) -> Vec<f32> {
        let mut out = self.oracles.score(kind, fv);
        out.resize(kind.output_len(), OUTPUT_SCALE / 2.0);
        out
    }

    /// The entity's voice for this player state.
    pub fn narrator(&self, fv: &FeatureVector) -> EntityVoice {
        EntityVoice {
            tone_bias: self.outputs(GeneratorKind::Lore, fv)[0] / OUTPUT_SCALE,
            entity_bias: fv.entity_bias(),
        }
    }

    // ------------------------------------------------------------------
    // Enemies
    // ------------------------------------------------------------------

    /// A mob that answers the player's strongest stat by inflating its
    /// complement, with counter abilities once the bias runs high.
    pub fn generate_mob(&self, fv: &FeatureVector, floor: u8, rng: &mut StdRng) -> Mob {
        let mut out = self.outputs(GeneratorKind::Mob, fv);
        apply_glitch_noise(&mut out, fv.sanity_norm(), rng);

        let strongest = strongest_stat(fv);
        let counter = strongest.complement();
        let floor_bonus = floor.saturating_sub(1) as f32;

        let mut stats = Stats::uniform(1);
        for kind in StatKind::ALL {
            let mut value = out[kind.index()] + floor_bonus;
            if kind == counter {
                value += fv.stat(strongest) * 6.0;
            }
            stats.set(kind, value.max(1.0) as u32);
        }

        let bias = fv.entity_bias();
        let mut abilities = Vec::new();
        let strength_bias = (fv.stat(StatKind::Strength) * 0.5 + bias * 0.5).clamp(0.0, 1.0);
        if strength_bias > self.config.ability_bias {
            abilities.push(Ability::ArmorPlating);
        }
        let caster = fv.stat(StatKind::Intellect).max(fv.stat(StatKind::Faith));
        let caster_bias = (caster * 0.5 + bias * 0.5).clamp(0.0, 1.0);
        if caster_bias > self.config.ability_bias {
            abilities.push(Ability::MagicDampening);
        }
        if fv.predictability() > 0.7 {
            abilities.push(Ability::PatternPrediction);
        }

        let base = pick(&MOB_NAMES, rng, "Hollow");
        let name = if fv.stat(StatKind::Intellect) > 0.7 {
            let prefix = pick(&MOB_PREFIXES, rng, "Void");
            let suffix = if rng.gen_bool(0.25) {
                format!("Echo-{}", rng.gen_range(10..=99))
            } else {
                pick(&MOB_SUFFIXES, rng, "Shadow").to_string()
            };
            format!("{} {} {}", prefix, base, suffix)
        } else {
            base.to_string()
        };

        let class = MobClass::ALL
            .choose(rng)
            .copied()
            .unwrap_or(MobClass::Hollow);

        debug!(
            "generated mob {} countering {} with {:?}",
            name,
            strongest.abbrev(),
            abilities
        );
        Mob {
            name,
            class,
            stats,
            abilities,
        }
    }

    /// The floor's boss. Pattern weights lean on direct aggression against
    /// clumsy players and on feints against nimble ones.
    pub fn generate_boss(&self, fv: &FeatureVector, floor: u8, rng: &mut StdRng) -> Boss {
        const LOW_DEX_WEIGHTS: [u32; 6] = [3, 1, 3, 1, 2, 2];
        const HIGH_DEX_WEIGHTS: [u32; 6] = [1, 4, 1, 3, 2, 2];

        let out = self.outputs(GeneratorKind::Boss, fv);
        let bias = fv.entity_bias();
        let floor_f = floor.max(1) as f32;

        let health_mult = (0.5 + out[0] / 5.0) + bias * floor_f * 0.5;
        let health = (50.0 * health_mult * (1.0 + bias * floor_f)).max(1.0) as u32;

        let mut aggression = out[1] / OUTPUT_SCALE;
        let weights = if fv.stat(StatKind::Dexterity) < 0.4 {
            aggression += 0.3;
            LOW_DEX_WEIGHTS
        } else {
            HIGH_DEX_WEIGHTS
        };
        let patterns = match WeightedIndex::new(weights) {
            Ok(dist) => (0..BOSS_PATTERN_COUNT)
                .map(|_| Pattern::BOSS_POOL[dist.sample(rng)].clone())
                .collect(),
            Err(e) => {
                warn!("boss pattern weights rejected ({}); using the pool head", e);
                Pattern::BOSS_POOL[..BOSS_PATTERN_COUNT].to_vec()
            }
        };

        let special = if out[2] / OUTPUT_SCALE > 0.7 {
            BossSpecial::EntityCorruption
        } else {
            BossSpecial::AdaptiveCounter
        };

        let aggression = aggression.clamp(0.0, 1.0);
        let base = 8 + 2 * floor as u32;
        let stats = Stats::new(
            base + (aggression * 6.0) as u32,
            base,
            base + 2,
            base,
            base,
            base + floor as u32,
        );

        Boss {
            name: boss_name(floor).to_string(),
            health: health.max(1),
            stats,
            patterns,
            aggression,
            special,
            phase_schedule: PhaseSchedule::standard_boss(),
        }
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    /// A floor's room graph. Habitual runners get long corridors with few
    /// shortcuts; everyone else gets compact, trap-heavy floors.
    pub fn generate_layout(&self, fv: &FeatureVector, floor: u8, rng: &mut StdRng) -> Layout {
        let out = self.outputs(GeneratorKind::Layout, fv);
        let bias = fv.entity_bias();
        let base_rooms = out[0] as usize + 5;
        let mut exit_density = out[1] / OUTPUT_SCALE;
        let mut trap_density = out[2] / OUTPUT_SCALE;

        let (room_count, description) = if fv.flee_count() > self.config.flee_threshold {
            exit_density = (exit_density - 0.3).max(0.1);
            (
                base_rooms + (bias * 5.0) as usize,
                "Long halls mock your haste. The paths remember your flees.",
            )
        } else {
            trap_density = (trap_density + 0.2).min(1.0);
            (
                base_rooms.saturating_sub((bias * 3.0) as usize).max(5),
                "Compressed chambers await. The void knows your curiosity.",
            )
        };

        let rooms = (0..room_count)
            .map(|i| {
                let mut connections = Vec::new();
                if i > 0 {
                    connections.push(i - 1);
                }
                if i + 1 < room_count {
                    connections.push(i + 1);
                }
                if i + 2 < room_count && rng.gen::<f32>() < exit_density {
                    connections.push(i + 2);
                }
                Room {
                    id: i,
                    connections,
                    trap_chance: trap_density,
                    description: format!(
                        "Chamber {}-{}: shadows twist in digital geometries.",
                        floor, i
                    ),
                }
            })
            .collect();

        Layout {
            rooms,
            exit_density,
            trap_density,
            description: description.to_string(),
        }
    }

    /// A trap aimed at the player's habits: heal spam meets poison, mob
    /// farming meets ambushes.
    pub fn generate_trap(&self, fv: &FeatureVector, _floor: u8, rng: &mut StdRng) -> Trap {
        let out = self.outputs(GeneratorKind::Trap, fv);
        let severity = ((out[1] / OUTPUT_SCALE * 4.0) as u8 + 1).clamp(1, 5);

        let kind = if fv.heal_spam() > self.config.heal_spam_threshold {
            TrapKind::PoisonMist
        } else if fv.mob_farm() > self.config.mob_farm_threshold {
            TrapKind::AmbushSpawn
        } else {
            [
                TrapKind::VoidDrain,
                TrapKind::CorruptionField,
                TrapKind::PhantomPain,
            ]
            .choose(rng)
            .copied()
            .unwrap_or(TrapKind::PhantomPain)
        };

        let effect = match kind {
            TrapKind::PoisonMist => format!(
                "Poison deals {} damage, sanity -{}",
                severity as u32 * 3,
                severity
            ),
            TrapKind::AmbushSpawn => {
                format!("Spawns {} corrupted echoes of recent kills", severity)
            }
            TrapKind::VoidDrain => format!(
                "Drains {} stamina, whispers mock your weakness",
                severity as u32 * 2
            ),
            TrapKind::CorruptionField => format!(
                "All actions have {}% failure chance for 3 turns",
                severity as u32 * 10
            ),
            TrapKind::PhantomPain => format!(
                "Phantom damage: feel {} damage but take none. Sanity -1",
                severity as u32 * 5
            ),
        };

        Trap {
            kind,
            severity,
            effect,
        }
    }

    // ------------------------------------------------------------------
    // Items and shops
    // ------------------------------------------------------------------

    pub fn generate_item(&self, fv: &FeatureVector, floor: u8, rng: &mut StdRng) -> Item {
        let out = self.outputs(GeneratorKind::Item, fv);
        let effect = (out[2] / OUTPUT_SCALE * 5.0) as u32;
        // Strong effects tempt frail players, and curse them.
        let curse_risk = if effect >= 3 {
            (1.0 - fv.stat(StatKind::Vitality)) * 0.3
        } else {
            0.0
        };
        Item {
            name: pick(&ITEM_NAMES, rng, "Code Fragment").to_string(),
            damage: (out[0] + floor as f32 * 0.5).max(1.0) as u32,
            defense: out[1].max(1.0) as u32,
            effect,
            rarity: (out[3] / OUTPUT_SCALE * 3.0) as u32,
            curse_risk: curse_risk.clamp(0.0, 0.3),
        }
    }

    /// A shop whose prices rise with the entity's bias. `currency` is what
    /// the player carries; the merchant taunts the poor.
    pub fn generate_shop(
        &self,
        fv: &FeatureVector,
        floor: u8,
        currency: u32,
        rng: &mut StdRng,
    ) -> Shop {
        let out = self.outputs(GeneratorKind::Shop, fv);
        let bias = fv.entity_bias();
        let price_multiplier = 0.5 + out[0] / OUTPUT_SCALE + bias * 0.5;
        let drop_rate = out[1] / OUTPUT_SCALE;

        let offers = (0..SHOP_ITEMS)
            .map(|_| {
                let item = self.generate_item(fv, floor, rng);
                let raw = (10 + item.rarity * 10) as f32 * price_multiplier - drop_rate * 5.0;
                ShopOffer {
                    price: raw.max(1.0) as u32,
                    item,
                }
            })
            .collect::<Vec<_>>();

        let cheapest = offers.iter().map(|o| o.price).min().unwrap_or(0);
        let flavor = if bias > 0.7 || currency < cheapest {
            "Merchant leers: 'Your shards dwindle... perfect.'"
        } else if bias > 0.4 {
            "The merchant's eyes gleam with knowing hunger."
        } else {
            "A hooded figure tends their wares."
        };

        Shop {
            flavor: flavor.to_string(),
            price_multiplier,
            offers,
        }
    }

    // ------------------------------------------------------------------
    // Presentation parameters
    // ------------------------------------------------------------------

    /// UI corruption, switched on for predictable, unstable or deep players.
    pub fn generate_ui_distortion(&self, fv: &FeatureVector) -> UiDistortion {
        let sanity = fv.sanity_norm();
        let deepest = fv.floor() >= features::MAX_FLOOR;
        if !(fv.predictability() > 0.7 || sanity < 0.3 || deepest) {
            return UiDistortion::disabled();
        }
        let out = self.outputs(GeneratorKind::Ui, fv);
        let mut shuffle_chance = out[1] / OUTPUT_SCALE;
        let mut phantom_chance = out[2] / OUTPUT_SCALE;
        if deepest {
            shuffle_chance += 0.2;
            phantom_chance += 0.2;
        }
        UiDistortion {
            enabled: true,
            delay_ms: (out[0] / OUTPUT_SCALE * 500.0) as u32,
            shuffle_chance: shuffle_chance.clamp(0.0, 0.8),
            phantom_chance: phantom_chance.clamp(0.0, 0.5),
            glitch_colors: sanity < 0.3,
        }
    }

    // ------------------------------------------------------------------
    // Lore
    // ------------------------------------------------------------------

    pub fn generate_lore(
        &self,
        fv: &FeatureVector,
        _floor: u8,
        context: &LoreContext,
        rng: &mut StdRng,
    ) -> String {
        let voice = self.narrator(fv);
        let mut phrase = self
            .lore
            .bible()
            .phrases
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| FALLBACK_PHRASE.to_string());
        phrase = voice.filter(&phrase, NarrationContext::Lore);

        // Devout players hear about their faith instead.
        if fv.stat(StatKind::Faith) > 0.7 && rng.gen_bool(0.3) {
            phrase = pick(&FAITH_PHRASES, rng, FAITH_PHRASES[0]).to_string();
        }

        match context {
            LoreContext::Plain => phrase,
            LoreContext::Whisper => {
                format!("{} {}", pick(&WHISPER_PREFIXES, rng, "..."), phrase)
            }
            LoreContext::Death => format!("COMPILED: {}", phrase),
            LoreContext::Betrayal { npc } => format!(
                "{} will not forget. {}",
                npc,
                phrase
                    .replace("Betrayal", "Your betrayal")
                    .replace(" betrayal", " your betrayal")
            ),
            LoreContext::BossIntro { boss } => format!("{} stirs. {}", boss, phrase),
            LoreContext::BossPhase(phase) => format!("PHASE {}: {}", phase, phrase),
            LoreContext::Corruption => format!("THE ENTITY INTERVENES. {}", phrase),
        }
    }

    /// A whisper, or `None` when the entity stays quiet. Quieter players
    /// with steady minds hear fewer.
    pub fn generate_whisper(&self, fv: &FeatureVector, rng: &mut StdRng) -> Option<String> {
        let chance = 0.1 + 0.1 * (1.0 - fv.sanity_norm().clamp(0.0, 1.0));
        if rng.gen::<f32>() >= chance {
            return None;
        }
        Some(self.generate_lore(fv, fv.floor(), &LoreContext::Whisper, rng))
    }

    /// Rewrite the bible after enough deaths. Returns the edits made.
    pub fn mutate_bible(&mut self, deaths: u64, rng: &mut StdRng) -> Vec<LoreEdit> {
        self.lore.mutate(deaths, rng)
    }

    // ------------------------------------------------------------------
    // Run structure
    // ------------------------------------------------------------------

    /// Nine-slot chapter plan. Slot 0 is always safe and slot 8 always the
    /// boss; slots 3 and 6 lean toward minibosses. From `chaos_deaths`
    /// deaths on, slots are independently stamped with chaos effects.
    pub fn generate_chapter(
        &self,
        fv: &FeatureVector,
        deaths: u64,
        rng: &mut StdRng,
    ) -> ChapterBlueprint {
        let out = self.outputs(GeneratorKind::Chapter, fv);
        let chaos_mode = deaths >= self.config.chaos_deaths;

        let slots = (0..CHAPTER_SLOTS)
            .map(|i| {
                let kind = match i {
                    0 => RoomKind::Safe,
                    i if i == CHAPTER_SLOTS - 1 => RoomKind::Boss,
                    _ => {
                        let lean = if i == 3 || i == 6 { 0.25 } else { 0.0 };
                        match bucket(out[i] / OUTPUT_SCALE + lean) {
                            RoomKind::Boss => RoomKind::Miniboss,
                            RoomKind::Safe => RoomKind::Hearth,
                            RoomKind::Combat => self.vary_combat_room(rng),
                            other => other,
                        }
                    }
                };
                let chaos = if chaos_mode && rng.gen::<f32>() < self.config.chaos_chance {
                    ChaosEffect::ALL.choose(rng).copied()
                } else {
                    None
                };
                ChapterSlot { kind, chaos }
            })
            .collect();

        ChapterBlueprint { slots, chaos_mode }
    }

    /// Some fights give way to a hidden chamber or an environmental hazard.
    fn vary_combat_room(&self, rng: &mut StdRng) -> RoomKind {
        let roll = rng.gen::<f32>();
        if roll < self.config.secret_chance {
            RoomKind::Secret
        } else if roll < self.config.secret_chance + self.config.hazard_chance {
            RoomKind::Hazard
        } else {
            RoomKind::Combat
        }
    }

    /// End-of-run read on the player.
    pub fn generate_profile(&self, fv: &FeatureVector, metrics: &ProfileMetrics) -> Profile {
        let predictability = fv.predictability().clamp(0.0, 1.0);
        let percent = (predictability * 100.0).round() as u32;
        let mut lines = Vec::new();

        let verdict = if predictability > 0.8 {
            "Your patterns are trivial to compile."
        } else if predictability > 0.6 {
            "The Entity anticipates your keystrokes."
        } else if predictability > 0.4 {
            "Some variance detected. Insufficient."
        } else {
            "Chaos walks among order. Intriguing."
        };
        lines.push(format!("Predictability: {}%. {}", percent, verdict));

        let allies = fv.get(features::ALLY_COUNT);
        lines.push(if allies <= 0.0 {
            "Moral Compass: Corrupted. Trust is foreign; betrayal, familiar.".to_string()
        } else if metrics.betrayals > 2 {
            format!(
                "Moral Compass: Fractured. Betrayed {} allies; the void approves.",
                metrics.betrayals
            )
        } else {
            "Moral Compass: Flickering. Bonds formed, yet fragility remains.".to_string()
        });

        let flees = metrics.flees;
        lines.push(if flees > 8 {
            format!(
                "Resolve: Thin. Fled {} times; the paths remember your fear.",
                flees
            )
        } else if flees > 3 {
            "Resolve: Wavering. Courage alternates with cowardice.".to_string()
        } else {
            "Resolve: Iron. Death before retreat. The Entity respects persistence.".to_string()
        });

        let sanity = fv.sanity_norm();
        lines.push(
            if sanity < 0.2 {
                "Mental State: FRACTURED. Reality bleeds through cracked perception."
            } else if sanity < 0.5 {
                "Mental State: Strained. The abyss whispers grow louder."
            } else {
                "Mental State: Stable. Clarity persists despite the descent."
            }
            .to_string(),
        );

        Profile { lines }
    }
}

/// Apply a sprung trap to the run.
pub fn apply_trap(run: &mut RunState, trap: &Trap) -> TrapOutcome {
    let severity = trap.severity.clamp(1, 5);
    let mut outcome = TrapOutcome::default();
    match trap.kind {
        TrapKind::PoisonMist => {
            outcome.damage = run.take_damage(severity as u32 * 3);
            let before = run.sanity();
            run.adjust_sanity(-(severity as i32));
            outcome.sanity_lost = before - run.sanity();
        }
        TrapKind::AmbushSpawn => outcome.ambushers = severity,
        TrapKind::VoidDrain => {
            let before = run.stamina();
            run.drain_stamina(severity as u32 * 2);
            outcome.stamina_drained = before - run.stamina();
        }
        TrapKind::CorruptionField => {
            run.set_corruption(CorruptionField {
                failure_chance: severity as f32 * 0.1,
                turns: 3,
            });
            outcome.corrupted = true;
        }
        TrapKind::PhantomPain => {
            let before = run.sanity();
            run.adjust_sanity(-1);
            outcome.sanity_lost = before - run.sanity();
        }
    }
    outcome
}

fn hazard(name: &str, kind: HazardKind, description: &str) -> Hazard {
    Hazard {
        name: name.to_string(),
        kind,
        description: description.to_string(),
    }
}

fn damage(min: u32, max: u32) -> HazardKind {
    HazardKind::Damage { min, max }
}

/// The hazards each floor can throw; unknown floors use floor 1's.
pub fn floor_hazards(floor: u8) -> Vec<Hazard> {
    match floor {
        2 => vec![
            hazard("Data Spikes", damage(8, 18), "Sharp spikes of corrupted code pierce upward!"),
            hazard(
                "Memory Overload Zone",
                HazardKind::MemoryTrap,
                "Waves of foreign memories assault your mind!",
            ),
        ],
        3 => vec![
            hazard("Spore Clouds", HazardKind::StatDrain, "Toxic spores reduce your reflexes and clarity."),
            hazard("Floor Roots", damage(5, 12), "Living roots burst from the ground to ensnare you!"),
        ],
        4 => vec![
            hazard("Memory Traps", damage(15, 25), "You step through the wrong door and agony flares!"),
            hazard("Echo Zones", HazardKind::MemoryTrap, "Phantom voices speak lies in familiar tones."),
        ],
        5 => vec![
            hazard("Time Cracks", HazardKind::StatDrain, "Reality fractures slow your perception of time."),
            hazard("Logic Loops", HazardKind::MemoryTrap, "The same room repeats endlessly until you act."),
        ],
        _ => vec![
            hazard("Falling Debris", damage(5, 15), "Corrupted stone crashes from the ceiling!"),
            hazard(
                "Data Fog",
                HazardKind::StatDrain,
                "Thick fog clouds your vision and slows your movements.",
            ),
            hazard("Unstable Bridge", damage(10, 20), "The bridge groans and cracks beneath your feet!"),
        ],
    }
}

pub fn generate_hazard(floor: u8, rng: &mut StdRng) -> Hazard {
    let mut pool = floor_hazards(floor);
    let pick = rng.gen_range(0..pool.len());
    pool.swap_remove(pick)
}

/// Spring a hazard on the run. Damage can kill; the caller handles death.
pub fn apply_hazard(run: &mut RunState, hazard: &Hazard, rng: &mut StdRng) -> HazardOutcome {
    let mut outcome = HazardOutcome::default();
    match hazard.kind {
        HazardKind::Damage { min, max } => {
            let roll = rng.gen_range(min..=max.max(min));
            outcome.damage = run.take_damage(roll);
        }
        HazardKind::StatDrain => {
            let before = run.stamina();
            run.drain_stamina(10);
            outcome.stamina_drained = before - run.stamina();
        }
        HazardKind::MemoryTrap => {
            let before = run.sanity();
            run.adjust_sanity(-5);
            outcome.sanity_lost = before - run.sanity();
        }
    }
    outcome.fatal = !run.is_alive();
    outcome
}

fn bucket(score: f32) -> RoomKind {
    if score < 0.25 {
        RoomKind::Safe
    } else if score < 0.55 {
        RoomKind::Combat
    } else if score < 0.7 {
        RoomKind::Shop
    } else if score < 0.9 {
        RoomKind::Miniboss
    } else {
        RoomKind::Boss
    }
}

pub fn boss_name(floor: u8) -> &'static str {
    match floor {
        1 => "Ash-Soaked Knight",
        2 => "The Watcher in Code",
        3 => "The Fractured One",
        4 => "Grief-Bound Judge",
        5 => "The Entity (True Form)",
        _ => "Unknown Horror",
    }
}

/// Strongest stat read from the feature vector; ties go to the earliest.
fn strongest_stat(fv: &FeatureVector) -> StatKind {
    let mut best = StatKind::Strength;
    for kind in StatKind::ALL {
        if fv.stat(kind) > fv.stat(best) {
            best = kind;
        }
    }
    best
}

/// Low sanity shakes the oracle's outputs.
fn apply_glitch_noise(outputs: &mut [f32], sanity: f32, rng: &mut StdRng) {
    if sanity >= 0.3 {
        return;
    }
    let amplitude = (0.3 - sanity.max(0.0)) * OUTPUT_SCALE;
    for value in outputs.iter_mut() {
        *value = (*value + rng.gen_range(-amplitude..=amplitude)).clamp(0.0, OUTPUT_SCALE);
    }
}

fn pick<'a>(pool: &[&'a str], rng: &mut StdRng, fallback: &'a str) -> &'a str {
    pool.choose(rng).copied().unwrap_or(fallback)
}
