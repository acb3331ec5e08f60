/// Class combat kits: attack, special, heal and passive behavior per class.
///
/// A kit is resolved once from the class id when a run starts; combat only
/// ever calls through the function table.
use rand::rngs::StdRng;
use rand::Rng;

use super::run_state::RunState;
use crate::schema::class::{ClassId, Passive};

/// Damage school, matched against mob resistances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum School {
    Physical,
    Arcane,
    Holy,
}

/// A resolved offensive move before enemy defense is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Strike {
    pub name: &'static str,
    pub damage: u32,
    pub stamina_cost: u32,
    pub school: School,
    pub ignores_defense: bool,
    /// Stamina returned to the player after the hit lands.
    pub stamina_gain: u32,
    /// Health returned to the player after the hit lands.
    pub life_gain: u32,
    /// Sets up a guaranteed dodge against the next enemy action.
    pub primes_dodge: bool,
    /// Halves the enemy's next action.
    pub weakens_enemy: bool,
    pub flavor: &'static str,
}

impl Strike {
    fn new(name: &'static str, damage: u32, stamina_cost: u32, flavor: &'static str) -> Self {
        Self {
            name,
            damage,
            stamina_cost,
            school: School::Physical,
            ignores_defense: false,
            stamina_gain: 0,
            life_gain: 0,
            primes_dodge: false,
            weakens_enemy: false,
            flavor,
        }
    }
}

/// Health restored and stamina spent by the heal action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mend {
    pub amount: u32,
    pub stamina_cost: u32,
}

pub type StrikeFn = fn(&RunState, &mut StdRng) -> Strike;
pub type MendFn = fn(&RunState) -> Mend;

#[derive(Clone, Copy)]
pub struct ClassKit {
    pub class: ClassId,
    pub passive: Passive,
    attack_fn: StrikeFn,
    special_fn: StrikeFn,
    mend_fn: MendFn,
}

impl std::fmt::Debug for ClassKit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassKit")
            .field("class", &self.class)
            .field("passive", &self.passive)
            .finish()
    }
}

impl ClassKit {
    pub fn for_class(class: ClassId) -> Self {
        let (attack_fn, special_fn, mend_fn): (StrikeFn, StrikeFn, MendFn) = match class {
            ClassId::AshDancer => (shadow_stab, phase_step, field_mend),
            ClassId::Gravebound => (greatblade_swing, bone_crush, field_mend),
            ClassId::SoulLeech => (essence_drain, life_tap, field_mend),
            ClassId::VoidProphet => (code_bolt, soul_burn, field_mend),
            ClassId::FaithBroken => (sacred_strike, broken_prayer, ash_heal),
            ClassId::Wretched => (shield_bash, bonk, field_mend),
        };
        Self {
            class,
            passive: class.profile().passive,
            attack_fn,
            special_fn,
            mend_fn,
        }
    }

    pub fn attack(&self, run: &RunState, rng: &mut StdRng) -> Strike {
        (self.attack_fn)(run, rng)
    }

    pub fn special(&self, run: &RunState, rng: &mut StdRng) -> Strike {
        (self.special_fn)(run, rng)
    }

    pub fn mend(&self, run: &RunState) -> Mend {
        (self.mend_fn)(run)
    }

    /// Passive filter on damage the player is about to take.
    pub fn incoming(&self, damage: u32, rng: &mut StdRng) -> u32 {
        match self.passive {
            Passive::EtherealStep if rng.gen_bool(0.10) => 0,
            Passive::Deathward => damage - damage / 10,
            _ => damage,
        }
    }

    /// Passive filter on damage the player deals. `enemy_stronger` is true
    /// when the enemy's stat total exceeds the player's.
    pub fn outgoing(
        &self,
        damage: u32,
        run: &RunState,
        enemy_stronger: bool,
        rng: &mut StdRng,
    ) -> u32 {
        match self.passive {
            Passive::VoidSight if rng.gen_bool(0.15) => damage * 2,
            Passive::MartyrsResolve if run.health_fraction() < 0.25 => damage * 3 / 2,
            Passive::Underdog if enemy_stronger => damage + 2,
            _ => damage,
        }
    }

    /// Health restored when the player wins a fight.
    pub fn on_kill(&self, run: &RunState) -> u32 {
        match self.passive {
            Passive::Vampiric => run.max_health() * 5 / 100,
            _ => 0,
        }
    }
}

fn base_roll(run: &RunState, rng: &mut StdRng) -> u32 {
    run.stats().strength + rng.gen_range(5..=15)
}

// -- attacks --------------------------------------------------------------

fn shadow_stab(run: &RunState, rng: &mut StdRng) -> Strike {
    let mut damage = base_roll(run, rng);
    let crit_chance = (run.stats().dexterity as f64 / 20.0).min(1.0);
    let mut flavor = "A blade flickers out of the smoke.";
    if rng.gen_bool(crit_chance) {
        damage *= 2;
        flavor = "Critical strike from the shadows!";
    }
    Strike::new("Shadow Stab", damage, 2, flavor)
}

fn greatblade_swing(run: &RunState, rng: &mut StdRng) -> Strike {
    Strike::new(
        "Greatblade Swing",
        base_roll(run, rng) + 5,
        4,
        "The greatblade cleaves through shadow!",
    )
}

fn essence_drain(run: &RunState, rng: &mut StdRng) -> Strike {
    let damage = base_roll(run, rng);
    let mut strike = Strike::new("Essence Drain", damage, 1, "You drink what spills out.");
    strike.stamina_gain = (damage / 3).min(5);
    strike
}

fn code_bolt(run: &RunState, rng: &mut StdRng) -> Strike {
    let mut strike = Strike::new(
        "Code Bolt",
        run.stats().intellect + rng.gen_range(8..=18),
        3,
        "Digital lightning pierces the void!",
    );
    strike.school = School::Arcane;
    strike
}

fn sacred_strike(run: &RunState, rng: &mut StdRng) -> Strike {
    let mut strike = Strike::new(
        "Sacred Strike",
        base_roll(run, rng) + run.stats().faith,
        2,
        "Holy light burns through corruption!",
    );
    strike.school = School::Holy;
    strike
}

fn shield_bash(run: &RunState, rng: &mut StdRng) -> Strike {
    let mut damage = base_roll(run, rng) / 2 + 12;
    let mut flavor = "The stick connects. Barely.";
    if rng.gen_bool(0.3) {
        damage += 5;
        flavor = "The enemy is staggered!";
    }
    Strike::new("Bonk Stick Swing", damage, 3, flavor)
}

// -- specials -------------------------------------------------------------

fn phase_step(run: &RunState, _rng: &mut StdRng) -> Strike {
    let mut strike = Strike::new(
        "Phase Step",
        run.stats().dexterity / 2,
        6,
        "You step half out of the world.",
    );
    strike.primes_dodge = true;
    strike
}

fn bone_crush(run: &RunState, rng: &mut StdRng) -> Strike {
    Strike::new(
        "Bone Crush",
        run.stats().strength * 2 + rng.gen_range(5..=15),
        10,
        "Bone meets bone. Yours wins.",
    )
}

fn life_tap(run: &RunState, rng: &mut StdRng) -> Strike {
    let damage = run.stats().intellect + rng.gen_range(5..=10);
    let mut strike = Strike::new("Life Tap", damage, 6, "Their life runs into your veins.");
    strike.school = School::Arcane;
    strike.life_gain = damage / 2;
    strike
}

fn soul_burn(run: &RunState, _rng: &mut StdRng) -> Strike {
    let mut strike = Strike::new(
        "Soul Burn",
        run.stats().intellect * 2,
        8,
        "The void burns straight through armor.",
    );
    strike.school = School::Arcane;
    strike.ignores_defense = true;
    strike
}

fn broken_prayer(run: &RunState, rng: &mut StdRng) -> Strike {
    let mut strike = Strike::new(
        "Broken Prayer",
        run.stats().faith + rng.gen_range(3..=8),
        6,
        "A prayer to nothing. Something answers anyway.",
    );
    strike.school = School::Holy;
    strike.weakens_enemy = true;
    strike
}

fn bonk(_run: &RunState, rng: &mut StdRng) -> Strike {
    Strike::new("Bonk", rng.gen_range(1..=30), 4, "Bonk.")
}

// -- heals ----------------------------------------------------------------

fn field_mend(run: &RunState) -> Mend {
    Mend {
        amount: 10 + run.stats().vitality / 2,
        stamina_cost: 5,
    }
}

fn ash_heal(run: &RunState) -> Mend {
    Mend {
        amount: 15 + run.stats().faith,
        stamina_cost: 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn every_class_resolves_a_kit() {
        let mut rng = rng();
        for class in ClassId::ALL {
            let run = RunState::new(class, 10);
            let kit = ClassKit::for_class(class);
            assert_eq!(kit.passive, class.profile().passive);
            let attack = kit.attack(&run, &mut rng);
            let special = kit.special(&run, &mut rng);
            assert!(attack.stamina_cost > 0, "{:?} attack is free", class);
            assert!(special.stamina_cost >= attack.stamina_cost, "{:?}", class);
        }
    }

    #[test]
    fn gravebound_swing_is_heavier() {
        let run = RunState::new(ClassId::Gravebound, 10);
        let kit = ClassKit::for_class(ClassId::Gravebound);
        let mut rng = rng();
        for _ in 0..50 {
            let strike = kit.attack(&run, &mut rng);
            assert!((14 + 5 + 5..=14 + 15 + 5).contains(&strike.damage));
            assert_eq!(strike.stamina_cost, 4);
        }
    }

    #[test]
    fn soul_leech_drain_is_capped() {
        let run = RunState::new(ClassId::SoulLeech, 10);
        let kit = ClassKit::for_class(ClassId::SoulLeech);
        let mut rng = rng();
        for _ in 0..50 {
            let strike = kit.attack(&run, &mut rng);
            assert_eq!(strike.stamina_gain, (strike.damage / 3).min(5));
            assert!(strike.stamina_gain > 0, "the drain feeds the player");
            assert_eq!(strike.stamina_cost, 1);
        }
    }

    #[test]
    fn soul_burn_ignores_defense() {
        let run = RunState::new(ClassId::VoidProphet, 10);
        let special = ClassKit::for_class(ClassId::VoidProphet).special(&run, &mut rng());
        assert!(special.ignores_defense);
        assert_eq!(special.damage, 36);
        assert_eq!(special.school, School::Arcane);
    }

    #[test]
    fn faith_broken_heals_better() {
        let cleric = RunState::new(ClassId::FaithBroken, 10);
        let wretch = RunState::new(ClassId::Wretched, 10);
        let holy = ClassKit::for_class(ClassId::FaithBroken).mend(&cleric);
        let plain = ClassKit::for_class(ClassId::Wretched).mend(&wretch);
        assert_eq!(holy, Mend { amount: 33, stamina_cost: 3 });
        assert_eq!(plain, Mend { amount: 16, stamina_cost: 5 });
    }

    #[test]
    fn deathward_trims_incoming() {
        let kit = ClassKit::for_class(ClassId::Gravebound);
        assert_eq!(kit.incoming(20, &mut rng()), 18);
    }

    #[test]
    fn martyr_bonus_below_quarter_health() {
        let mut run = RunState::new(ClassId::FaithBroken, 10);
        let kit = ClassKit::for_class(ClassId::FaithBroken);
        assert_eq!(kit.outgoing(20, &run, false, &mut rng()), 20);
        let max = run.max_health();
        run.take_damage(max - max / 5);
        assert_eq!(kit.outgoing(20, &run, false, &mut rng()), 30);
    }

    #[test]
    fn underdog_needs_stronger_enemy() {
        let run = RunState::new(ClassId::Wretched, 10);
        let kit = ClassKit::for_class(ClassId::Wretched);
        assert_eq!(kit.outgoing(10, &run, true, &mut rng()), 12);
        assert_eq!(kit.outgoing(10, &run, false, &mut rng()), 10);
    }

    #[test]
    fn vampiric_heals_on_kill() {
        let run = RunState::new(ClassId::SoulLeech, 10);
        assert_eq!(ClassKit::for_class(ClassId::SoulLeech).on_kill(&run), 5);
        let other = RunState::new(ClassId::Wretched, 10);
        assert_eq!(ClassKit::for_class(ClassId::Wretched).on_kill(&other), 0);
    }
}
