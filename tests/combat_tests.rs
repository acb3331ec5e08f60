/// Combat integration tests — full encounters against generated enemies.
use descent_engine::core::combat::{CombatEvent, CombatResolver, Combatant, EncounterReport, StunCause};
use descent_engine::core::config::CombatConfig;
use descent_engine::core::generator::ContentGenerator;
use descent_engine::core::input::{channel, ActionSource, ScriptedInput};
use descent_engine::core::memory::BehaviorMemory;
use descent_engine::core::run_state::RunState;
use descent_engine::schema::action::{Outcome, PlayerAction, Side};
use descent_engine::schema::class::ClassId;
use descent_engine::schema::content::{Boss, BossSpecial};
use descent_engine::schema::pattern::{Pattern, PhaseSchedule};
use descent_engine::schema::stats::Stats;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::thread;
use std::time::Duration;

fn fight(
    memory: &mut BehaviorMemory,
    run: &mut RunState,
    enemy: Combatant,
    input: &mut dyn ActionSource,
    seed: u64,
) -> EncounterReport {
    let generator = ContentGenerator::in_memory();
    let config = CombatConfig::default();
    let mut rng = StdRng::seed_from_u64(seed);
    CombatResolver::new(memory, &generator, &config).start_encounter(run, enemy, input, &mut rng)
}

fn knight() -> Combatant {
    Combatant::from_boss(&Boss {
        name: "Ash-Soaked Knight".to_string(),
        health: 140,
        stats: Stats::uniform(8),
        patterns: vec![Pattern::Strike, Pattern::Sweep, Pattern::CorruptCast],
        aggression: 0.5,
        special: BossSpecial::EntityCorruption,
        phase_schedule: PhaseSchedule::standard_boss(),
    })
}

#[test]
fn every_encounter_ends_exactly_once() {
    let generator = ContentGenerator::in_memory();
    let scripts = [
        PlayerAction::Attack,
        PlayerAction::Special,
        PlayerAction::Dodge(Side::Right),
        PlayerAction::Heal,
    ];
    for seed in 0..24u64 {
        let mut memory = BehaviorMemory::in_memory();
        let class = ClassId::ALL[seed as usize % ClassId::ALL.len()];
        let mut run = RunState::new(class, 10);
        run.gain_ashlight(40);
        let fv = run.feature_vector(&memory.adaptation_snapshot());
        let mob = generator.generate_mob(&fv, 1, &mut StdRng::seed_from_u64(seed));
        let mut input = ScriptedInput::repeating(scripts[seed as usize % scripts.len()]);

        let report = fight(&mut memory, &mut run, Combatant::from_mob(&mob), &mut input, seed);

        let finishes = report
            .events
            .iter()
            .filter(|e| matches!(e, CombatEvent::Finished { .. }))
            .count();
        assert_eq!(finishes, 1, "seed {}", seed);
        assert_eq!(
            report.events.last(),
            Some(&CombatEvent::Finished { outcome: report.outcome })
        );
        match report.outcome {
            Outcome::Victory => assert_eq!(report.enemy_health, 0),
            Outcome::Defeat => assert_eq!(memory.deaths(), 1),
            Outcome::Fled => assert!(report.rounds >= 1),
        }
    }
}

#[test]
fn boss_refuses_flight_when_bias_is_high() {
    let mut memory = BehaviorMemory::in_memory();
    memory.set("times_restarted", json!(10)).unwrap();
    let mut run = RunState::new(ClassId::Wretched, 10);
    let fv = run.feature_vector(&memory.adaptation_snapshot());
    assert!(fv.entity_bias() >= 0.3, "bias {}", fv.entity_bias());

    let mut input = ScriptedInput::repeating(PlayerAction::Flee);
    let report = fight(&mut memory, &mut run, knight(), &mut input, 3);

    assert_ne!(report.outcome, Outcome::Fled);
    assert!(report.events.contains(&CombatEvent::Stunned {
        cause: StunCause::FleeDenied
    }));
}

#[test]
fn boss_allows_flight_when_bias_is_low() {
    let mut memory = BehaviorMemory::in_memory();
    let mut run = RunState::new(ClassId::Wretched, 10);
    let fv = run.feature_vector(&memory.adaptation_snapshot());
    assert!(fv.entity_bias() < 0.2, "bias {}", fv.entity_bias());

    let mut input = ScriptedInput::repeating(PlayerAction::Flee);
    let report = fight(&mut memory, &mut run, knight(), &mut input, 3);
    assert_eq!(report.outcome, Outcome::Fled);
    assert_eq!(report.rounds, 1);
}

#[test]
fn boss_phase_never_decreases() {
    for seed in 0..8u64 {
        let mut memory = BehaviorMemory::in_memory();
        let mut run = RunState::new(ClassId::Gravebound, 10);
        run.gain_ashlight(100);
        let mut input = ScriptedInput::new([
            PlayerAction::Attack,
            PlayerAction::Special,
            PlayerAction::Heal,
        ])
        .then(PlayerAction::Attack);
        let report = fight(&mut memory, &mut run, knight(), &mut input, seed);

        let mut phase = 1;
        for event in &report.events {
            if let CombatEvent::PhaseChanged { phase: next, .. } = event {
                assert!(*next > phase, "seed {}: {} after {}", seed, next, phase);
                phase = *next;
            }
        }
        assert_eq!(report.boss_phase, phase);
    }
}

#[test]
fn boss_defeat_is_recorded_on_victory() {
    let mut memory = BehaviorMemory::in_memory();
    let mut run = RunState::new(ClassId::Gravebound, 10);
    let mut weak = knight();
    weak.health = 1;
    weak.max_health = 1;
    let mut input = ScriptedInput::repeating(PlayerAction::Attack);
    let report = fight(&mut memory, &mut run, weak, &mut input, 11);

    assert_eq!(report.outcome, Outcome::Victory);
    assert_eq!(memory.document().boss_defeat_order, vec!["Ash-Soaked Knight".to_string()]);
    assert_eq!(report.ashlight_gained, 25);
}

#[test]
fn silent_channel_stuns_until_the_player_flees() {
    let mut memory = BehaviorMemory::in_memory();
    let mut run = RunState::new(ClassId::AshDancer, 10);
    let (tx, mut input) = channel();
    tx.send(PlayerAction::Flee).unwrap();

    let mut calls = 0;
    let mut source = |view: &descent_engine::core::input::TurnView, _limit: Duration| {
        calls += 1;
        // Answer nothing on the first turn, then let the queued flee through.
        if calls == 1 {
            None
        } else {
            input.next_action(view, Duration::from_millis(50))
        }
    };
    let mut goblin = knight();
    goblin.special = None;
    goblin.schedule = PhaseSchedule::empty();
    let report = fight(&mut memory, &mut run, goblin, &mut source, 5);

    assert_eq!(report.outcome, Outcome::Fled);
    assert!(report.events.contains(&CombatEvent::Stunned {
        cause: StunCause::Timeout
    }));
}

#[test]
fn late_channel_input_is_not_carried_into_the_next_round() {
    let mut memory = BehaviorMemory::in_memory();
    let mut run = RunState::new(ClassId::AshDancer, 10);
    let (late, mut input) = channel();
    let turn = Duration::from_millis(20);

    let mut calls = 0;
    let mut source = |view: &descent_engine::core::input::TurnView, _limit: Duration| {
        calls += 1;
        match calls {
            1 => {
                let action = input.next_action(view, turn);
                // Too late for round one.
                late.send(PlayerAction::Flee).unwrap();
                action
            }
            2 => input.next_action(view, turn),
            _ => {
                let tx = late.clone();
                let sender = thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    tx.send(PlayerAction::Flee).unwrap();
                });
                let action = input.next_action(view, Duration::from_secs(10));
                sender.join().unwrap();
                action
            }
        }
    };
    let mut goblin = knight();
    goblin.special = None;
    goblin.schedule = PhaseSchedule::empty();
    let report = fight(&mut memory, &mut run, goblin, &mut source, 6);

    assert_eq!(report.outcome, Outcome::Fled);
    assert_eq!(report.rounds, 3);
    let stuns = report
        .events
        .iter()
        .filter(|e| **e == CombatEvent::Stunned { cause: StunCause::Timeout })
        .count();
    assert_eq!(stuns, 2);
}

#[test]
fn fleeing_leaves_stamina_and_fight_tally_alone() {
    let generator = ContentGenerator::in_memory();
    let mut memory = BehaviorMemory::in_memory();
    let mut run = RunState::new(ClassId::Gravebound, 10);
    let max = run.max_stamina();
    run.drain_stamina(max);
    let fv = run.feature_vector(&memory.adaptation_snapshot());
    let mob = generator.generate_mob(&fv, 1, &mut StdRng::seed_from_u64(7));
    let mut input = ScriptedInput::new([PlayerAction::Flee]);
    let report = fight(&mut memory, &mut run, Combatant::from_mob(&mob), &mut input, 7);

    assert_eq!(report.outcome, Outcome::Fled);
    assert_eq!(run.stamina(), 0);
    assert_eq!(run.flee_count(), 1);
    let doc = memory.document();
    assert_eq!(doc.total_fights, 0);
    assert_eq!(doc.passive_fights, 0);
    assert_eq!(doc.aggressive_fights, 0);
}

#[test]
fn repeated_attacks_make_the_run_predictable() {
    let mut memory = BehaviorMemory::in_memory();
    let mut run = RunState::new(ClassId::Gravebound, 10);
    let mut tank = knight();
    tank.special = None;
    tank.schedule = PhaseSchedule::empty();
    tank.health = 5_000;
    tank.max_health = 5_000;
    tank.stats = Stats::uniform(1);
    tank.patterns = vec![Pattern::Defend];
    let mut input = ScriptedInput::new([PlayerAction::Attack; 10]).then(PlayerAction::Flee);
    fight(&mut memory, &mut run, tank, &mut input, 8);

    assert!(run.predictability() >= 0.8, "{}", run.predictability());
    assert!(memory.document().repeat_action_count >= 8);
    assert_eq!(memory.document().weapon_usage_histogram["Greatblade"], 10);
}
