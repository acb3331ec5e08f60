/// Content generation integration tests — feature vectors in, content out.
use descent_engine::core::config::GenerationConfig;
use descent_engine::core::features::{self, FeatureVector, FEATURE_LEN};
use descent_engine::core::generator::{ContentGenerator, LoreContext, CHAPTER_SLOTS};
use descent_engine::core::lore::{LoreBible, LoreStore};
use descent_engine::core::memory::BehaviorMemory;
use descent_engine::core::run_state::RunState;
use descent_engine::schema::action::ActionKind;
use descent_engine::schema::class::ClassId;
use descent_engine::schema::content::{Ability, RoomKind};
use descent_engine::schema::stats::StatKind;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::path::Path;

fn vector(overrides: &[(usize, f32)]) -> FeatureVector {
    let mut raw = features::DEFAULTS;
    for (slot, value) in overrides {
        raw[*slot] = *value;
    }
    FeatureVector::new(&raw)
}

#[test]
fn entity_bias_stays_in_bounds() {
    let extremes = [
        vector(&[]),
        vector(&[(features::FLOOR, 1.0), (features::DEATHS, 4.0), (features::SANITY, 0.0)]),
        vector(&[(features::FLOOR, 0.0), (features::DEATHS, 0.0), (features::SANITY, 1.0)]),
        vector(&[(features::SANITY, -3.0)]),
        FeatureVector::new(&[f32::NAN; FEATURE_LEN]),
    ];
    for fv in &extremes {
        let bias = fv.entity_bias();
        assert!((0.0..=1.0).contains(&bias), "bias {} out of range", bias);
    }
}

#[test]
fn short_vectors_are_padded() {
    let fv = FeatureVector::new(&[0.5, 0.5]);
    assert_eq!(fv.as_slice().len(), FEATURE_LEN);
    assert_eq!(fv.get(features::SANITY), features::DEFAULTS[features::SANITY]);
}

#[test]
fn chapters_open_safe_and_close_on_the_boss() {
    let generator = ContentGenerator::in_memory();
    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let deaths = seed % 14;
        let chapter = generator.generate_chapter(&vector(&[]), deaths, &mut rng);
        assert_eq!(chapter.slots.len(), CHAPTER_SLOTS);
        assert_eq!(chapter.slots[0].kind, RoomKind::Safe);
        assert_eq!(chapter.slots[CHAPTER_SLOTS - 1].kind, RoomKind::Boss);
        assert_eq!(chapter.chaos_mode, deaths >= 10);
        if !chapter.chaos_mode {
            assert!(chapter.slots.iter().all(|s| s.chaos.is_none()));
        }
    }
}

#[test]
fn every_room_is_reachable() {
    let generator = ContentGenerator::in_memory();
    let mut rng = StdRng::seed_from_u64(21);
    for flee in [0.0, 1.0] {
        let layout = generator.generate_layout(&vector(&[(features::FLEE_COUNT, flee)]), 2, &mut rng);
        assert!(layout.room_count() >= 5);

        let mut seen = BTreeSet::new();
        let mut frontier = vec![0usize];
        while let Some(room) = frontier.pop() {
            if seen.insert(room) {
                frontier.extend(layout.rooms[room].connections.iter().copied());
            }
        }
        assert_eq!(seen.len(), layout.room_count());
    }
}

#[test]
fn habits_shape_traps() {
    let generator = ContentGenerator::in_memory();
    let mut rng = StdRng::seed_from_u64(4);
    let healer = vector(&[(features::HEAL_SPAM, 0.6)]);
    let farmer = vector(&[(features::MOB_FARM, 0.9)]);
    for _ in 0..10 {
        let trap = generator.generate_trap(&healer, 1, &mut rng);
        assert_eq!(trap.kind.tag(), "poison_mist");
        assert!((1..=5).contains(&trap.severity));
        assert_eq!(generator.generate_trap(&farmer, 1, &mut rng).kind.tag(), "ambush_spawn");
    }
}

#[test]
fn shop_prices_are_positive() {
    let generator = ContentGenerator::in_memory();
    let mut rng = StdRng::seed_from_u64(9);
    let deep = vector(&[(features::FLOOR, 1.0), (features::DEATHS, 4.0)]);
    for fv in [vector(&[]), deep] {
        let shop = generator.generate_shop(&fv, 3, 0, &mut rng);
        assert!(!shop.offers.is_empty());
        assert!(shop.offers.iter().all(|o| o.price >= 1));
    }
}

#[test]
fn lore_comes_from_the_loaded_bible() {
    let bible = LoreBible::load_from_ron(Path::new("tests/fixtures/lore.ron")).unwrap();
    let generator = ContentGenerator::new(LoreStore::with_bible(bible.clone()), GenerationConfig::default());
    let mut rng = StdRng::seed_from_u64(2);
    // Faith stays low so the devout override never fires.
    let fv = vector(&[(features::STATS + StatKind::Faith.index(), 0.1)]);
    for _ in 0..10 {
        let line = generator.generate_lore(&fv, 1, &LoreContext::Plain, &mut rng);
        assert!(bible.phrases.contains(&line), "unexpected line: {}", line);
    }
    let death = generator.generate_lore(&fv, 1, &LoreContext::Death, &mut rng);
    assert!(death.starts_with("COMPILED: "));
}

#[test]
fn predictable_players_meet_prediction() {
    let memory = BehaviorMemory::in_memory();
    let mut run = RunState::new(ClassId::Wretched, 10);
    for _ in 0..10 {
        run.record_action(ActionKind::Attack);
    }
    let fv = run.feature_vector(&memory.adaptation_snapshot());
    assert!(fv.predictability() >= 0.8);

    let generator = ContentGenerator::in_memory();
    let mob = generator.generate_mob(&fv, 1, &mut StdRng::seed_from_u64(0));
    assert!(mob.has(Ability::PatternPrediction));
    assert!(generator.generate_ui_distortion(&fv).enabled);
}
