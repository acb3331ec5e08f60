/// Behavior memory integration tests — documents on disk across sessions.
use descent_engine::core::memory::{BehaviorMemory, BehaviorType, DodgePreference, MemoryError};
use descent_engine::schema::action::{ActionKind, PlayerAction, Side};
use serde_json::json;
use std::path::{Path, PathBuf};

fn fixture_copy(dir: &tempfile::TempDir, fixture: &str) -> PathBuf {
    let target = dir.path().join("entity.json");
    std::fs::copy(Path::new("tests/fixtures").join(fixture), &target).unwrap();
    target
}

#[test]
fn legacy_document_loads_with_defaults_for_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let memory = BehaviorMemory::open(fixture_copy(&dir, "legacy_memory.json"));

    assert_eq!(memory.dodge_preference(), DodgePreference::Left);
    assert_eq!(memory.behavior_type(), BehaviorType::Passive);
    assert_eq!(memory.most_used_weapon(), Some("Twinblades"));
    assert_eq!(memory.deaths(), 3);
    // Keys the fixture never mentions come back as defaults.
    assert_eq!(memory.document().repeat_action_count, 0);
    assert!(memory.document().betrayals.is_empty());
}

#[test]
fn unknown_keys_survive_a_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture_copy(&dir, "legacy_memory.json");
    let mut memory = BehaviorMemory::open(&path);
    memory.track_combat_action(PlayerAction::Dodge(Side::Right), None);

    let reopened = BehaviorMemory::open(&path);
    assert_eq!(reopened.get("favorite_npc"), Some(json!("Ash Sister")));
    assert_eq!(reopened.get("speedrun_splits"), Some(json!([41.5, 93.0])));
    assert_eq!(reopened.document().dodge_right_count, 3);
}

#[test]
fn corrupt_document_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture_copy(&dir, "corrupt_memory.json");
    let memory = BehaviorMemory::open(&path);

    assert_eq!(memory.deaths(), 0);
    assert_eq!(memory.document().dodge_left_count, 0);
    assert!(dir.path().join("entity.json.corrupt").exists());
    // A fresh, valid document replaced it.
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&contents).is_ok());
}

#[test]
fn deaths_accumulate_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory/entity.json");
    {
        let mut memory = BehaviorMemory::open(&path);
        memory.record_death(Some("The Watcher in Code"), 2);
        memory.record_death(None, 1);
    }
    let mut memory = BehaviorMemory::open(&path);
    memory.record_death(Some("The Watcher in Code"), 3);

    let reopened = BehaviorMemory::open(&path);
    assert_eq!(reopened.document().times_restarted, 3);
    assert_eq!(reopened.document().deaths_per_boss["The Watcher in Code"], 2);
    assert_eq!(reopened.document().floors_cleared, 3);
}

#[test]
fn betrayals_are_permanent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entity.json");
    {
        let mut memory = BehaviorMemory::open(&path);
        memory.add_betrayal("Blacktongue", "abandoned");
        memory.reset_run_data();
    }
    let memory = BehaviorMemory::open(&path);
    assert!(memory.is_betrayed("Blacktongue"));
    assert!(!memory.is_betrayed("Ash Sister"));
}

#[test]
fn counters_never_move_backwards() {
    let dir = tempfile::tempdir().unwrap();
    let mut memory = BehaviorMemory::open(fixture_copy(&dir, "legacy_memory.json"));
    let err = memory.set("dodge_left_count", json!(1)).unwrap_err();
    assert!(matches!(err, MemoryError::CounterRegression { current: 7, requested: 1, .. }));
    assert!(memory.set("dodge_left_count", json!(9)).is_ok());
    assert!(memory.increment("speedrun_attempts", 2).is_ok());
    assert_eq!(memory.get("speedrun_attempts"), Some(json!(2)));
}

#[test]
fn snapshot_is_stable_without_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mut memory = BehaviorMemory::open(fixture_copy(&dir, "legacy_memory.json"));
    memory.track_repeat_actions(&[ActionKind::Heal; 3]);
    let first = memory.adaptation_snapshot();
    let second = memory.adaptation_snapshot();
    assert_eq!(first, second);
    assert_eq!(first.repeat_actions, 1);
    assert_eq!(first.boss_deaths["Ash-Soaked Knight"], 2);
}
