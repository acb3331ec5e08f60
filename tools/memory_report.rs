/// Memory Report — prints what the entity remembers about the player.
///
/// Usage: memory_report [<memory.json>] [--json] [--history <n>]
///
/// Without a path, reads memory/entity.json. `--json` prints the adaptation
/// snapshot as JSON instead of the summary; `--history` limits how many
/// betrayals and class picks are listed.

use descent_engine::core::memory::BehaviorMemory;
use std::path::PathBuf;
use std::process;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: memory_report [<memory.json>] [--json] [--history <n>]");
        process::exit(0);
    }

    let mut path = PathBuf::from("memory/entity.json");
    let mut as_json = false;
    let mut history = 10usize;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => as_json = true,
            "--history" if i + 1 < args.len() => {
                i += 1;
                history = args[i].parse().unwrap_or(10);
            }
            other if !other.starts_with("--") => path = PathBuf::from(other),
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let memory = match BehaviorMemory::inspect(&path) {
        Ok(memory) => memory,
        Err(e) => {
            eprintln!("ERROR: cannot read {}: {}", path.display(), e);
            process::exit(1);
        }
    };
    let snapshot = memory.adaptation_snapshot();

    if as_json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("ERROR: could not encode snapshot: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let doc = memory.document();
    println!("=== Entity Memory: {} ===\n", path.display());
    println!("Deaths:            {}", snapshot.deaths);
    println!("Deepest floor:     {}", doc.floors_cleared);
    println!("Fights:            {} ({} passive, {} aggressive)", doc.total_fights, doc.passive_fights, doc.aggressive_fights);
    println!("Behavior:          {}", snapshot.behavior_type.as_str());
    println!(
        "Dodges:            {} left / {} right ({})",
        doc.dodge_left_count,
        doc.dodge_right_count,
        snapshot.dodge_preference.as_str()
    );
    println!("Repeated actions:  {}", snapshot.repeat_actions);
    println!(
        "Favorite weapon:   {}",
        snapshot.most_used_weapon.as_deref().unwrap_or("-")
    );

    if !snapshot.boss_deaths.is_empty() {
        println!("\nDeaths by boss:");
        for (boss, count) in &snapshot.boss_deaths {
            println!("  {:<28} {}", boss, count);
        }
    }
    if !doc.boss_defeat_order.is_empty() {
        println!("\nBosses defeated: {}", doc.boss_defeat_order.join(" -> "));
    }
    if !doc.class_history.is_empty() {
        let picks: Vec<&str> = doc
            .class_history
            .iter()
            .rev()
            .take(history)
            .map(|c| c.name())
            .collect();
        println!("\nRecent classes: {}", picks.join(", "));
    }
    if !doc.skills_unlocked.is_empty() {
        println!("\nSkills unlocked:   {}", doc.skills_unlocked.len());
    }
    if !doc.betrayals.is_empty() {
        println!("\nBetrayals (never forgotten):");
        for b in doc.betrayals.iter().rev().take(history) {
            println!("  run {}: {} ({})", b.run, b.npc, b.kind);
        }
    }
    if !doc.extra.is_empty() {
        let keys: Vec<&str> = doc.extra.keys().map(String::as_str).collect();
        println!("\nUnrecognized keys kept: {}", keys.join(", "));
    }
}
