/// Descent Sim — plays scripted runs against the engine and prints what the
/// entity threw at the player.
///
/// Usage: descent_sim [--seed <n>] [--class <1-6>] [--floors <n>] [--runs <n>]
///                    [--strategy attack|dodge|flee|reactive]
///                    [--config <file>] [--memory <file>] [--lore <file>] [--in-memory]
///
/// Logging is controlled with RUST_LOG.

use descent_engine::core::combat::EncounterReport;
use descent_engine::core::input::{ActionSource, ScriptedInput, TurnView};
use descent_engine::core::session::{Session, SessionError};
use descent_engine::schema::action::{Outcome, PlayerAction, Side};
use descent_engine::schema::class::ClassId;
use descent_engine::schema::content::RoomKind;
use descent_engine::schema::pattern::Pattern;
use descent_engine::schema::skill::SKILL_ROLL_COST;
use std::process;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Attack,
    Dodge,
    Flee,
    Reactive,
}

impl Strategy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "attack" => Some(Self::Attack),
            "dodge" => Some(Self::Dodge),
            "flee" => Some(Self::Flee),
            "reactive" => Some(Self::Reactive),
            _ => None,
        }
    }

    fn input(self) -> Box<dyn ActionSource> {
        match self {
            Self::Attack => Box::new(ScriptedInput::repeating(PlayerAction::Attack)),
            Self::Dodge => Box::new(ScriptedInput::repeating(PlayerAction::Dodge(Side::Left))),
            Self::Flee => Box::new(ScriptedInput::repeating(PlayerAction::Flee)),
            Self::Reactive => Box::new(reactive),
        }
    }
}

/// Reads the enemy's telegraphed action and answers it.
fn reactive(view: &TurnView, _limit: Duration) -> Option<PlayerAction> {
    if view.health * 3 < view.max_health {
        return Some(PlayerAction::Heal);
    }
    let action = match view.preview {
        Pattern::CounterAttack | Pattern::Strike | Pattern::DesperationAttack => {
            PlayerAction::Dodge(if view.round % 2 == 0 { Side::Left } else { Side::Right })
        }
        Pattern::Defend => PlayerAction::Special,
        _ => PlayerAction::Attack,
    };
    Some(action)
}

struct Args {
    seed: u64,
    class: ClassId,
    floors: u8,
    runs: u32,
    strategy: Strategy,
    config: Option<String>,
    memory: Option<String>,
    lore: Option<String>,
    in_memory: bool,
}

fn main() {
    env_logger::init();
    let args = parse_args();

    let mut builder = Session::builder().seed(args.seed);
    if let Some(ref path) = args.config {
        builder = builder.config_file(path);
    }
    if let Some(ref path) = args.memory {
        builder = builder.memory_path(path);
    }
    if let Some(ref path) = args.lore {
        builder = builder.lore_path(path);
    }
    if args.in_memory {
        builder = builder.in_memory();
    }
    let mut session = match builder.build() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    for run in 1..=args.runs {
        println!("=== Run {} as {} ===", run, args.class.name());
        if let Err(e) = play_run(&mut session, &args) {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    }

    let memory = session.memory();
    println!("\n=== Memory ===");
    println!("Deaths: {}", memory.deaths());
    println!("Dodge preference: {}", memory.dodge_preference().as_str());
    println!("Behavior: {}", memory.behavior_type().as_str());
    if let Some(weapon) = memory.most_used_weapon() {
        println!("Favorite weapon: {}", weapon);
    }
}

fn play_run(session: &mut Session, args: &Args) -> Result<(), SessionError> {
    session.start_run(args.class);
    let mut input = args.strategy.input();

    for floor in 1..=args.floors {
        let chapter = session.plan_chapter()?;
        let kinds: Vec<String> = chapter
            .slots
            .iter()
            .map(|s| match s.chaos {
                Some(chaos) => format!("{:?}*{:?}", s.kind, chaos),
                None => format!("{:?}", s.kind),
            })
            .collect();
        println!("\n-- Floor {} [{}]", floor, kinds.join(" "));
        if chapter.chaos_mode {
            println!("   The Entity has abandoned all pretense of order.");
        }

        for slot in &chapter.slots {
            let report = match slot.kind {
                RoomKind::Safe => {
                    if let Some(whisper) = session.whisper()? {
                        println!("   {}", whisper);
                    }
                    None
                }
                RoomKind::Shop => {
                    let shop = session.visit_shop()?;
                    println!("   {}", shop.flavor);
                    let affordable = shop
                        .offers
                        .iter()
                        .position(|o| session.run().map_or(false, |r| r.ashlight() >= o.price));
                    if let Some(pick) = affordable {
                        let item = session.buy(&shop, pick)?;
                        println!("   Bought {} for {} ashlight", item.name, shop.offers[pick].price);
                    }
                    None
                }
                RoomKind::Combat => Some(session.fight_mob(input.as_mut())?),
                RoomKind::Miniboss => {
                    let (trap, _) = session.spring_trap()?;
                    println!("   Trap: {}", trap.effect);
                    Some(session.fight_mob(input.as_mut())?)
                }
                RoomKind::Boss => Some(session.fight_boss(input.as_mut())?),
                RoomKind::Hearth => {
                    session.rest()?;
                    println!("   The Still Flame mends you.");
                    if session.run().map_or(false, |r| r.ashlight() >= SKILL_ROLL_COST) {
                        let skill = session.roll_skill()?;
                        let equipped = session.equip_skill(skill, skill.slot)?;
                        println!(
                            "   Rolled {} ({}){}",
                            skill.name,
                            skill.slot.as_str(),
                            if equipped { ", equipped" } else { "" }
                        );
                    }
                    None
                }
                RoomKind::Hazard => {
                    let (hazard, outcome) = session.enter_hazard()?;
                    println!("   {}: {}", hazard.name, hazard.description);
                    if outcome.fatal {
                        println!("   The {} claims you on floor {}.", hazard.name, floor);
                        print_profile(session)?;
                        return Ok(());
                    }
                    None
                }
                RoomKind::Secret => {
                    let cache = session.open_secret()?;
                    println!("   Hidden chamber: {} pure ashlight", cache.ashlight);
                    if let Some(lore) = cache.lore {
                        println!("   {}", lore);
                    }
                    None
                }
            };

            if let Some(report) = report {
                print_report(&report);
                if report.outcome == Outcome::Defeat {
                    println!("   You died on floor {}.", floor);
                    print_profile(session)?;
                    return Ok(());
                }
            }
        }

        if !session.descend()? {
            break;
        }
    }

    println!("\n   The descent is over, for now.");
    print_profile(session)
}

fn print_report(report: &EncounterReport) {
    println!(
        "   {} vs {}: {} in {} round(s), dealt {}, took {}{}",
        if report.boss_phase > 0 { "BOSS" } else { "fight" },
        report.enemy,
        report.outcome.tag(),
        report.rounds,
        report.damage_dealt,
        report.damage_taken,
        if report.boss_phase > 1 {
            format!(", reached phase {}", report.boss_phase)
        } else {
            String::new()
        }
    );
}

fn print_profile(session: &Session) -> Result<(), SessionError> {
    println!("\n{}", session.profile()?);
    Ok(())
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        process::exit(0);
    }

    let mut parsed = Args {
        seed: 42,
        class: ClassId::Wretched,
        floors: 5,
        runs: 1,
        strategy: Strategy::Reactive,
        config: None,
        memory: None,
        lore: None,
        in_memory: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" if i + 1 < args.len() => {
                i += 1;
                parsed.seed = args[i].parse().unwrap_or(42);
            }
            "--class" if i + 1 < args.len() => {
                i += 1;
                parsed.class = ClassId::from_choice(args[i].parse().unwrap_or(6));
            }
            "--floors" if i + 1 < args.len() => {
                i += 1;
                parsed.floors = args[i].parse().unwrap_or(5);
            }
            "--runs" if i + 1 < args.len() => {
                i += 1;
                parsed.runs = args[i].parse().unwrap_or(1);
            }
            "--strategy" if i + 1 < args.len() => {
                i += 1;
                parsed.strategy = match Strategy::parse(&args[i]) {
                    Some(s) => s,
                    None => {
                        eprintln!("Unknown strategy: {}", args[i]);
                        process::exit(1);
                    }
                };
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                parsed.config = Some(args[i].clone());
            }
            "--memory" if i + 1 < args.len() => {
                i += 1;
                parsed.memory = Some(args[i].clone());
            }
            "--lore" if i + 1 < args.len() => {
                i += 1;
                parsed.lore = Some(args[i].clone());
            }
            "--in-memory" => parsed.in_memory = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }
    parsed
}

fn print_usage() {
    println!("Usage: descent_sim [--seed <n>] [--class <1-6>] [--floors <n>] [--runs <n>]");
    println!("                   [--strategy attack|dodge|flee|reactive]");
    println!("                   [--config <file>] [--memory <file>] [--lore <file>] [--in-memory]");
    println!();
    println!("Classes: 1 Ash Dancer, 2 Gravebound, 3 Soul Leech, 4 Void Prophet,");
    println!("         5 Faith Broken, 6 Wretched");
}
