/// Skills rolled at a hearth. Each fits exactly one equip slot.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillSlot {
    Passive,
    Active,
    Hybrid,
}

impl SkillSlot {
    pub const ALL: [SkillSlot; 3] = [SkillSlot::Passive, SkillSlot::Active, SkillSlot::Hybrid];

    pub fn index(&self) -> usize {
        match self {
            Self::Passive => 0,
            Self::Active => 1,
            Self::Hybrid => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passive => "passive",
            Self::Active => "active",
            Self::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skill {
    pub name: &'static str,
    pub effect: &'static str,
    /// Turns between uses; always 0 for passives.
    pub cooldown: u8,
    pub slot: SkillSlot,
}

impl Skill {
    const fn new(name: &'static str, effect: &'static str, cooldown: u8, slot: SkillSlot) -> Self {
        Self {
            name,
            effect,
            cooldown,
            slot,
        }
    }

    pub fn by_name(name: &str) -> Option<Skill> {
        SKILLS.iter().find(|s| s.name == name).copied()
    }
}

/// Passive that adds 2 to between-fight stamina regeneration.
pub const BATTLE_RHYTHM: &str = "Battle Rhythm";

/// Ashlight spent on one roll at a hearth.
pub const SKILL_ROLL_COST: u32 = 50;

pub const SKILLS: [Skill; 15] = [
    Skill::new("Iron Will", "+5% crit chance", 0, SkillSlot::Passive),
    Skill::new("Efficient Movement", "-10% stamina use", 0, SkillSlot::Passive),
    Skill::new(
        "Blood Memory",
        "+2 damage per enemy killed this floor",
        0,
        SkillSlot::Passive,
    ),
    Skill::new(
        "Void Resistance",
        "+15% resistance to all status effects",
        0,
        SkillSlot::Passive,
    ),
    Skill::new(BATTLE_RHYTHM, "Stamina regen +2 per turn", 0, SkillSlot::Passive),
    Skill::new("Dash Slash", "DEX-based gap closer with high crit", 3, SkillSlot::Active),
    Skill::new("Healing Chant", "Heal 25 HP over 3 turns", 5, SkillSlot::Active),
    Skill::new("Phase Step", "Avoid next hit guaranteed", 4, SkillSlot::Active),
    Skill::new(
        "Berserker Rage",
        "+100% damage for 2 turns, -50% defense",
        6,
        SkillSlot::Active,
    ),
    Skill::new("Soul Burn", "INT-based magic attack, ignores armor", 3, SkillSlot::Active),
    Skill::new("Fire Roll", "Dodge + burn nearby enemies", 4, SkillSlot::Hybrid),
    Skill::new(
        "Parry Counter",
        "Perfect block triggers automatic counter",
        3,
        SkillSlot::Hybrid,
    ),
    Skill::new(
        "Weapon Dance",
        "Each different attack type increases damage",
        0,
        SkillSlot::Hybrid,
    ),
    Skill::new("Shadow Step", "Dodge grants invisibility for 1 turn", 5, SkillSlot::Hybrid),
    Skill::new("Life Tap", "Spend HP to restore stamina", 2, SkillSlot::Hybrid),
];
