/// Static class catalog: starting stats, passives, weapons and items.
use serde::{Deserialize, Serialize};

use super::stats::Stats;

/// The six playable classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassId {
    AshDancer,
    Gravebound,
    SoulLeech,
    VoidProphet,
    FaithBroken,
    Wretched,
}

impl ClassId {
    pub const ALL: [ClassId; 6] = [
        ClassId::AshDancer,
        ClassId::Gravebound,
        ClassId::SoulLeech,
        ClassId::VoidProphet,
        ClassId::FaithBroken,
        ClassId::Wretched,
    ];

    /// Resolve a 1-based menu choice. Anything out of range is Wretched.
    pub fn from_choice(choice: u8) -> Self {
        match choice {
            1 => Self::AshDancer,
            2 => Self::Gravebound,
            3 => Self::SoulLeech,
            4 => Self::VoidProphet,
            5 => Self::FaithBroken,
            _ => Self::Wretched,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::AshDancer => 0,
            Self::Gravebound => 1,
            Self::SoulLeech => 2,
            Self::VoidProphet => 3,
            Self::FaithBroken => 4,
            Self::Wretched => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AshDancer => "Ash Dancer",
            Self::Gravebound => "Gravebound",
            Self::SoulLeech => "Soul Leech",
            Self::VoidProphet => "Void Prophet",
            Self::FaithBroken => "Faith Broken",
            Self::Wretched => "Wretched",
        }
    }

    pub fn profile(&self) -> ClassProfile {
        match self {
            Self::AshDancer => ClassProfile {
                class: *self,
                stats: Stats::new(8, 16, 10, 8, 14, 12),
                passive: Passive::EtherealStep,
                weapon: Weapon::new("Twinblades", "Twinblades", 25),
                starting_item: InventoryItem::new("Smoke Bomb", 3, "Blind enemy for 1 turn"),
                flavor: "Swift as shadow, deadly as memory.",
            },
            Self::Gravebound => ClassProfile {
                class: *self,
                stats: Stats::new(14, 8, 8, 12, 16, 16),
                passive: Passive::Deathward,
                weapon: Weapon::new("Bone Greatblade", "Greatblade", 40),
                starting_item: InventoryItem::new("Grave Dust", 2, "Heal 30 HP over 3 turns"),
                flavor: "Born from death, returning to death.",
            },
            Self::SoulLeech => ClassProfile {
                class: *self,
                stats: Stats::new(10, 12, 14, 10, 12, 10),
                passive: Passive::Vampiric,
                weapon: Weapon::new("Soulbane Dagger", "Claw Daggers", 20),
                starting_item: InventoryItem::new("Blood Vial", 4, "Heal 15 HP instantly"),
                flavor: "Hunger defines you. Feast defines your enemies.",
            },
            Self::VoidProphet => ClassProfile {
                class: *self,
                stats: Stats::new(8, 10, 18, 14, 10, 8),
                passive: Passive::VoidSight,
                weapon: Weapon::new("Spell Knife", "Spell Knife", 30),
                starting_item: InventoryItem::new("Echo Flask", 3, "Copy enemy's last attack"),
                flavor: "The void whispers. You listen. Others scream.",
            },
            Self::FaithBroken => ClassProfile {
                class: *self,
                stats: Stats::new(12, 8, 8, 18, 14, 12),
                passive: Passive::MartyrsResolve,
                weapon: Weapon::new("Shattered Faith Hammer", "Faith Hammer", 38),
                starting_item: InventoryItem::new(
                    "Broken Prayer",
                    2,
                    "Reduce enemy damage by 50% for 2 turns",
                ),
                flavor: "Your god abandoned you. Now you abandon mercy.",
            },
            Self::Wretched => ClassProfile {
                class: *self,
                stats: Stats::uniform(12),
                passive: Passive::Underdog,
                weapon: Weapon::new("Bonk Stick", "Bonk Stick", 15),
                starting_item: InventoryItem::new("Nothing", 0, "Disappointment"),
                flavor: "You have nothing. You are nothing. Perfect.",
            },
        }
    }
}

/// Class passive abilities. Behavior lives in `core::classes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Passive {
    /// 10% chance to evade any hit.
    EtherealStep,
    /// 10% damage reduction from all sources.
    Deathward,
    /// Regain 5% of max health on kill.
    Vampiric,
    /// +15% critical strike chance.
    VoidSight,
    /// +50% damage while below 25% health.
    MartyrsResolve,
    /// +2 damage against stronger enemies.
    Underdog,
}

impl Passive {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EtherealStep => "Ethereal Step",
            Self::Deathward => "Deathward",
            Self::Vampiric => "Vampiric",
            Self::VoidSight => "Void Sight",
            Self::MartyrsResolve => "Martyr's Resolve",
            Self::Underdog => "Underdog",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    /// Weapon family; this is the key recorded in the usage histogram.
    pub kind: String,
    pub damage: u32,
}

impl Weapon {
    pub fn new(name: &str, kind: &str, damage: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            damage,
        }
    }
}

/// A carried consumable. Cleared on death.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    pub uses: u32,
    pub effect: String,
}

impl InventoryItem {
    pub fn new(name: &str, uses: u32, effect: &str) -> Self {
        Self {
            name: name.to_string(),
            uses,
            effect: effect.to_string(),
        }
    }

    pub fn use_effect(&self) -> ItemEffect {
        ItemEffect::parse(&self.effect)
    }
}

/// What using an item does, read off its effect text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEffect {
    Heal(u32),
    HealOverTime { amount: u32, turns: u8 },
    /// The enemy's next actions miss.
    Blind { turns: u8 },
    /// Enemy damage is halved.
    Weaken { turns: u8 },
    /// The next strike repeats the enemy's last hit.
    Mirror,
    Disappointment,
    /// Gear and anything unrecognised: using it changes nothing.
    Inert,
}

impl ItemEffect {
    /// Keyword match in the order the catalog is written: heals first, then
    /// blinding, weakening, mirroring. Numbers in the text give the amounts.
    pub fn parse(text: &str) -> Self {
        let numbers: Vec<u32> = text
            .split(|c: char| !c.is_ascii_digit())
            .filter_map(|n| n.parse().ok())
            .collect();
        let turns = |default: u8| {
            numbers
                .last()
                .map_or(default, |n| (*n).clamp(1, u8::MAX as u32) as u8)
        };

        if text.contains("Heal") {
            let amount = numbers.first().copied().unwrap_or(0);
            if text.contains("over") && numbers.len() > 1 {
                ItemEffect::HealOverTime {
                    amount,
                    turns: turns(3),
                }
            } else {
                ItemEffect::Heal(amount)
            }
        } else if text.contains("Blind") {
            ItemEffect::Blind { turns: turns(1) }
        } else if text.contains("Reduce enemy damage") {
            ItemEffect::Weaken { turns: turns(2) }
        } else if text.contains("Copy enemy's last attack") {
            ItemEffect::Mirror
        } else if text.contains("Disappointment") {
            ItemEffect::Disappointment
        } else {
            ItemEffect::Inert
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ItemEffect::Heal(amount) => format!("Healed {} HP instantly", amount),
            ItemEffect::HealOverTime { amount, turns } => {
                format!("{} HP will mend over {} turns", amount, turns)
            }
            ItemEffect::Blind { turns: 1 } => "Enemy blinded for 1 turn".to_string(),
            ItemEffect::Blind { turns } => format!("Enemy blinded for {} turns", turns),
            ItemEffect::Weaken { turns } => {
                format!("Enemy damage reduced by 50% for {} turns", turns)
            }
            ItemEffect::Mirror => "Enemy attack copied and ready to use".to_string(),
            ItemEffect::Disappointment => "You feel disappointed. Nothing happens.".to_string(),
            ItemEffect::Inert => "Item used".to_string(),
        }
    }
}

/// Everything a class contributes at character creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProfile {
    pub class: ClassId,
    pub stats: Stats,
    pub passive: Passive,
    pub weapon: Weapon,
    pub starting_item: InventoryItem,
    pub flavor: &'static str,
}

impl ClassProfile {
    pub fn max_health(&self) -> u32 {
        50 + self.stats.vitality * 5
    }

    pub fn max_stamina(&self) -> u32 {
        50 + self.stats.endurance * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_choice_is_wretched() {
        assert_eq!(ClassId::from_choice(0), ClassId::Wretched);
        assert_eq!(ClassId::from_choice(42), ClassId::Wretched);
        assert_eq!(ClassId::from_choice(1), ClassId::AshDancer);
    }

    #[test]
    fn derived_pools_follow_stats() {
        let profile = ClassId::Gravebound.profile();
        assert_eq!(profile.max_health(), 50 + 16 * 5);
        assert_eq!(profile.max_stamina(), 50 + 16 * 3);
    }

    #[test]
    fn starting_items_parse_to_their_effects() {
        let effect = |class: ClassId| class.profile().starting_item.use_effect();
        assert_eq!(effect(ClassId::AshDancer), ItemEffect::Blind { turns: 1 });
        assert_eq!(
            effect(ClassId::Gravebound),
            ItemEffect::HealOverTime {
                amount: 30,
                turns: 3
            }
        );
        assert_eq!(effect(ClassId::SoulLeech), ItemEffect::Heal(15));
        assert_eq!(effect(ClassId::VoidProphet), ItemEffect::Mirror);
        assert_eq!(effect(ClassId::FaithBroken), ItemEffect::Weaken { turns: 2 });
        assert_eq!(effect(ClassId::Wretched), ItemEffect::Disappointment);
    }

    #[test]
    fn gear_is_inert() {
        assert_eq!(ItemEffect::parse("+7 damage, +2 defense"), ItemEffect::Inert);
        assert_eq!(ItemEffect::parse(""), ItemEffect::Inert);
        assert_eq!(ItemEffect::Inert.describe(), "Item used");
    }

    #[test]
    fn every_class_has_a_distinct_passive() {
        let mut seen = Vec::new();
        for class in ClassId::ALL {
            let passive = class.profile().passive;
            assert!(!seen.contains(&passive), "duplicate passive {:?}", passive);
            seen.push(passive);
        }
    }
}
