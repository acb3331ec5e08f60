/// Enemy action archetypes and boss phase schedules.
use serde::{Deserialize, Serialize};

/// A named enemy/boss action archetype.
///
/// Content can name patterns by tag; unknown tags survive as
/// `Unknown(tag)` and resolve as a plain attack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pattern {
    Strike,
    Feint,
    Sweep,
    PhaseShift,
    CorruptCast,
    VoidGrab,
    CounterAttack,
    AreaAttack,
    PredictDodge,
    Interrupt,
    Pressure,
    Defend,
    DesperationAttack,
    FinalGambit,
    Unknown(String),
}

impl Pattern {
    /// The six archetypes a generated boss samples its pattern list from.
    pub const BOSS_POOL: [Pattern; 6] = [
        Pattern::Strike,
        Pattern::Feint,
        Pattern::Sweep,
        Pattern::PhaseShift,
        Pattern::CorruptCast,
        Pattern::VoidGrab,
    ];

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "strike" => Self::Strike,
            "feint" => Self::Feint,
            "sweep" => Self::Sweep,
            "phase_shift" => Self::PhaseShift,
            "corrupt_cast" => Self::CorruptCast,
            "void_grab" => Self::VoidGrab,
            "counter_attack" => Self::CounterAttack,
            "area_attack" => Self::AreaAttack,
            "predict_dodge" => Self::PredictDodge,
            "interrupt" => Self::Interrupt,
            "pressure" => Self::Pressure,
            "defend" => Self::Defend,
            "desperation_attack" => Self::DesperationAttack,
            "final_gambit" => Self::FinalGambit,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Strike => "strike",
            Self::Feint => "feint",
            Self::Sweep => "sweep",
            Self::PhaseShift => "phase_shift",
            Self::CorruptCast => "corrupt_cast",
            Self::VoidGrab => "void_grab",
            Self::CounterAttack => "counter_attack",
            Self::AreaAttack => "area_attack",
            Self::PredictDodge => "predict_dodge",
            Self::Interrupt => "interrupt",
            Self::Pressure => "pressure",
            Self::Defend => "defend",
            Self::DesperationAttack => "desperation_attack",
            Self::FinalGambit => "final_gambit",
            Self::Unknown(tag) => tag,
        }
    }

    /// Actions that land in full even after a successful dodge.
    pub fn ignores_dodge(&self) -> bool {
        matches!(
            self,
            Self::AreaAttack | Self::Sweep | Self::PhaseShift | Self::Feint | Self::PredictDodge
        )
    }

    /// Narration template. `{enemy}` is bound to the attacker's name.
    pub fn template(&self) -> &'static str {
        match self {
            Self::Strike => "{enemy} strikes with corrupted force!",
            Self::Feint => "{enemy} feints and strikes your exposed flank!",
            Self::Sweep => "{enemy} sweeps the whole chamber!",
            Self::PhaseShift => "{enemy} phases through reality to strike!",
            Self::CorruptCast => "{enemy} casts corrupted code fragments!",
            Self::VoidGrab => "{enemy} drags you toward the void!",
            Self::CounterAttack => "{enemy} counters your aggression!",
            Self::AreaAttack => "{enemy} unleashes a wide, sweeping attack!",
            Self::PredictDodge => "{enemy} is already where you land!",
            Self::Interrupt => "{enemy} interrupts your focus! Stamina drained!",
            Self::Pressure => "{enemy} applies relentless pressure!",
            Self::Defend => "{enemy} braces behind its guard.",
            Self::DesperationAttack => "{enemy} lashes out in desperation!",
            Self::FinalGambit => "{enemy} gambles everything on one blow!",
            Self::Unknown(_) => "{enemy} attacks!",
        }
    }
}

/// What a boss gains when a phase threshold fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    #[serde(default)]
    pub aggression_delta: f32,
    #[serde(default)]
    pub added_patterns: Vec<Pattern>,
}

/// One health-fraction threshold in a phase schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTrigger {
    /// Fires once health / max_health drops to or below this fraction.
    pub fraction: f32,
    pub escalation: Escalation,
}

/// Ordered health thresholds at which a boss escalates. Regular enemies
/// carry an empty schedule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseSchedule {
    triggers: Vec<PhaseTrigger>,
}

impl PhaseSchedule {
    /// Build a schedule; triggers are sorted from highest fraction to lowest
    /// so they fire in order as health falls.
    pub fn new(mut triggers: Vec<PhaseTrigger>) -> Self {
        for trigger in &mut triggers {
            trigger.fraction = trigger.fraction.clamp(0.0, 1.0);
        }
        triggers.sort_by(|a, b| b.fraction.total_cmp(&a.fraction));
        Self { triggers }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard boss schedule: phase 2 at 75% (aggression +0.2),
    /// phase 3 at 35% (desperation_attack and final_gambit join the set).
    pub fn standard_boss() -> Self {
        Self::new(vec![
            PhaseTrigger {
                fraction: 0.75,
                escalation: Escalation {
                    aggression_delta: 0.2,
                    added_patterns: Vec::new(),
                },
            },
            PhaseTrigger {
                fraction: 0.35,
                escalation: Escalation {
                    aggression_delta: 0.0,
                    added_patterns: vec![Pattern::DesperationAttack, Pattern::FinalGambit],
                },
            },
        ])
    }

    pub fn triggers(&self) -> &[PhaseTrigger] {
        &self.triggers
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip_for_known_patterns() {
        for pattern in Pattern::BOSS_POOL.iter() {
            assert_eq!(&Pattern::from_tag(pattern.tag()), pattern);
        }
    }

    #[test]
    fn unknown_tag_is_preserved() {
        let p = Pattern::from_tag("glitch_howl");
        assert_eq!(p, Pattern::Unknown("glitch_howl".to_string()));
        assert_eq!(p.tag(), "glitch_howl");
        assert!(!p.ignores_dodge());
    }

    #[test]
    fn schedule_sorts_descending() {
        let schedule = PhaseSchedule::new(vec![
            PhaseTrigger {
                fraction: 0.2,
                escalation: Escalation {
                    aggression_delta: 0.0,
                    added_patterns: vec![],
                },
            },
            PhaseTrigger {
                fraction: 0.9,
                escalation: Escalation {
                    aggression_delta: 0.1,
                    added_patterns: vec![],
                },
            },
        ]);
        let fractions: Vec<f32> = schedule.triggers().iter().map(|t| t.fraction).collect();
        assert_eq!(fractions, vec![0.9, 0.2]);
    }

    #[test]
    fn standard_boss_schedule() {
        let schedule = PhaseSchedule::standard_boss();
        assert_eq!(schedule.triggers().len(), 2);
        assert_eq!(schedule.triggers()[0].fraction, 0.75);
        assert_eq!(schedule.triggers()[1].escalation.added_patterns.len(), 2);
        assert!(PhaseSchedule::empty().is_empty());
    }

    #[test]
    fn area_attacks_ignore_dodge() {
        assert!(Pattern::AreaAttack.ignores_dodge());
        assert!(!Pattern::Strike.ignores_dodge());
    }
}
