//! Combat action vocabulary and effect handlers.
//!
//! The declaration order of [`CombatAction`] is significant: greedy selection
//! breaks ties in favor of the earliest-declared action.

use crate::world::{Effect, Perception, SkillKind};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use skirmish_common::heading;
use std::f32::consts::FRAC_PI_2;
use std::fmt;

/// Number of actions in the vocabulary.
pub const ACTION_COUNT: usize = 9;

/// Speed factor for the cautious approach.
const CAUTIOUS_SPEED: f32 = 0.5;

/// Discrete combat actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatAction {
    /// Charge straight at the target
    Aggressive,
    /// Approach the target at half speed
    Cautious,
    /// Circle the target counter-clockwise
    FlankLeft,
    /// Circle the target clockwise
    FlankRight,
    /// Move directly away from the target
    Retreat,
    /// Do nothing
    Idle,
    /// Melee strike skill
    Strike,
    /// Self-heal skill
    Heal,
    /// Ally buff skill
    Buff,
}

/// Handler turning a perception into the effect to apply.
pub type ActionHandler = fn(&Perception) -> Effect;

impl CombatAction {
    /// All actions in declaration order.
    pub const ALL: [CombatAction; ACTION_COUNT] = [
        CombatAction::Aggressive,
        CombatAction::Cautious,
        CombatAction::FlankLeft,
        CombatAction::FlankRight,
        CombatAction::Retreat,
        CombatAction::Idle,
        CombatAction::Strike,
        CombatAction::Heal,
        CombatAction::Buff,
    ];

    /// Position of this action in [`CombatAction::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable identifier used in persisted knowledge.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Cautious => "cautious",
            Self::FlankLeft => "flank_left",
            Self::FlankRight => "flank_right",
            Self::Retreat => "retreat",
            Self::Idle => "idle",
            Self::Strike => "strike",
            Self::Heal => "heal",
            Self::Buff => "buff",
        }
    }

    /// Looks up an action by its identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == id)
    }

    /// Returns whether this action invokes a skill.
    #[must_use]
    pub const fn is_skill(self) -> bool {
        matches!(self, Self::Strike | Self::Heal | Self::Buff)
    }

    /// Returns the handler for this action.
    #[must_use]
    pub const fn handler(self) -> ActionHandler {
        match self {
            Self::Aggressive => charge,
            Self::Cautious => approach,
            Self::FlankLeft => flank_left,
            Self::FlankRight => flank_right,
            Self::Retreat => retreat,
            Self::Idle => hold,
            Self::Strike => strike,
            Self::Heal => heal,
            Self::Buff => buff,
        }
    }

    /// Resolves the effect of taking this action under a perception.
    #[must_use]
    pub fn effect(self, perception: &Perception) -> Effect {
        (self.handler())(perception)
    }
}

impl fmt::Display for CombatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn toward(perception: &Perception) -> Vec2 {
    heading(perception.angle)
}

fn charge(p: &Perception) -> Effect {
    Effect::Move(toward(p))
}

fn approach(p: &Perception) -> Effect {
    Effect::Move(toward(p) * CAUTIOUS_SPEED)
}

fn flank_left(p: &Perception) -> Effect {
    Effect::Move(heading(p.angle + FRAC_PI_2))
}

fn flank_right(p: &Perception) -> Effect {
    Effect::Move(heading(p.angle - FRAC_PI_2))
}

fn retreat(p: &Perception) -> Effect {
    Effect::Move(-toward(p))
}

fn hold(_: &Perception) -> Effect {
    Effect::Hold
}

fn strike(_: &Perception) -> Effect {
    Effect::Skill(SkillKind::Strike)
}

fn heal(_: &Perception) -> Effect {
    Effect::Skill(SkillKind::Heal)
}

fn buff(_: &Perception) -> Effect {
    Effect::Skill(SkillKind::Buff)
}
