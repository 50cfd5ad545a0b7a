//! Interfaces between the decision engine and the host world.
//!
//! The host owns rendering, physics and entity bookkeeping. Controllers only
//! read a [`Perception`] snapshot and hand back an [`Effect`] to apply.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use skirmish_common::EntityId;
use std::collections::HashMap;

/// Snapshot of what a combat entity perceives about its current target.
///
/// Valid at the moment it was produced only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    /// Distance to the target in world units
    pub distance: f32,
    /// Bearing to the target in radians (any range, normalized by the encoder)
    pub angle: f32,
    /// Own health as a percentage (0-100)
    pub own_health_pct: f32,
    /// Target health as a percentage (0-100)
    pub target_health_pct: f32,
    /// Whether the target is the primary hostile (usually the player)
    pub is_hostile_primary: bool,
    /// Number of allied entities nearby
    pub nearby_ally_count: u32,
}

impl Perception {
    /// Creates a perception of a primary hostile at full health on both sides.
    #[must_use]
    pub const fn hostile(distance: f32, angle: f32) -> Self {
        Self {
            distance,
            angle,
            own_health_pct: 100.0,
            target_health_pct: 100.0,
            is_hostile_primary: true,
            nearby_ally_count: 0,
        }
    }

    /// Sets own health percentage.
    #[must_use]
    pub const fn with_own_health(mut self, pct: f32) -> Self {
        self.own_health_pct = pct;
        self
    }

    /// Sets target health percentage.
    #[must_use]
    pub const fn with_target_health(mut self, pct: f32) -> Self {
        self.target_health_pct = pct;
        self
    }

    /// Sets the nearby ally count.
    #[must_use]
    pub const fn with_allies(mut self, count: u32) -> Self {
        self.nearby_ally_count = count;
        self
    }

    /// Marks the target as a non-hostile (ally or neutral).
    #[must_use]
    pub const fn non_hostile(mut self) -> Self {
        self.is_hostile_primary = false;
        self
    }
}

/// Skill invocations an entity can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillKind {
    /// Melee strike at the current target
    Strike,
    /// Self heal
    Heal,
    /// Buff nearby allies
    Buff,
}

/// What the host should do with the entity this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Move along a vector (unit length scaled by a speed factor in `[0, 1]`)
    Move(Vec2),
    /// Stand still
    Hold,
    /// Invoke a skill
    Skill(SkillKind),
}

/// World interface for perception and effect application.
pub trait CombatWorld {
    /// Returns the entity's current perception, or `None` when it has no target.
    fn perceive(&self, entity: EntityId) -> Option<Perception>;
    /// Applies a chosen effect to the entity.
    fn apply_effect(&mut self, entity: EntityId, effect: Effect);
}

/// Scripted world for tests and tooling: perceptions are set by hand and
/// applied effects are recorded.
#[derive(Debug, Default)]
pub struct ScriptedWorld {
    perceptions: HashMap<EntityId, Perception>,
    applied: Vec<(EntityId, Effect)>,
}

impl ScriptedWorld {
    /// Creates an empty scripted world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets what an entity perceives on subsequent ticks.
    pub fn set_perception(&mut self, entity: EntityId, perception: Perception) {
        self.perceptions.insert(entity, perception);
    }

    /// Removes an entity's target.
    pub fn clear_perception(&mut self, entity: EntityId) {
        self.perceptions.remove(&entity);
    }

    /// Returns all effects applied so far, in order.
    #[must_use]
    pub fn applied(&self) -> &[(EntityId, Effect)] {
        &self.applied
    }

    /// Returns the most recent effect applied to an entity.
    #[must_use]
    pub fn last_effect(&self, entity: EntityId) -> Option<Effect> {
        self.applied
            .iter()
            .rev()
            .find(|(id, _)| *id == entity)
            .map(|(_, effect)| *effect)
    }
}

impl CombatWorld for ScriptedWorld {
    fn perceive(&self, entity: EntityId) -> Option<Perception> {
        self.perceptions.get(&entity).copied()
    }

    fn apply_effect(&mut self, entity: EntityId, effect: Effect) {
        self.applied.push((entity, effect));
    }
}
