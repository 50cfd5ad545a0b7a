//! Reward shaping.
//!
//! One reward is computed per tick from the transition between the previous
//! and current perception, the action that was taken in between, and the
//! combat events that arrived meanwhile. Every term is additive.

use crate::action::CombatAction;
use crate::config::clamp_or;
use crate::events::EventBatch;
use crate::world::Perception;
use serde::{Deserialize, Serialize};

/// Tunable reward constants.
///
/// Penalties are stored as positive magnitudes and subtracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    /// Reward per unit of distance closed
    pub approach_factor: f64,
    /// Penalty per unit of distance opened
    pub retreat_factor: f64,
    /// Distance under which the close-range bonus applies
    pub close_range: f32,
    /// Flat bonus for being within close range
    pub close_bonus: f64,
    /// Penalty for idling within close range
    pub idle_close_penalty: f64,
    /// Distance beyond which the stand-off penalty applies
    pub standoff_range: f32,
    /// Flat penalty for hanging back
    pub standoff_penalty: f64,
    /// Reward per point of damage dealt to the primary hostile
    pub hostile_damage_factor: f64,
    /// Penalty per point of damage dealt to allies
    pub friendly_fire_factor: f64,
    /// Bonus for hitting the primary hostile with allies nearby
    pub team_bonus: f64,
    /// Reward per point of health restored
    pub heal_factor: f64,
    /// Own health percentage under which healing is rewarded
    pub low_health_pct: f32,
    /// Bonus for self-healing at low health
    pub urgent_heal_bonus: f64,
    /// Own health percentage above which healing is wasteful
    pub full_health_pct: f32,
    /// Penalty for self-healing near full health
    pub wasted_heal_penalty: f64,
    /// Distance within which a buff reaches something
    pub buff_range: f32,
    /// Bonus for buffing with a target in range
    pub buff_bonus: f64,
    /// Penalty for buffing with nothing nearby
    pub wasted_buff_penalty: f64,
    /// Penalty per health percentage point lost
    pub damage_taken_factor: f64,
    /// Reward for the final transition of an episode (negative)
    pub terminal_reward: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            approach_factor: 0.1,
            retreat_factor: 0.3,
            close_range: 60.0,
            close_bonus: 1.5,
            idle_close_penalty: 1.0,
            standoff_range: 300.0,
            standoff_penalty: 2.0,
            hostile_damage_factor: 10.0,
            friendly_fire_factor: 5.0,
            team_bonus: 5.0,
            heal_factor: 0.5,
            low_health_pct: 30.0,
            urgent_heal_bonus: 20.0,
            full_health_pct: 90.0,
            wasted_heal_penalty: 15.0,
            buff_range: 150.0,
            buff_bonus: 5.0,
            wasted_buff_penalty: 5.0,
            damage_taken_factor: 0.5,
            terminal_reward: -10.0,
        }
    }
}

impl RewardWeights {
    /// Replace NaN weights with defaults and keep the terminal reward non-positive.
    pub fn validate(&mut self) {
        let d = Self::default();
        for (value, fallback) in [
            (&mut self.approach_factor, d.approach_factor),
            (&mut self.retreat_factor, d.retreat_factor),
            (&mut self.close_bonus, d.close_bonus),
            (&mut self.idle_close_penalty, d.idle_close_penalty),
            (&mut self.standoff_penalty, d.standoff_penalty),
            (&mut self.hostile_damage_factor, d.hostile_damage_factor),
            (&mut self.friendly_fire_factor, d.friendly_fire_factor),
            (&mut self.team_bonus, d.team_bonus),
            (&mut self.heal_factor, d.heal_factor),
            (&mut self.urgent_heal_bonus, d.urgent_heal_bonus),
            (&mut self.wasted_heal_penalty, d.wasted_heal_penalty),
            (&mut self.buff_bonus, d.buff_bonus),
            (&mut self.wasted_buff_penalty, d.wasted_buff_penalty),
            (&mut self.damage_taken_factor, d.damage_taken_factor),
        ] {
            *value = clamp_or(*value, 0.0, f64::MAX, fallback);
        }
        self.terminal_reward = clamp_or(self.terminal_reward, f64::MIN, 0.0, d.terminal_reward);
    }
}

/// Everything the reward function looks at for one transition.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    /// Perception when the action was chosen
    pub previous: &'a Perception,
    /// Perception now
    pub current: &'a Perception,
    /// Action taken in between
    pub action: CombatAction,
    /// Events that arrived in between
    pub events: EventBatch,
}

/// Per-term reward, summed by [`RewardBreakdown::total`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RewardBreakdown {
    /// Closing or opening distance
    pub distance: f64,
    /// Close-range bonus and stand-off penalty
    pub proximity: f64,
    /// Damage dealt, friendly fire and team play
    pub damage_dealt: f64,
    /// Healing received and heal timing
    pub healing: f64,
    /// Buff usage
    pub buff: f64,
    /// Health lost
    pub damage_taken: f64,
}

impl RewardBreakdown {
    /// Sum of all terms.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.distance
            + self.proximity
            + self.damage_dealt
            + self.healing
            + self.buff
            + self.damage_taken
    }
}

/// Computes the shaped reward for one transition.
#[must_use]
pub fn shape_reward(t: &Transition<'_>, w: &RewardWeights) -> RewardBreakdown {
    RewardBreakdown {
        distance: distance_term(t, w),
        proximity: proximity_term(t, w),
        damage_dealt: damage_term(t, w),
        healing: healing_term(t, w),
        buff: buff_term(t, w),
        damage_taken: damage_taken_term(t, w),
    }
}

fn distance_term(t: &Transition<'_>, w: &RewardWeights) -> f64 {
    let closed = f64::from(t.previous.distance) - f64::from(t.current.distance);
    if closed > 0.0 {
        closed * w.approach_factor
    } else if closed < 0.0 {
        closed * w.retreat_factor
    } else {
        0.0
    }
}

fn proximity_term(t: &Transition<'_>, w: &RewardWeights) -> f64 {
    let distance = t.current.distance;
    let mut reward = 0.0;
    if distance < w.close_range {
        reward += w.close_bonus;
        if t.action == CombatAction::Idle {
            reward -= w.idle_close_penalty;
        }
    }
    if distance > w.standoff_range {
        reward -= w.standoff_penalty;
    }
    reward
}

fn damage_term(t: &Transition<'_>, w: &RewardWeights) -> f64 {
    let hostile = f64::from(t.events.damage_to_hostile);
    let allies = f64::from(t.events.damage_to_allies);

    let mut reward = hostile * w.hostile_damage_factor - allies * w.friendly_fire_factor;
    if hostile > 0.0 && t.current.nearby_ally_count > 0 {
        reward += w.team_bonus;
    }
    reward
}

fn healing_term(t: &Transition<'_>, w: &RewardWeights) -> f64 {
    let mut reward = f64::from(t.events.hp_healed) * w.heal_factor;
    if t.action == CombatAction::Heal {
        let own = t.previous.own_health_pct;
        if own < w.low_health_pct {
            reward += w.urgent_heal_bonus;
        } else if own > w.full_health_pct {
            reward -= w.wasted_heal_penalty;
        }
    }
    reward
}

fn buff_term(t: &Transition<'_>, w: &RewardWeights) -> f64 {
    if t.action != CombatAction::Buff {
        return 0.0;
    }
    if t.previous.distance <= w.buff_range {
        w.buff_bonus
    } else {
        -w.wasted_buff_penalty
    }
}

fn damage_taken_term(t: &Transition<'_>, w: &RewardWeights) -> f64 {
    let lost = f64::from(t.previous.own_health_pct) - f64::from(t.current.own_health_pct);
    if lost > 0.0 {
        -lost * w.damage_taken_factor
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn shape(
        previous: &Perception,
        current: &Perception,
        action: CombatAction,
        events: EventBatch,
    ) -> RewardBreakdown {
        let t = Transition {
            previous,
            current,
            action,
            events,
        };
        shape_reward(&t, &RewardWeights::default())
    }

    #[test]
    fn test_engagement_scenario() {
        let previous = Perception::hostile(100.0, 0.0).with_own_health(80.0);
        let current = Perception::hostile(40.0, 0.0).with_own_health(80.0);
        let events = EventBatch {
            damage_to_hostile: 10.0,
            ..EventBatch::default()
        };

        let reward = shape(&previous, &current, CombatAction::Aggressive, events);

        assert!((reward.distance - 6.0).abs() < EPS);
        assert!((reward.proximity - 1.5).abs() < EPS);
        assert!((reward.damage_dealt - 100.0).abs() < EPS);
        assert_eq!(reward.damage_taken, 0.0);
        assert!((reward.total() - 107.5).abs() < EPS);
    }

    #[test]
    fn test_retreat_penalized_harder_than_approach() {
        let near = Perception::hostile(100.0, 0.0);
        let far = Perception::hostile(120.0, 0.0);
        let none = EventBatch::default();

        let away = shape(&near, &far, CombatAction::Retreat, none);
        let toward = shape(&far, &near, CombatAction::Aggressive, none);

        assert!((away.distance + 6.0).abs() < EPS);
        assert!((toward.distance - 2.0).abs() < EPS);
    }

    #[test]
    fn test_idle_at_close_range() {
        let p = Perception::hostile(30.0, 0.0);
        let reward = shape(&p, &p, CombatAction::Idle, EventBatch::default());
        assert!((reward.proximity - 0.5).abs() < EPS);
    }

    #[test]
    fn test_standoff_penalty() {
        let p = Perception::hostile(400.0, 0.0);
        let reward = shape(&p, &p, CombatAction::Cautious, EventBatch::default());
        assert!((reward.proximity + 2.0).abs() < EPS);
        assert!((reward.total() + 2.0).abs() < EPS);
    }

    #[test]
    fn test_friendly_fire_and_team_bonus() {
        let p = Perception::hostile(100.0, 0.0).with_allies(2);

        let ff = EventBatch {
            damage_to_allies: 4.0,
            ..EventBatch::default()
        };
        let reward = shape(&p, &p, CombatAction::Strike, ff);
        assert!((reward.damage_dealt + 20.0).abs() < EPS);

        let teamwork = EventBatch {
            damage_to_hostile: 1.0,
            ..EventBatch::default()
        };
        let reward = shape(&p, &p, CombatAction::Strike, teamwork);
        assert!((reward.damage_dealt - 15.0).abs() < EPS);
    }

    #[test]
    fn test_heal_timing() {
        let healed = EventBatch {
            hp_healed: 10.0,
            ..EventBatch::default()
        };

        let low = Perception::hostile(100.0, 0.0).with_own_health(20.0);
        let reward = shape(&low, &low, CombatAction::Heal, healed);
        assert!((reward.healing - 25.0).abs() < EPS);

        let full = Perception::hostile(100.0, 0.0).with_own_health(95.0);
        let reward = shape(&full, &full, CombatAction::Heal, healed);
        assert!((reward.healing + 10.0).abs() < EPS);

        let mid = Perception::hostile(100.0, 0.0).with_own_health(60.0);
        let reward = shape(&mid, &mid, CombatAction::Heal, EventBatch::default());
        assert_eq!(reward.healing, 0.0);
    }

    #[test]
    fn test_buff_range() {
        let near = Perception::hostile(100.0, 0.0);
        let reward = shape(&near, &near, CombatAction::Buff, EventBatch::default());
        assert!((reward.buff - 5.0).abs() < EPS);

        let far = Perception::hostile(250.0, 0.0);
        let reward = shape(&far, &far, CombatAction::Buff, EventBatch::default());
        assert!((reward.buff + 5.0).abs() < EPS);

        let reward = shape(&near, &near, CombatAction::Strike, EventBatch::default());
        assert_eq!(reward.buff, 0.0);
    }

    #[test]
    fn test_damage_taken() {
        let before = Perception::hostile(100.0, 0.0).with_own_health(80.0);
        let after = Perception::hostile(100.0, 0.0).with_own_health(60.0);
        let reward = shape(&before, &after, CombatAction::Strike, EventBatch::default());
        assert!((reward.damage_taken + 10.0).abs() < EPS);

        let reward = shape(&after, &before, CombatAction::Strike, EventBatch::default());
        assert_eq!(reward.damage_taken, 0.0);
    }

    #[test]
    fn test_validate_weights() {
        let mut weights = RewardWeights {
            hostile_damage_factor: f64::NAN,
            retreat_factor: -3.0,
            terminal_reward: 4.0,
            ..RewardWeights::default()
        };
        weights.validate();
        assert_eq!(weights.hostile_damage_factor, 10.0);
        assert_eq!(weights.retreat_factor, 0.0);
        assert_eq!(weights.terminal_reward, 0.0);
    }
}
