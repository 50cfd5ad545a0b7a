//! State discretization.
//!
//! Maps a continuous [`Perception`] onto one of at most
//! 4 · 4 · 4 · 8 · 2 · 4 = 4096 discrete states. Encoding is total and pure:
//! any input, including NaN and out-of-range values, produces exactly one key.

use crate::world::Perception;
use serde::{Deserialize, Serialize};
use skirmish_common::normalize_angle;
use std::f32::consts::TAU;
use std::fmt;

/// Upper bounds (exclusive) of the first three distance buckets.
pub const DISTANCE_THRESHOLDS: [f32; 3] = [50.0, 100.0, 200.0];
/// Width of a health bucket in percentage points.
pub const HEALTH_BUCKET_WIDTH: f32 = 25.0;
/// Highest health bucket index (reached at exactly 100%).
pub const MAX_HEALTH_BUCKET: u8 = 3;
/// Number of equal arcs the full circle is split into.
pub const ANGLE_BUCKETS: u8 = 8;
/// Ally counts at or above this share one bucket.
pub const MAX_ALLY_BUCKET: u8 = 3;

/// Discrete state key, the row index of the knowledge table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    /// Wraps a raw key, as found in persisted payloads.
    #[must_use]
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bucketed perception features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateFeatures {
    /// Distance bucket (0-3)
    pub distance: u8,
    /// Own health bucket (0-3)
    pub own_health: u8,
    /// Target health bucket (0-3)
    pub target_health: u8,
    /// Angle bucket (0-7)
    pub angle: u8,
    /// Whether the target is the primary hostile
    pub hostile: bool,
    /// Ally bucket (0-3)
    pub allies: u8,
}

impl StateFeatures {
    /// Buckets a perception snapshot.
    #[must_use]
    pub fn from_perception(p: &Perception) -> Self {
        Self {
            distance: distance_bucket(p.distance),
            own_health: health_bucket(p.own_health_pct),
            target_health: health_bucket(p.target_health_pct),
            angle: angle_bucket(p.angle),
            hostile: p.is_hostile_primary,
            allies: p.nearby_ally_count.min(u32::from(MAX_ALLY_BUCKET)) as u8,
        }
    }

    /// Renders the features as a state key.
    #[must_use]
    pub fn key(&self) -> StateKey {
        StateKey(format!(
            "d{}_h{}_t{}_a{}_p{}_n{}",
            self.distance,
            self.own_health,
            self.target_health,
            self.angle,
            u8::from(self.hostile),
            self.allies
        ))
    }
}

/// Encodes a perception snapshot into its state key.
#[must_use]
pub fn encode_state(perception: &Perception) -> StateKey {
    StateFeatures::from_perception(perception).key()
}

fn distance_bucket(distance: f32) -> u8 {
    // NaN fails every comparison and lands in the far bucket
    DISTANCE_THRESHOLDS
        .iter()
        .position(|&limit| distance < limit)
        .map_or(DISTANCE_THRESHOLDS.len() as u8, |i| i as u8)
}

fn health_bucket(pct: f32) -> u8 {
    let pct = if pct.is_finite() {
        pct.clamp(0.0, 100.0)
    } else {
        0.0
    };
    ((pct / HEALTH_BUCKET_WIDTH).floor() as u8).min(MAX_HEALTH_BUCKET)
}

fn angle_bucket(angle: f32) -> u8 {
    let arc = TAU / f32::from(ANGLE_BUCKETS);
    ((normalize_angle(angle) / arc).floor() as u8).min(ANGLE_BUCKETS - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::PI;

    fn perception(distance: f32, angle: f32, own: f32, target: f32) -> Perception {
        Perception::hostile(distance, angle)
            .with_own_health(own)
            .with_target_health(target)
    }

    #[test]
    fn test_distance_buckets() {
        assert_eq!(distance_bucket(0.0), 0);
        assert_eq!(distance_bucket(49.9), 0);
        assert_eq!(distance_bucket(50.0), 1);
        assert_eq!(distance_bucket(99.0), 1);
        assert_eq!(distance_bucket(100.0), 2);
        assert_eq!(distance_bucket(199.0), 2);
        assert_eq!(distance_bucket(200.0), 3);
        assert_eq!(distance_bucket(5000.0), 3);
        assert_eq!(distance_bucket(f32::NAN), 3);
    }

    #[test]
    fn test_health_buckets_clamp() {
        assert_eq!(health_bucket(0.0), 0);
        assert_eq!(health_bucket(24.9), 0);
        assert_eq!(health_bucket(25.0), 1);
        assert_eq!(health_bucket(74.0), 2);
        assert_eq!(health_bucket(75.0), 3);
        assert_eq!(health_bucket(100.0), 3);
        assert_eq!(health_bucket(250.0), 3);
        assert_eq!(health_bucket(-10.0), 0);
        assert_eq!(health_bucket(f32::NAN), 0);
    }

    #[test]
    fn test_angle_buckets() {
        assert_eq!(angle_bucket(0.0), 0);
        assert_eq!(angle_bucket(PI / 4.0 + 0.01), 1);
        assert_eq!(angle_bucket(PI + 0.01), 4);
        assert_eq!(angle_bucket(-0.01), 7);
        assert_eq!(angle_bucket(TAU - 0.001), 7);
        assert_eq!(angle_bucket(TAU), 0);
    }

    #[test]
    fn test_ally_bucket_clamps_to_three() {
        let p = Perception::hostile(10.0, 0.0).with_allies(12);
        assert_eq!(StateFeatures::from_perception(&p).allies, 3);
    }

    #[test]
    fn test_key_format() {
        let p = perception(75.0, PI / 2.0 + 0.01, 80.0, 10.0).with_allies(1);
        assert_eq!(encode_state(&p).as_str(), "d1_h3_t0_a2_p1_n1");

        let p = p.non_hostile();
        assert_eq!(encode_state(&p).as_str(), "d1_h3_t0_a2_p0_n1");
    }

    proptest! {
        #[test]
        fn prop_encoding_is_deterministic(
            distance in -100.0f32..1000.0,
            angle in -20.0f32..20.0,
            own in -50.0f32..150.0,
            target in -50.0f32..150.0,
            hostile in any::<bool>(),
            allies in 0u32..50,
        ) {
            let mut p = perception(distance, angle, own, target).with_allies(allies);
            p.is_hostile_primary = hostile;
            prop_assert_eq!(encode_state(&p), encode_state(&p));
        }

        #[test]
        fn prop_buckets_in_range(
            distance in any::<f32>(),
            angle in any::<f32>(),
            own in any::<f32>(),
            target in any::<f32>(),
            allies in any::<u32>(),
        ) {
            let p = perception(distance, angle, own, target).with_allies(allies);
            let f = StateFeatures::from_perception(&p);
            prop_assert!(f.distance <= 3);
            prop_assert!(f.own_health <= MAX_HEALTH_BUCKET);
            prop_assert!(f.target_health <= MAX_HEALTH_BUCKET);
            prop_assert!(f.angle < ANGLE_BUCKETS);
            prop_assert!(f.allies <= MAX_ALLY_BUCKET);
        }
    }
}
