//! Planar geometry helpers for arena positions and bearings.
//!
//! Positions are `glam::Vec2` in world units. Angles are radians measured
//! counter-clockwise from the +X axis.

use glam::Vec2;
use std::f32::consts::TAU;

/// Normalizes an angle into `[0, 2π)`.
///
/// Non-finite input yields `0.0`.
#[must_use]
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Returns the bearing from `from` towards `to`, normalized into `[0, 2π)`.
#[must_use]
pub fn bearing(from: Vec2, to: Vec2) -> f32 {
    let delta = to - from;
    normalize_angle(delta.y.atan2(delta.x))
}

/// Returns the euclidean distance between two positions.
#[must_use]
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// Returns the unit vector pointing along `angle`.
#[must_use]
pub fn heading(angle: f32) -> Vec2 {
    Vec2::from_angle(angle)
}
