//! # Skirmish Brain
//!
//! Tabular reinforcement-learning combat controllers for hostile NPCs.
//!
//! This crate provides the decision engine and its collaborators:
//! - State encoding of perception snapshots into discrete keys
//! - The combat action vocabulary and its movement/skill handlers
//! - Q-learning agents with ε-greedy selection and episode decay
//! - Knowledge payloads: save, load and blended merge
//! - Reward shaping from transitions and combat events
//! - Per-entity decision controllers
//! - Per-type knowledge registry, store backends and cross-instance sync

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod action;
pub mod agent;
pub mod config;
pub mod controller;
pub mod events;
pub mod knowledge;
pub mod registry;
pub mod reward;
pub mod state;
pub mod store;
pub mod sync;
pub mod world;

#[cfg(test)]
mod e2e_tests;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::action::*;
    pub use crate::agent::*;
    pub use crate::config::*;
    pub use crate::controller::*;
    pub use crate::events::*;
    pub use crate::knowledge::*;
    pub use crate::registry::*;
    pub use crate::reward::*;
    pub use crate::state::*;
    pub use crate::store::*;
    pub use crate::sync::*;
    pub use crate::world::*;
}

pub use prelude::*;
