//! # Skirmish Common
//!
//! Common types, utilities, and shared abstractions for Project Skirmish.
//!
//! This crate provides foundational types used across all Skirmish subsystems:
//! - Planar geometry helpers (bearings, angle normalization)
//! - ID types (EntityId, EntityTypeId)
//! - Version information for persisted knowledge
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
