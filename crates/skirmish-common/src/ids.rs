//! ID types for entities and entity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for entity IDs.
static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an entity in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new unique entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an entity ID from a raw value (for deserialization).
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier for a kind of combat entity ("goblin", "skeleton_archer").
///
/// Learned knowledge is scoped per entity type, never per instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityTypeId(String);

impl EntityTypeId {
    /// Creates an entity type ID from a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the type name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which this type's knowledge is persisted.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("rl_knowledge_{}", self.0)
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityTypeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_are_unique() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
        assert_eq!(EntityId::from_raw(a.raw()), a);
    }

    #[test]
    fn test_entity_type_storage_key() {
        let goblin = EntityTypeId::from("goblin");
        assert_eq!(goblin.as_str(), "goblin");
        assert_eq!(goblin.storage_key(), "rl_knowledge_goblin");
        assert_eq!(goblin.to_string(), "goblin");
    }
}
