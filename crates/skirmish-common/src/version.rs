//! Version types for schema compatibility.

use serde::{Deserialize, Serialize};

/// Schema version using semantic versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u16,
    /// Minor version (backwards-compatible additions)
    pub minor: u16,
    /// Patch version (bug fixes)
    pub patch: u16,
}

impl SchemaVersion {
    /// Creates a new schema version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Current knowledge payload version.
    pub const KNOWLEDGE_PAYLOAD: Self = Self::new(1, 0, 0);

    /// Current knowledge sync protocol version.
    pub const SYNC_PROTOCOL: Self = Self::new(1, 0, 0);

    /// Checks if this version is compatible with another version.
    /// Compatible means same major version and this minor >= other minor.
    #[must_use]
    pub const fn is_compatible_with(&self, other: &Self) -> bool {
        self.major == other.major && self.minor >= other.minor
    }

    /// Checks if this version can read data from another version.
    #[must_use]
    pub const fn can_read(&self, data_version: &Self) -> bool {
        self.major == data_version.major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::KNOWLEDGE_PAYLOAD
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_read_ignores_minor() {
        let reader = SchemaVersion::new(1, 0, 0);
        assert!(reader.can_read(&SchemaVersion::new(1, 4, 2)));
        assert!(!reader.can_read(&SchemaVersion::new(2, 0, 0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(SchemaVersion::new(1, 2, 3).to_string(), "1.2.3");
    }
}
