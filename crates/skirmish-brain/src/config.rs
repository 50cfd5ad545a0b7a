//! Learning and controller configuration.
//!
//! All sections use `#[serde(default)]`, so a TOML file only needs to name the
//! values it overrides. Out-of-range values are clamped by `validate()`.

use crate::reward::RewardWeights;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur while reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),
}

/// Hyperparameters of a learning agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Learning rate α in (0, 1]
    pub learning_rate: f64,
    /// Discount factor γ in [0, 1]
    pub discount_factor: f64,
    /// Initial exploration rate ε in [0, 1]
    pub epsilon: f64,
    /// Multiplier applied to ε at every episode end, in (0, 1]
    pub epsilon_decay: f64,
    /// Floor for ε
    pub min_epsilon: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            discount_factor: 0.95,
            epsilon: 0.5,
            epsilon_decay: 0.97,
            min_epsilon: 0.05,
        }
    }
}

impl LearningConfig {
    /// Clamp values into their legal ranges.
    pub fn validate(&mut self) {
        self.learning_rate = clamp_or(self.learning_rate, f64::MIN_POSITIVE, 1.0, 0.3);
        self.discount_factor = clamp_or(self.discount_factor, 0.0, 1.0, 0.95);
        self.epsilon = clamp_or(self.epsilon, 0.0, 1.0, 0.5);
        self.epsilon_decay = clamp_or(self.epsilon_decay, f64::MIN_POSITIVE, 1.0, 0.97);
        self.min_epsilon = clamp_or(self.min_epsilon, 0.0, 1.0, 0.05);
    }
}

/// Per-entity controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Seconds between decisions
    pub tick_interval_secs: f64,
    /// Whether controllers learn (false = inference only)
    pub training_enabled: bool,
    /// Capacity of each controller's combat event channel
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 0.25,
            training_enabled: true,
            event_capacity: 256,
        }
    }
}

impl ControllerConfig {
    /// Clamp values into their legal ranges.
    pub fn validate(&mut self) {
        self.tick_interval_secs = clamp_or(self.tick_interval_secs, 0.0, 60.0, 0.25);
        self.event_capacity = self.event_capacity.clamp(1, 65_536);
    }
}

/// Complete decision-engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Agent hyperparameters
    pub learning: LearningConfig,
    /// Controller settings
    pub controller: ControllerConfig,
    /// Reward shaping weights
    pub rewards: RewardWeights,
}

impl BrainConfig {
    /// Load configuration from a TOML file.
    /// Returns defaults if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Brain config not found at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(config) => {
                    info!("Loaded brain config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse brain config: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read brain config: {e}");
                Self::default()
            },
        }
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(contents)?;
        config.validate();
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, toml::to_string_pretty(self)?)?;
        info!("Saved brain config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp every section.
    pub fn validate(&mut self) {
        self.learning.validate();
        self.controller.validate();
        self.rewards.validate();
    }
}

/// Clamps a value into `[min, max]`, substituting `fallback` for NaN.
pub(crate) fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrainConfig::default();
        assert_eq!(config.learning.learning_rate, 0.3);
        assert_eq!(config.learning.discount_factor, 0.95);
        assert_eq!(config.learning.min_epsilon, 0.05);
        assert_eq!(config.controller.tick_interval_secs, 0.25);
        assert!(config.controller.training_enabled);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = BrainConfig::from_toml(
            r"
            [learning]
            epsilon = 0.2

            [controller]
            training_enabled = false
            ",
        )
        .expect("valid toml");

        assert_eq!(config.learning.epsilon, 0.2);
        assert_eq!(config.learning.learning_rate, 0.3);
        assert!(!config.controller.training_enabled);
        assert_eq!(config.rewards, RewardWeights::default());
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = BrainConfig::default();
        config.learning.learning_rate = 4.0;
        config.learning.epsilon = -1.0;
        config.learning.discount_factor = f64::NAN;
        config.controller.event_capacity = 0;
        config.validate();

        assert_eq!(config.learning.learning_rate, 1.0);
        assert_eq!(config.learning.epsilon, 0.0);
        assert_eq!(config.learning.discount_factor, 0.95);
        assert_eq!(config.controller.event_capacity, 1);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(BrainConfig::from_toml("learning = 3").is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("brain.toml");

        let mut config = BrainConfig::default();
        config.learning.epsilon = 0.125;
        config.save_to(&path).expect("save config");

        let loaded = BrainConfig::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = BrainConfig::load_from(dir.path().join("absent.toml"));
        assert_eq!(loaded, BrainConfig::default());
    }
}
