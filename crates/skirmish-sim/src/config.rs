//! Simulation configuration.
//!
//! Loaded from a TOML file; every section is optional.

use serde::{Deserialize, Serialize};
use skirmish_brain::BrainConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "skirmish.toml";

/// Arena geometry and combat numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Side length of the square arena
    pub size: f32,
    /// Learning entities alive at once
    pub fighters: u32,
    /// Fighter movement speed (units per second)
    pub fighter_speed: f32,
    /// Opponent movement speed (units per second)
    pub opponent_speed: f32,
    /// Opponent health pool
    pub opponent_health: f32,
    /// Reach of a fighter's strike
    pub strike_range: f32,
    /// Damage of a fighter's strike
    pub strike_damage: f32,
    /// Health percent restored by a heal
    pub heal_amount: f32,
    /// Radius within which other fighters count as nearby allies
    pub ally_radius: f32,
    /// Reach of the opponent's attack
    pub opponent_range: f32,
    /// Damage (health percent) of the opponent's attack
    pub opponent_damage: f32,
    /// Seconds between opponent attacks
    pub opponent_cooldown: f32,
    /// Simulation step in seconds
    pub step_secs: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            size: 800.0,
            fighters: 3,
            fighter_speed: 120.0,
            opponent_speed: 70.0,
            opponent_health: 400.0,
            strike_range: 50.0,
            strike_damage: 12.0,
            heal_amount: 25.0,
            ally_radius: 150.0,
            opponent_range: 60.0,
            opponent_damage: 9.0,
            opponent_cooldown: 0.8,
            step_secs: 0.05,
        }
    }
}

impl ArenaConfig {
    /// Clamp values into sane ranges. NaN falls back to the default.
    pub fn validate(&mut self) {
        let d = Self::default();
        self.size = clamp_or(self.size, 100.0, 10_000.0, d.size);
        self.fighters = self.fighters.clamp(1, 64);
        self.fighter_speed = clamp_or(self.fighter_speed, 1.0, 1_000.0, d.fighter_speed);
        self.opponent_speed = clamp_or(self.opponent_speed, 0.0, 1_000.0, d.opponent_speed);
        self.opponent_health = clamp_or(self.opponent_health, 1.0, 100_000.0, d.opponent_health);
        self.strike_range = clamp_or(self.strike_range, 1.0, self.size, d.strike_range);
        self.strike_damage = clamp_or(self.strike_damage, 0.0, 1_000.0, d.strike_damage);
        self.heal_amount = clamp_or(self.heal_amount, 0.0, 100.0, d.heal_amount);
        self.ally_radius = clamp_or(self.ally_radius, 0.0, self.size, d.ally_radius);
        self.opponent_range = clamp_or(self.opponent_range, 1.0, self.size, d.opponent_range);
        self.opponent_damage = clamp_or(self.opponent_damage, 0.0, 100.0, d.opponent_damage);
        self.opponent_cooldown = clamp_or(self.opponent_cooldown, 0.05, 60.0, d.opponent_cooldown);
        self.step_secs = clamp_or(self.step_secs, 0.001, 1.0, d.step_secs);
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Decision engine settings
    pub brain: BrainConfig,
    /// Arena settings
    pub arena: ArenaConfig,
    /// Deaths to simulate before stopping
    pub episodes: u32,
    /// Upper bound on simulated time in seconds
    pub max_sim_secs: f64,
    /// Seed for the arena and agents (None = random)
    pub seed: Option<u64>,
    /// Directory of the knowledge file store
    pub knowledge_dir: PathBuf,
    /// Entity type of the fighters
    pub entity_type: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            brain: BrainConfig::default(),
            arena: ArenaConfig::default(),
            episodes: 50,
            max_sim_secs: 3_600.0,
            seed: None,
            knowledge_dir: PathBuf::from("knowledge"),
            entity_type: "grunt".to_string(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(mut config) => {
                    config.validate();
                    info!("Loaded config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse config file: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read config file: {e}");
                Self::default()
            },
        }
    }

    /// Validate and clamp all values.
    pub fn validate(&mut self) {
        self.brain.validate();
        self.arena.validate();
        self.episodes = self.episodes.max(1);
        if self.max_sim_secs.is_nan() || self.max_sim_secs <= 0.0 {
            self.max_sim_secs = 3_600.0;
        }

        let name_ok = !self.entity_type.is_empty()
            && self
                .entity_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !name_ok {
            warn!(
                "Invalid entity type {:?}, falling back to \"grunt\"",
                self.entity_type
            );
            self.entity_type = "grunt".to_string();
        }
    }
}
