//! # Skirmish Sim
//!
//! Headless training run for Skirmish combat controllers.
//!
//! Usage: `skirmish-sim [config.toml]`. Learned knowledge is written to the
//! configured knowledge directory after every death and again at shutdown,
//! so consecutive runs continue where the last one stopped.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod arena;
mod config;

use anyhow::{Context, Result};
use arena::Arena;
use config::{SimConfig, CONFIG_FILE};
use skirmish_brain::{FileStore, KnowledgeRegistry};
use skirmish_common::EntityTypeId;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing, JSON lines when SKIRMISH_LOG_JSON is set
    let json = std::env::var_os("SKIRMISH_LOG_JSON").is_some();
    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(EnvFilter::from_default_env().add_directive("skirmish=info".parse()?))
        .init();

    info!("Skirmish sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_FILE.to_string());
    let config = SimConfig::load_from(&config_path);

    let store = FileStore::open(&config.knowledge_dir).with_context(|| {
        format!(
            "Failed to open knowledge store at {}",
            config.knowledge_dir.display()
        )
    })?;

    let mut registry = KnowledgeRegistry::new(config.brain.clone(), Box::new(store));
    if let Some(seed) = config.seed {
        registry = registry.with_seed(seed);
    }
    let registry = Arc::new(registry);

    let mut arena = Arena::new(&config, Arc::clone(&registry));
    info!(
        fighters = arena.fighter_count(),
        "Training {} for {} episodes",
        config.entity_type,
        config.episodes
    );
    let report = arena.run(config.episodes, config.max_sim_secs);
    registry.flush_all();

    info!(
        episodes = report.episodes,
        opponent_defeats = report.opponent_defeats,
        decisions = report.decisions,
        "Simulated {:.1}s",
        report.sim_secs
    );
    if let Some(stats) = registry.agent_stats(&EntityTypeId::new(config.entity_type.as_str())) {
        info!(
            states = stats.state_count,
            epsilon = stats.epsilon,
            total_reward = stats.total_reward,
            episodes = stats.episode_count,
            "Knowledge for {}",
            config.entity_type
        );
    }

    info!("Skirmish sim shutdown complete");
    Ok(())
}
