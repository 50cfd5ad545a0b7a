//! Per-type knowledge registry.
//!
//! Every entity of a type shares one [`LearningAgent`]. The registry creates
//! that agent on first use, restores it from the store, asks the sync channel
//! for the shared table, and publishes the table again whenever an entity of
//! the type dies.

use crate::agent::LearningAgent;
use crate::config::BrainConfig;
use crate::knowledge::KnowledgePayload;
use crate::store::KnowledgeStore;
use crate::sync::KnowledgeSync;
use parking_lot::Mutex;
use skirmish_common::{EntityTypeId, SkirmishResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Agent shared by all entities of one type.
pub type SharedAgent = Arc<Mutex<LearningAgent>>;

/// Snapshot of a type's learning progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentStats {
    /// Materialized states
    pub state_count: usize,
    /// Current exploration rate
    pub epsilon: f64,
    /// Running reward sum
    pub total_reward: f64,
    /// Completed episodes
    pub episode_count: u64,
    /// TD updates since construction
    pub update_count: u64,
}

/// Owns the per-type agents, the store and the optional sync endpoint.
pub struct KnowledgeRegistry {
    config: BrainConfig,
    store: Box<dyn KnowledgeStore>,
    sync: Option<Box<dyn KnowledgeSync>>,
    agents: Mutex<HashMap<EntityTypeId, SharedAgent>>,
    seed: Option<u64>,
}

impl KnowledgeRegistry {
    /// Creates a registry without a sync channel.
    pub fn new(config: BrainConfig, store: Box<dyn KnowledgeStore>) -> Self {
        Self {
            config,
            store,
            sync: None,
            agents: Mutex::new(HashMap::new()),
            seed: None,
        }
    }

    /// Attaches a sync channel.
    #[must_use]
    pub fn with_sync(mut self, sync: Box<dyn KnowledgeSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Seeds agent exploration. Each new type gets `seed + n` for the n-th
    /// type created, so runs are reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    /// Returns the agent for `entity_type`, creating and restoring it on first use.
    pub fn agent_for(&self, entity_type: &EntityTypeId) -> SharedAgent {
        let mut agents = self.agents.lock();
        if let Some(agent) = agents.get(entity_type) {
            return Arc::clone(agent);
        }

        let learning = self.config.learning.clone();
        let mut agent = match self.seed {
            Some(seed) => {
                LearningAgent::with_seed(learning, seed.wrapping_add(agents.len() as u64))
            },
            None => LearningAgent::new(learning),
        };
        self.restore(entity_type, &mut agent);

        if let Some(sync) = &self.sync {
            sync.request_shared(entity_type);
        }

        let agent = Arc::new(Mutex::new(agent));
        agents.insert(entity_type.clone(), Arc::clone(&agent));
        agent
    }

    fn restore(&self, entity_type: &EntityTypeId, agent: &mut LearningAgent) {
        let key = entity_type.storage_key();
        let json = match self.store.get(&key) {
            Ok(Some(json)) => json,
            Ok(None) => {
                debug!("No stored knowledge for {entity_type}");
                return;
            },
            Err(e) => {
                warn!("Knowledge store unavailable for {entity_type}: {e}");
                return;
            },
        };

        match KnowledgePayload::from_json(&json).and_then(|payload| agent.load(&payload)) {
            Ok(()) => info!(
                states = agent.state_count(),
                episodes = agent.episode_count(),
                epsilon = agent.epsilon(),
                "Restored knowledge for {entity_type}"
            ),
            Err(e) => warn!("Discarding stored knowledge for {entity_type}: {e}"),
        }
    }

    /// Returns whether an agent exists for `entity_type`.
    pub fn contains(&self, entity_type: &EntityTypeId) -> bool {
        self.agents.lock().contains_key(entity_type)
    }

    /// Types with a live agent, sorted.
    pub fn entity_types(&self) -> Vec<EntityTypeId> {
        let mut types: Vec<_> = self.agents.lock().keys().cloned().collect();
        types.sort();
        types
    }

    /// Writes the type's table to the store.
    pub fn save(&self, entity_type: &EntityTypeId) -> SkirmishResult<Option<KnowledgePayload>> {
        let Some(agent) = self.agents.lock().get(entity_type).cloned() else {
            return Ok(None);
        };
        let payload = agent.lock().save();
        let json = payload.to_json()?;
        self.store.set(&entity_type.storage_key(), &json)?;
        debug!(states = payload.state_count(), "Saved knowledge for {entity_type}");
        Ok(Some(payload))
    }

    /// Saves the type's table and offers it to the sync channel.
    ///
    /// Store failures are logged; the payload is still pushed.
    pub fn flush(&self, entity_type: &EntityTypeId) {
        let payload = match self.save(entity_type) {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to persist knowledge for {entity_type}: {e}");
                match self.agents.lock().get(entity_type) {
                    Some(agent) => agent.lock().save(),
                    None => return,
                }
            },
        };

        if let Some(sync) = &self.sync {
            sync.push(entity_type, &payload);
        }
    }

    /// Flushes every type.
    pub fn flush_all(&self) {
        for entity_type in self.entity_types() {
            self.flush(&entity_type);
        }
    }

    /// Merges payloads delivered by the sync channel. Payloads for types with
    /// no local agent are ignored. Returns the number merged.
    pub fn pump_sync(&self) -> usize {
        let Some(sync) = &self.sync else {
            return 0;
        };

        let mut merged = 0;
        for (entity_type, payload) in sync.poll_inbound() {
            let Some(agent) = self.agents.lock().get(&entity_type).cloned() else {
                debug!("Ignoring shared knowledge for unknown type {entity_type}");
                continue;
            };

            let mut agent = agent.lock();
            match agent.merge_load(&payload) {
                Ok(summary) => {
                    info!(
                        blended = summary.blended,
                        adopted = summary.adopted,
                        epsilon = agent.epsilon(),
                        "Merged shared knowledge for {entity_type}"
                    );
                    merged += 1;
                },
                Err(e) => warn!("Rejected shared knowledge for {entity_type}: {e}"),
            }
        }
        merged
    }

    /// Learning progress of `entity_type`, if it has an agent.
    pub fn agent_stats(&self, entity_type: &EntityTypeId) -> Option<AgentStats> {
        let agent = self.agents.lock().get(entity_type).cloned()?;
        let agent = agent.lock();
        Some(AgentStats {
            state_count: agent.state_count(),
            epsilon: agent.epsilon(),
            total_reward: agent.total_reward(),
            episode_count: agent.episode_count(),
            update_count: agent.update_count(),
        })
    }
}

impl std::fmt::Debug for KnowledgeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeRegistry")
            .field("types", &self.agents.lock().len())
            .field("sync", &self.sync.is_some())
            .finish_non_exhaustive()
    }
}
