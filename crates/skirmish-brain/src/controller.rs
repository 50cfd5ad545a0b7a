//! Per-entity decision controller.
//!
//! Each tick runs sense → reward → learn → select → act:
//!
//! 1. perceive the target and encode the state,
//! 2. drain combat events and shape the reward of the previous decision,
//! 3. apply the TD update for that decision (training only),
//! 4. pick the next action ε-greedily,
//! 5. hand the action's effect to the world.
//!
//! Death closes the episode: one terminal update, ε decay, then the shared
//! table is flushed to the store and offered for sync.

use crate::action::CombatAction;
use crate::agent::LearningAgent;
use crate::config::ControllerConfig;
use crate::events::{event_channel, CombatEventReceiver, CombatEventSender, EventBatch};
use crate::registry::{KnowledgeRegistry, SharedAgent};
use crate::reward::{shape_reward, RewardBreakdown, RewardWeights, Transition};
use crate::state::{encode_state, StateKey};
use crate::world::{CombatWorld, Perception};
use skirmish_common::{EntityId, EntityTypeId};
use std::sync::Arc;
use tracing::{debug, trace};

/// The decision whose outcome is still pending.
#[derive(Debug, Clone)]
struct PendingDecision {
    state: StateKey,
    action: CombatAction,
    perception: Perception,
}

/// Binds one combat entity to its type's shared agent.
pub struct DecisionController {
    entity: EntityId,
    entity_type: EntityTypeId,
    registry: Arc<KnowledgeRegistry>,
    agent: SharedAgent,
    config: ControllerConfig,
    rewards: RewardWeights,
    event_sender: CombatEventSender,
    events: CombatEventReceiver,
    last_tick: Option<f64>,
    pending: Option<PendingDecision>,
    last_reward: Option<RewardBreakdown>,
    decisions: u64,
    dead: bool,
    destroyed: bool,
}

impl DecisionController {
    /// Attaches a controller to a freshly spawned entity.
    ///
    /// The type's agent is created and restored on first attach.
    pub fn attach(
        entity: EntityId,
        entity_type: EntityTypeId,
        registry: &Arc<KnowledgeRegistry>,
        mut config: ControllerConfig,
    ) -> Self {
        config.validate();
        let agent = registry.agent_for(&entity_type);
        let (event_sender, events) = event_channel(config.event_capacity);

        debug!(?entity, "Attached controller for {entity_type}");

        Self {
            entity,
            entity_type,
            rewards: registry.config().rewards.clone(),
            registry: Arc::clone(registry),
            agent,
            config,
            event_sender,
            events,
            last_tick: None,
            pending: None,
            last_reward: None,
            decisions: 0,
            dead: false,
            destroyed: false,
        }
    }

    /// Advances the controller. `now` is the host clock in seconds.
    ///
    /// Returns the chosen action, or `None` when the tick was skipped
    /// (cadence, no target, dead or destroyed).
    pub fn tick<W: CombatWorld>(&mut self, now: f64, world: &mut W) -> Option<CombatAction> {
        if !self.is_active() {
            return None;
        }
        if let Some(last) = self.last_tick {
            if now - last < self.config.tick_interval_secs {
                return None;
            }
        }
        self.last_tick = Some(now);

        let perception = world.perceive(self.entity)?;
        let state = encode_state(&perception);

        let mut batch = EventBatch::default();
        self.events.drain_into(&mut batch);

        let training = self.config.training_enabled;
        let action = {
            let mut agent = self.agent.lock();
            if training {
                if let Some(pending) = &self.pending {
                    let reward =
                        Self::learn(&mut agent, &self.rewards, pending, &perception, &state, batch);
                    self.last_reward = Some(reward);
                }
            }
            agent.select_action(&state, training)
        };

        world.apply_effect(self.entity, action.effect(&perception));
        trace!(entity = ?self.entity, %state, %action, "Decision");

        self.pending = Some(PendingDecision {
            state,
            action,
            perception,
        });
        self.decisions += 1;
        Some(action)
    }

    fn learn(
        agent: &mut LearningAgent,
        weights: &RewardWeights,
        pending: &PendingDecision,
        perception: &Perception,
        state: &StateKey,
        events: EventBatch,
    ) -> RewardBreakdown {
        let transition = Transition {
            previous: &pending.perception,
            current: perception,
            action: pending.action,
            events,
        };
        let reward = shape_reward(&transition, weights);
        agent.update(&pending.state, pending.action, reward.total(), state);
        reward
    }

    /// Closes the episode at death. `terminal` is the final perception, if
    /// the host still has one.
    ///
    /// Returns `false` if the episode was already closed or the controller
    /// destroyed.
    pub fn on_death(&mut self, terminal: Option<Perception>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.dead = true;

        // Events that arrived after the last decision die with the entity
        self.events.drain_into(&mut EventBatch::default());

        {
            let mut agent = self.agent.lock();
            if let Some(pending) = self.pending.take() {
                if self.config.training_enabled {
                    let terminal_state = terminal
                        .as_ref()
                        .map_or_else(|| pending.state.clone(), encode_state);
                    agent.update(
                        &pending.state,
                        pending.action,
                        self.rewards.terminal_reward,
                        &terminal_state,
                    );
                }
            }
            agent.end_episode();
            debug!(
                entity = ?self.entity,
                decisions = self.decisions,
                episodes = agent.episode_count(),
                epsilon = agent.epsilon(),
                "Episode ended for {}",
                self.entity_type
            );
        }

        self.registry.flush(&self.entity_type);
        true
    }

    /// Detaches from the entity. Safe to call more than once; later ticks and
    /// deaths are ignored.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.pending = None;
        trace!(entity = ?self.entity, "Controller destroyed");
    }

    /// Switches between training and inference-only.
    pub fn set_training(&mut self, enabled: bool) {
        self.config.training_enabled = enabled;
    }

    /// Whether decisions update the table.
    #[must_use]
    pub fn is_training(&self) -> bool {
        self.config.training_enabled
    }

    /// Sender the world uses to report combat events for this entity.
    #[must_use]
    pub fn events(&self) -> CombatEventSender {
        self.event_sender.clone()
    }

    /// Controlled entity.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Entity type.
    #[must_use]
    pub fn entity_type(&self) -> &EntityTypeId {
        &self.entity_type
    }

    /// Shared agent of the entity type.
    #[must_use]
    pub fn agent(&self) -> &SharedAgent {
        &self.agent
    }

    /// State of the pending decision.
    #[must_use]
    pub fn last_state(&self) -> Option<&StateKey> {
        self.pending.as_ref().map(|p| &p.state)
    }

    /// Action of the pending decision.
    #[must_use]
    pub fn last_action(&self) -> Option<CombatAction> {
        self.pending.as_ref().map(|p| p.action)
    }

    /// Reward of the most recent TD update.
    #[must_use]
    pub fn last_reward(&self) -> Option<&RewardBreakdown> {
        self.last_reward.as_ref()
    }

    /// Decisions made so far.
    #[must_use]
    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    /// Whether the episode has ended.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Whether the controller was destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn is_active(&self) -> bool {
        !self.dead && !self.destroyed
    }
}

impl std::fmt::Debug for DecisionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionController")
            .field("entity", &self.entity)
            .field("entity_type", &self.entity_type)
            .field("training", &self.config.training_enabled)
            .field("decisions", &self.decisions)
            .field("dead", &self.dead)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}
