//! Tabular Q-learning agent.
//!
//! Holds the knowledge table (state → action → value) for one entity type
//! together with its hyperparameters and running statistics. Rows are
//! materialized lazily, always with a value for every action.

use crate::action::{CombatAction, ACTION_COUNT};
use crate::config::LearningConfig;
use crate::state::StateKey;
use std::collections::HashMap;
use tracing::warn;

/// Value estimates for every action in one state, indexed by declaration order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionValues([f64; ACTION_COUNT]);

impl ActionValues {
    /// Row with every action at zero.
    pub const ZERO: Self = Self([0.0; ACTION_COUNT]);

    /// Creates a row from raw values in declaration order.
    #[must_use]
    pub const fn from_array(values: [f64; ACTION_COUNT]) -> Self {
        Self(values)
    }

    /// Value of an action.
    #[must_use]
    pub fn get(&self, action: CombatAction) -> f64 {
        self.0[action.index()]
    }

    /// Sets the value of an action.
    pub fn set(&mut self, action: CombatAction, value: f64) {
        self.0[action.index()] = value;
    }

    /// Highest value in the row.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.0[self.best_action().index()]
    }

    /// Greedy action. Scans in declaration order and only replaces the
    /// incumbent on a strict improvement, so ties go to the earliest action.
    #[must_use]
    pub fn best_action(&self) -> CombatAction {
        let mut best = CombatAction::ALL[0];
        let mut best_value = self.0[0];
        for action in &CombatAction::ALL[1..] {
            let value = self.0[action.index()];
            if value > best_value {
                best = *action;
                best_value = value;
            }
        }
        best
    }

    /// Iterates `(action, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (CombatAction, f64)> + '_ {
        CombatAction::ALL
            .into_iter()
            .map(move |a| (a, self.0[a.index()]))
    }

    /// Blends one action: `local_weight · self + (1 - local_weight) · foreign`.
    pub fn blend_action(&mut self, action: CombatAction, foreign: f64, local_weight: f64) {
        let slot = &mut self.0[action.index()];
        *slot = local_weight * *slot + (1.0 - local_weight) * foreign;
    }
}

impl Default for ActionValues {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Knowledge table keyed by discrete state.
pub type KnowledgeTable = HashMap<StateKey, ActionValues>;

/// A learning agent shared by every entity of one type.
#[derive(Debug, Clone)]
pub struct LearningAgent {
    /// Hyperparameters
    config: LearningConfig,
    /// Current exploration rate
    epsilon: f64,
    /// Learned values
    table: KnowledgeTable,
    /// Sum of all rewards learned from
    total_reward: f64,
    /// Completed episodes (deaths)
    episode_count: u64,
    /// TD updates applied
    update_count: u64,
    /// Exploration RNG
    rng: fastrand::Rng,
}

impl LearningAgent {
    /// Creates an agent with an empty table.
    #[must_use]
    pub fn new(config: LearningConfig) -> Self {
        Self::with_rng(config, fastrand::Rng::new())
    }

    /// Creates an agent whose exploration draws are reproducible.
    #[must_use]
    pub fn with_seed(config: LearningConfig, seed: u64) -> Self {
        Self::with_rng(config, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(mut config: LearningConfig, rng: fastrand::Rng) -> Self {
        config.validate();
        Self {
            epsilon: config.epsilon,
            config,
            table: HashMap::new(),
            total_reward: 0.0,
            episode_count: 0,
            update_count: 0,
            rng,
        }
    }

    /// Returns the row for a state, creating an all-zero row on first sight.
    pub fn values(&mut self, state: &StateKey) -> &ActionValues {
        self.row_mut(state)
    }

    fn row_mut(&mut self, state: &StateKey) -> &mut ActionValues {
        self.table.entry(state.clone()).or_default()
    }

    /// Returns the value of an action in a state.
    pub fn q_value(&mut self, state: &StateKey, action: CombatAction) -> f64 {
        self.values(state).get(action)
    }

    /// Overwrites the value of an action in a state.
    pub fn set_q_value(&mut self, state: &StateKey, action: CombatAction, value: f64) {
        self.row_mut(state).set(action, value);
    }

    /// Returns the highest action value in a state.
    pub fn max_q_value(&mut self, state: &StateKey) -> f64 {
        self.values(state).max()
    }

    /// Returns the greedy action for a state.
    pub fn best_action(&mut self, state: &StateKey) -> CombatAction {
        self.values(state).best_action()
    }

    /// ε-greedy selection. Exploration only happens while training.
    pub fn select_action(&mut self, state: &StateKey, training: bool) -> CombatAction {
        let greedy = self.best_action(state);
        if training && self.rng.f64() < self.epsilon {
            CombatAction::ALL[self.rng.usize(..ACTION_COUNT)]
        } else {
            greedy
        }
    }

    /// Applies `Q(s,a) ← Q(s,a) + α·(r + γ·max Q(s',·) − Q(s,a))` and returns
    /// the new value. Non-finite rewards are discarded.
    pub fn update(
        &mut self,
        state: &StateKey,
        action: CombatAction,
        reward: f64,
        next_state: &StateKey,
    ) -> f64 {
        let current = self.q_value(state, action);
        if !reward.is_finite() {
            warn!("Discarding non-finite reward {reward} for {state}/{action}");
            return current;
        }

        let next_max = self.max_q_value(next_state);
        let target = reward + self.config.discount_factor * next_max;
        let updated = current + self.config.learning_rate * (target - current);

        self.set_q_value(state, action, updated);
        self.total_reward += reward;
        self.update_count += 1;
        updated
    }

    /// Closes an episode: decays ε towards its floor and counts the episode.
    pub fn end_episode(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.min_epsilon);
        self.episode_count += 1;
    }

    /// Current exploration rate.
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Sets the exploration rate, clamped into `[0, 1]`.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        if epsilon.is_finite() {
            self.epsilon = epsilon.clamp(0.0, 1.0);
        }
    }

    /// Sum of all rewards learned from.
    #[must_use]
    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    /// Number of completed episodes.
    #[must_use]
    pub fn episode_count(&self) -> u64 {
        self.episode_count
    }

    /// Number of TD updates applied by this process.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Number of materialized states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.table.len()
    }

    /// Returns whether a state has been materialized.
    #[must_use]
    pub fn contains_state(&self, state: &StateKey) -> bool {
        self.table.contains_key(state)
    }

    /// Read-only view of the table.
    #[must_use]
    pub fn table(&self) -> &KnowledgeTable {
        &self.table
    }

    /// Hyperparameters.
    #[must_use]
    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub(crate) fn table_mut(&mut self) -> &mut KnowledgeTable {
        &mut self.table
    }

    pub(crate) fn restore_stats(&mut self, epsilon: f64, total_reward: f64, episode_count: u64) {
        self.epsilon = epsilon;
        self.total_reward = total_reward;
        self.episode_count = episode_count;
    }
}
