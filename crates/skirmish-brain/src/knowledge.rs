//! Knowledge payloads: saving, restoring and merging learned tables.
//!
//! The serialized form is
//!
//! ```json
//! { "table": [["d0_h3_t3_a0_p1_n0", {"aggressive": 1.5, ...}], ...],
//!   "epsilon": 0.2, "totalReward": 120.5, "episodeCount": 14 }
//! ```
//!
//! Payloads are validated in full before anything is applied, so a malformed
//! payload never leaves an agent half-updated.

use crate::action::CombatAction;
use crate::agent::{ActionValues, LearningAgent};
use crate::state::StateKey;
use serde::{Deserialize, Serialize};
use skirmish_common::{PayloadError, SchemaVersion};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Weight of the local estimate when blending with a foreign one.
pub const LOCAL_MERGE_WEIGHT: f64 = 0.4;

/// Serialized knowledge of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgePayload {
    /// Payload schema version
    #[serde(default)]
    pub version: SchemaVersion,
    /// `(state, {action: value})` rows
    pub table: Vec<(String, BTreeMap<String, f64>)>,
    /// Exploration rate at save time
    pub epsilon: f64,
    /// Running reward sum
    #[serde(default)]
    pub total_reward: f64,
    /// Completed episodes
    #[serde(default)]
    pub episode_count: u64,
}

impl KnowledgePayload {
    /// Serializes to JSON.
    pub fn to_json(&self) -> Result<String, PayloadError> {
        serde_json::to_string(self).map_err(|e| PayloadError::Parse(e.to_string()))
    }

    /// Parses from JSON.
    pub fn from_json(json: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(json).map_err(|e| PayloadError::Parse(e.to_string()))
    }

    /// Number of state rows.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.table.len()
    }

    /// Checks every field and converts the rows into table entries.
    ///
    /// Actions missing from a row start at zero; unknown actions and
    /// non-finite values reject the whole payload.
    pub fn validated_rows(&self) -> Result<Vec<(StateKey, ActionValues)>, PayloadError> {
        Ok(self
            .validated_entries()?
            .into_iter()
            .map(|(state, entries)| {
                let mut row = ActionValues::ZERO;
                for (action, value) in entries {
                    row.set(action, value);
                }
                (state, row)
            })
            .collect())
    }

    /// Checks every field and returns each row's named actions only.
    pub fn validated_entries(&self) -> Result<Vec<(StateKey, RowEntries)>, PayloadError> {
        if !SchemaVersion::KNOWLEDGE_PAYLOAD.can_read(&self.version) {
            return Err(PayloadError::VersionMismatch {
                expected: SchemaVersion::KNOWLEDGE_PAYLOAD.to_string(),
                actual: self.version.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(PayloadError::OutOfRange {
                field: "epsilon",
                value: self.epsilon,
            });
        }
        if !self.total_reward.is_finite() {
            return Err(PayloadError::OutOfRange {
                field: "totalReward",
                value: self.total_reward,
            });
        }

        self.table
            .iter()
            .map(|(state, actions)| {
                let entries = actions
                    .iter()
                    .map(|(id, &value)| {
                        let action = CombatAction::from_id(id).ok_or_else(|| {
                            PayloadError::UnknownAction {
                                state: state.clone(),
                                action: id.clone(),
                            }
                        })?;
                        if !value.is_finite() {
                            return Err(PayloadError::NonFiniteValue {
                                state: state.clone(),
                                action: id.clone(),
                            });
                        }
                        Ok((action, value))
                    })
                    .collect::<Result<RowEntries, _>>()?;
                Ok((StateKey::from_raw(state.as_str()), entries))
            })
            .collect()
    }
}

/// The `(action, value)` pairs a payload row actually names.
pub type RowEntries = Vec<(CombatAction, f64)>;

/// Outcome of a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// States present on both sides, blended
    pub blended: usize,
    /// States only present in the foreign payload, adopted
    pub adopted: usize,
}

impl LearningAgent {
    /// Captures the table, exploration rate and statistics.
    #[must_use]
    pub fn save(&self) -> KnowledgePayload {
        let mut rows: Vec<_> = self.table().iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));

        KnowledgePayload {
            version: SchemaVersion::KNOWLEDGE_PAYLOAD,
            table: rows
                .into_iter()
                .map(|(state, values)| {
                    let actions = values
                        .iter()
                        .map(|(action, value)| (action.as_str().to_string(), value))
                        .collect();
                    (state.as_str().to_string(), actions)
                })
                .collect(),
            epsilon: self.epsilon(),
            total_reward: self.total_reward(),
            episode_count: self.episode_count(),
        }
    }

    /// Replaces the table, exploration rate and statistics with a payload's.
    /// Repeated state keys resolve to the last row.
    ///
    /// On error the agent is left untouched.
    pub fn load(&mut self, payload: &KnowledgePayload) -> Result<(), PayloadError> {
        let rows = payload.validated_rows()?;

        let table = self.table_mut();
        table.clear();
        table.extend(rows);
        self.restore_stats(payload.epsilon, payload.total_reward, payload.episode_count);

        debug!(
            states = self.state_count(),
            epsilon = self.epsilon(),
            "Loaded knowledge"
        );
        Ok(())
    }

    /// Blends a foreign payload into the local table.
    ///
    /// Actions named on both sides become `0.4·local + 0.6·foreign`,
    /// foreign-only states are adopted, and ε becomes the smaller of the two. Reward and episode
    /// statistics stay local. On error the agent is left untouched.
    pub fn merge_load(&mut self, payload: &KnowledgePayload) -> Result<MergeSummary, PayloadError> {
        // Repeated state keys: the last row wins
        let rows: HashMap<StateKey, RowEntries> =
            payload.validated_entries()?.into_iter().collect();
        let mut summary = MergeSummary::default();

        let table = self.table_mut();
        for (state, entries) in rows {
            match table.get_mut(&state) {
                Some(local) => {
                    // Actions the foreign row leaves out keep their local value
                    for (action, foreign) in entries {
                        local.blend_action(action, foreign, LOCAL_MERGE_WEIGHT);
                    }
                    summary.blended += 1;
                },
                None => {
                    let mut row = ActionValues::ZERO;
                    for (action, value) in entries {
                        row.set(action, value);
                    }
                    table.insert(state, row);
                    summary.adopted += 1;
                },
            }
        }
        self.set_epsilon(self.epsilon().min(payload.epsilon));

        debug!(
            blended = summary.blended,
            adopted = summary.adopted,
            epsilon = self.epsilon(),
            "Merged foreign knowledge"
        );
        Ok(summary)
    }

    /// Parses and merges a JSON payload, logging and ignoring malformed input.
    pub fn merge_json(&mut self, json: &str) -> Option<MergeSummary> {
        match KnowledgePayload::from_json(json).and_then(|p| self.merge_load(&p)) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Rejected foreign knowledge: {e}");
                None
            },
        }
    }
}
