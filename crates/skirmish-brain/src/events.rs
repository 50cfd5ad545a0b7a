//! Combat event delivery for reward shaping.
//!
//! The world reports damage and healing through a cloneable
//! [`CombatEventSender`]. A controller drains its receiver once per tick into
//! an [`EventBatch`], which the reward function consumes exactly once.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Who received damage dealt by the controlled entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// The primary hostile (usually the player)
    PrimaryHostile,
    /// A non-hostile ally (friendly fire)
    Ally,
}

/// Event types delivered to a controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// The entity dealt damage
    DamageDealt {
        /// Damage amount
        amount: f32,
        /// Who was hit
        target: TargetKind,
    },
    /// A heal was applied to the entity
    HealApplied {
        /// Health restored
        amount: f32,
    },
}

/// Combat events accumulated since the previous tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventBatch {
    /// Damage dealt to the primary hostile
    pub damage_to_hostile: f32,
    /// Damage dealt to allies
    pub damage_to_allies: f32,
    /// Health restored
    pub hp_healed: f32,
}

impl EventBatch {
    /// Folds one event into the batch. Negative or non-finite amounts are ignored.
    pub fn absorb(&mut self, event: CombatEvent) {
        match event {
            CombatEvent::DamageDealt { amount, target } if valid_amount(amount) => match target {
                TargetKind::PrimaryHostile => self.damage_to_hostile += amount,
                TargetKind::Ally => self.damage_to_allies += amount,
            },
            CombatEvent::HealApplied { amount } if valid_amount(amount) => {
                self.hp_healed += amount;
            },
            ignored => debug!("Ignoring invalid combat event {ignored:?}"),
        }
    }

    /// Returns whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.damage_to_hostile == 0.0 && self.damage_to_allies == 0.0 && self.hp_healed == 0.0
    }

    /// Takes the accumulated values, leaving the batch zeroed.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

fn valid_amount(amount: f32) -> bool {
    amount.is_finite() && amount >= 0.0
}

/// Creates a bounded event channel.
#[must_use]
pub fn event_channel(capacity: usize) -> (CombatEventSender, CombatEventReceiver) {
    let (sender, receiver) = bounded(capacity.max(1));
    (
        CombatEventSender { sender },
        CombatEventReceiver { receiver },
    )
}

/// Sending half held by the world.
#[derive(Debug, Clone)]
pub struct CombatEventSender {
    sender: Sender<CombatEvent>,
}

impl CombatEventSender {
    /// Publishes an event. Returns `false` if it was dropped (channel full or
    /// controller gone).
    pub fn send(&self, event: CombatEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                debug!("Combat event channel full, dropping {event:?}");
                false
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Reports damage dealt.
    pub fn damage_dealt(&self, amount: f32, target: TargetKind) -> bool {
        self.send(CombatEvent::DamageDealt { amount, target })
    }

    /// Reports a heal.
    pub fn heal_applied(&self, amount: f32) -> bool {
        self.send(CombatEvent::HealApplied { amount })
    }
}

/// Receiving half owned by a controller.
#[derive(Debug)]
pub struct CombatEventReceiver {
    receiver: Receiver<CombatEvent>,
}

impl CombatEventReceiver {
    /// Drains all pending events into `batch`.
    pub fn drain_into(&self, batch: &mut EventBatch) -> usize {
        let mut count = 0;
        while let Ok(event) = self.receiver.try_recv() {
            batch.absorb(event);
            count += 1;
        }
        count
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}
