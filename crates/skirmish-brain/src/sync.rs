//! Best-effort knowledge sharing between registries.
//!
//! A registry asks for the shared table of a type when the first entity of
//! that type attaches, and publishes its own table whenever an entity dies.
//! [`SyncHub`] is an in-process collaborator that routes these messages
//! between [`ChannelSync`] endpoints; any other transport can implement
//! [`KnowledgeSync`] directly.

use crate::knowledge::KnowledgePayload;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use skirmish_common::{EntityTypeId, SchemaVersion};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Default capacity of hub and endpoint channels.
pub const DEFAULT_SYNC_CAPACITY: usize = 64;

/// Messages from an endpoint to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncMessage {
    /// Ask for the latest shared table of a type
    Request {
        /// Type whose table is wanted
        entity_type: EntityTypeId,
    },
    /// Publish a table
    Push {
        /// Sync protocol the sender speaks
        #[serde(default = "SyncMessage::default_protocol")]
        protocol: SchemaVersion,
        /// Type the table belongs to
        entity_type: EntityTypeId,
        /// Serialized knowledge
        payload: KnowledgePayload,
    },
}

impl SyncMessage {
    fn default_protocol() -> SchemaVersion {
        SchemaVersion::SYNC_PROTOCOL
    }

    /// Type the message concerns.
    #[must_use]
    pub fn entity_type(&self) -> &EntityTypeId {
        match self {
            Self::Request { entity_type } | Self::Push { entity_type, .. } => entity_type,
        }
    }
}

/// Cross-instance knowledge transport.
///
/// Every method is fire-and-forget: failures are logged, never returned.
pub trait KnowledgeSync: Send + Sync {
    /// Requests the shared table of `entity_type`. The reply, if any, arrives
    /// later through [`poll_inbound`](Self::poll_inbound).
    fn request_shared(&self, entity_type: &EntityTypeId);

    /// Publishes a table.
    fn push(&self, entity_type: &EntityTypeId, payload: &KnowledgePayload);

    /// Takes every payload delivered since the last poll.
    fn poll_inbound(&self) -> Vec<(EntityTypeId, KnowledgePayload)>;
}

type Delivery = (EntityTypeId, KnowledgePayload);

/// Channel endpoint connected to a [`SyncHub`].
#[derive(Debug)]
pub struct ChannelSync {
    id: usize,
    outbound: Sender<(usize, SyncMessage)>,
    inbound: Receiver<Delivery>,
}

impl ChannelSync {
    /// Endpoint index within its hub.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    fn send(&self, message: SyncMessage) {
        match self.outbound.try_send((self.id, message)) {
            Ok(()) => {},
            Err(TrySendError::Full((_, message))) => {
                debug!(
                    endpoint = self.id,
                    "Sync hub full, dropping message for {}",
                    message.entity_type()
                );
            },
            Err(TrySendError::Disconnected(_)) => {
                debug!(endpoint = self.id, "Sync hub gone");
            },
        }
    }
}

impl KnowledgeSync for ChannelSync {
    fn request_shared(&self, entity_type: &EntityTypeId) {
        self.send(SyncMessage::Request {
            entity_type: entity_type.clone(),
        });
    }

    fn push(&self, entity_type: &EntityTypeId, payload: &KnowledgePayload) {
        self.send(SyncMessage::Push {
            protocol: SchemaVersion::SYNC_PROTOCOL,
            entity_type: entity_type.clone(),
            payload: payload.clone(),
        });
    }

    fn poll_inbound(&self) -> Vec<Delivery> {
        self.inbound.try_iter().collect()
    }
}

/// In-process router between [`ChannelSync`] endpoints.
pub struct SyncHub {
    capacity: usize,
    to_hub: Sender<(usize, SyncMessage)>,
    from_endpoints: Receiver<(usize, SyncMessage)>,
    endpoints: Vec<Option<Sender<Delivery>>>,
    latest: HashMap<EntityTypeId, KnowledgePayload>,
}

impl SyncHub {
    /// Creates a hub with [`DEFAULT_SYNC_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SYNC_CAPACITY)
    }

    /// Creates a hub whose channels hold at most `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (to_hub, from_endpoints) = bounded(capacity);
        Self {
            capacity,
            to_hub,
            from_endpoints,
            endpoints: Vec::new(),
            latest: HashMap::new(),
        }
    }

    /// Connects a new endpoint.
    pub fn endpoint(&mut self) -> ChannelSync {
        let (sender, inbound) = bounded(self.capacity);
        let id = self.endpoints.len();
        self.endpoints.push(Some(sender));
        ChannelSync {
            id,
            outbound: self.to_hub.clone(),
            inbound,
        }
    }

    /// Latest payload pushed for `entity_type`.
    #[must_use]
    pub fn latest(&self, entity_type: &EntityTypeId) -> Option<&KnowledgePayload> {
        self.latest.get(entity_type)
    }

    /// Routes every pending message. Returns the number processed.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok((from, message)) = self.from_endpoints.try_recv() {
            processed += 1;
            match message {
                SyncMessage::Request { entity_type } => {
                    if let Some(payload) = self.latest.get(&entity_type).cloned() {
                        trace!(to = from, "Answering sync request for {entity_type}");
                        self.deliver(from, &entity_type, payload);
                    } else {
                        trace!(to = from, "No shared table yet for {entity_type}");
                    }
                },
                SyncMessage::Push {
                    protocol,
                    entity_type,
                    payload,
                } => {
                    if !SchemaVersion::SYNC_PROTOCOL.is_compatible_with(&protocol) {
                        debug!(
                            from,
                            %protocol,
                            "Dropping push for {entity_type} from incompatible endpoint"
                        );
                        continue;
                    }
                    trace!(
                        from,
                        states = payload.state_count(),
                        "Forwarding push for {entity_type}"
                    );
                    for to in 0..self.endpoints.len() {
                        if to != from {
                            self.deliver(to, &entity_type, payload.clone());
                        }
                    }
                    self.latest.insert(entity_type, payload);
                },
            }
        }
        processed
    }

    fn deliver(&mut self, to: usize, entity_type: &EntityTypeId, payload: KnowledgePayload) {
        let Some(slot) = self.endpoints.get_mut(to) else {
            return;
        };
        let Some(sender) = slot.as_ref() else {
            return;
        };
        match sender.try_send((entity_type.clone(), payload)) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                debug!(to, "Sync endpoint full, dropping payload for {entity_type}");
            },
            Err(TrySendError::Disconnected(_)) => {
                debug!(to, "Sync endpoint disconnected");
                *slot = None;
            },
        }
    }
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHub")
            .field("capacity", &self.capacity)
            .field("endpoints", &self.endpoints.len())
            .field("types", &self.latest.len())
            .finish_non_exhaustive()
    }
}
