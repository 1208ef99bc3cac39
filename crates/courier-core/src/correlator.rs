//! Outbound correlator
//!
//! Bridges the local identifier space (record ids, assigned synchronously at
//! insert) and the transport's identifier space (network message ids,
//! assigned asynchronously once the peer is reachable). Populated on the
//! send path, consulted on the acknowledgment path, and rebuilt from the
//! durable store's sent-state records after a restart; the transport has
//! no memory of past sessions.

use hashbrown::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::delivery::DeliveryState;
use crate::message::{Direction, MessageRecord};
use crate::types::{ConversationId, NetworkMessageId, RecordId};
use crate::{CorrelationError, CourierError, Result};

// ----------------------------------------------------------------------------
// Correlation Handle
// ----------------------------------------------------------------------------

/// Token returned by [`OutboundCorrelator::register_pending`]
///
/// Proof that a record was registered before any network I/O; required to
/// later bind the transport's id or abandon the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationHandle {
    token: Uuid,
    record: RecordId,
    conversation: ConversationId,
}

impl CorrelationHandle {
    /// The record this handle was issued for
    pub fn record(&self) -> RecordId {
        self.record
    }

    /// The conversation scoping the eventual binding
    pub fn conversation(&self) -> ConversationId {
        self.conversation
    }
}

// ----------------------------------------------------------------------------
// Outbound Correlator
// ----------------------------------------------------------------------------

/// Maps `(conversation, network id)` pairs to local record ids
///
/// Exactly one record may own a `(conversation, network id)` pair once the
/// id is bound; a second bind attempt for the same pair is a protocol
/// violation surfaced as [`CourierError::DuplicateBinding`].
#[derive(Debug, Default)]
pub struct OutboundCorrelator {
    /// Live registrations awaiting a network id, keyed by record
    pending: HashMap<RecordId, Uuid>,
    /// Bound correlations, populated only by `bind_network_id` and `rebuild`
    bindings: HashMap<(ConversationId, NetworkMessageId), RecordId>,
}

impl OutboundCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outgoing record before any network I/O
    ///
    /// Fails if the record is not outgoing or a handle already exists for
    /// it; both are caller bugs, fatal to the caller and never retried.
    pub fn register_pending(&mut self, record: &MessageRecord) -> Result<CorrelationHandle> {
        if record.direction() != Direction::Outgoing {
            return Err(CorrelationError::NotOutgoing {
                record: record.id(),
            }
            .into());
        }
        if self.pending.contains_key(&record.id()) {
            return Err(CorrelationError::AlreadyRegistered {
                record: record.id(),
            }
            .into());
        }

        let token = Uuid::new_v4();
        self.pending.insert(record.id(), token);
        Ok(CorrelationHandle {
            token,
            record: record.id(),
            conversation: record.conversation(),
        })
    }

    /// Bind the transport-assigned network id to a registered record
    ///
    /// Consumes the pending registration. Binding the same pair to the same
    /// record again is a no-op; binding it to a different record fails with
    /// `DuplicateBinding` and leaves the existing binding untouched.
    pub fn bind_network_id(
        &mut self,
        handle: &CorrelationHandle,
        network_id: NetworkMessageId,
    ) -> Result<()> {
        match self.pending.get(&handle.record) {
            Some(token) if *token == handle.token => {}
            _ => return Err(CorrelationError::UnknownHandle.into()),
        }

        let key = (handle.conversation, network_id);
        if let Some(existing) = self.bindings.get(&key) {
            if *existing != handle.record {
                return Err(CourierError::duplicate_binding(
                    handle.conversation,
                    network_id,
                ));
            }
            self.pending.remove(&handle.record);
            return Ok(());
        }

        self.pending.remove(&handle.record);
        self.bindings.insert(key, handle.record);
        Ok(())
    }

    /// Resolve an acknowledgment to the record it confirms
    ///
    /// Returns `None` for stale or foreign acknowledgments; the caller logs
    /// and discards those.
    pub fn resolve_acknowledgment(
        &self,
        conversation: ConversationId,
        network_id: NetworkMessageId,
    ) -> Option<RecordId> {
        self.bindings.get(&(conversation, network_id)).copied()
    }

    /// Remove a pending registration without binding
    ///
    /// Used on permanent send failure; a later retry registers afresh.
    pub fn abandon(&mut self, handle: CorrelationHandle) {
        self.pending.remove(&handle.record);
    }

    /// Drop the binding for a pair whose record no longer expects an
    /// acknowledgment (failed after transport acceptance)
    pub fn unbind(&mut self, conversation: ConversationId, network_id: NetworkMessageId) {
        self.bindings.remove(&(conversation, network_id));
    }

    /// Drop all state for a closed conversation
    pub fn prune_conversation(&mut self, conversation: ConversationId) {
        self.bindings.retain(|(conv, _), _| *conv != conversation);
    }

    /// Rebuild bindings from the durable store's sent-state records
    ///
    /// Startup reconciliation: only records the store committed as `Sent`
    /// (which therefore carry a network id) re-enter the table. Pending
    /// records stay unregistered and retryable.
    pub fn rebuild<'a, I>(&mut self, sent_records: I)
    where
        I: IntoIterator<Item = &'a MessageRecord>,
    {
        self.pending.clear();
        self.bindings.clear();

        for record in sent_records {
            if record.delivery() != DeliveryState::Sent {
                debug!(record = %record.id(), state = %record.delivery(),
                    "skipping non-sent record during correlator rebuild");
                continue;
            }
            let Some(network_id) = record.network_id() else {
                debug!(record = %record.id(), "sent record without network id, skipping");
                continue;
            };
            self.bindings
                .insert((record.conversation(), network_id), record.id());
        }
    }

    /// Number of bound correlations
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of registrations awaiting a network id
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
