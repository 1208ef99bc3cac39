//! Message record data model
//!
//! Defines the durable unit of state tracked by the delivery core: a single
//! text message with identity, direction, kind, and delivery status. Records
//! are immutable by default; delivery status and the network id are changed
//! only through the delivery state machine's transition operations.

use serde::{Deserialize, Serialize};

use crate::delivery::{DeliveryState, FailureReason};
use crate::types::{ConversationId, NetworkMessageId, RecordId, Timestamp};
use crate::{CourierError, Result};

// ----------------------------------------------------------------------------
// Message Kind
// ----------------------------------------------------------------------------

/// Kind tag for a text message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    /// Plain text message
    Normal = 0x00,
    /// Action message (emote, rendered as "/me ...")
    Action = 0x01,
}

impl MessageKind {
    /// Convert from raw wire tag
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(MessageKind::Normal),
            0x01 => Ok(MessageKind::Action),
            _ => Err(CourierError::invalid_message("unknown message kind")),
        }
    }

    /// Convert to raw wire tag
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// ----------------------------------------------------------------------------
// Direction
// ----------------------------------------------------------------------------

/// Direction of a message relative to the local user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Sent by the local user
    Outgoing,
    /// Received from the peer
    Incoming,
}

// ----------------------------------------------------------------------------
// Message Record
// ----------------------------------------------------------------------------

/// A single text message tracked by the delivery core
///
/// `id` is assigned by the message store at insert time. `text`, `kind`,
/// `direction`, `conversation`, and `created_at` are immutable after
/// creation. `delivery` and `network_id` change only via
/// [`DeliveryTransition::apply`](crate::delivery::DeliveryTransition),
/// which the store runs under its atomic update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    id: RecordId,
    conversation: ConversationId,
    text: String,
    kind: MessageKind,
    direction: Direction,
    delivery: DeliveryState,
    network_id: Option<NetworkMessageId>,
    created_at: Timestamp,
}

impl MessageRecord {
    /// Create an outgoing record, initially pending with no network id
    pub fn outgoing(
        conversation: ConversationId,
        text: String,
        kind: MessageKind,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: RecordId::UNASSIGNED,
            conversation,
            text,
            kind,
            direction: Direction::Outgoing,
            delivery: DeliveryState::Pending,
            network_id: None,
            created_at,
        }
    }

    /// Create an incoming record
    ///
    /// Incoming messages are delivered by definition and never transition.
    pub fn incoming(
        conversation: ConversationId,
        text: String,
        kind: MessageKind,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: RecordId::UNASSIGNED,
            conversation,
            text,
            kind,
            direction: Direction::Incoming,
            delivery: DeliveryState::Delivered,
            network_id: None,
            created_at,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn conversation(&self) -> ConversationId {
        self.conversation
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn delivery(&self) -> DeliveryState {
        self.delivery
    }

    pub fn network_id(&self) -> Option<NetworkMessageId> {
        self.network_id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// The failure reason, if this record has failed
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self.delivery {
            DeliveryState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Validate record structure
    ///
    /// Checks the text payload and the state/network-id pairing invariant.
    pub fn validate(&self) -> Result<()> {
        if self.direction == Direction::Outgoing && self.text.is_empty() {
            return Err(CourierError::invalid_message("outgoing text is empty"));
        }

        if self.text.contains('\0') {
            return Err(CourierError::invalid_message("text contains null bytes"));
        }

        for c in self.text.chars() {
            if c.is_control() && !matches!(c, '\n' | '\r' | '\t') {
                return Err(CourierError::invalid_message(
                    "text contains invalid control characters",
                ));
            }
        }

        // network id is present exactly when the transport has accepted the send
        let expects_network_id = matches!(
            self.delivery,
            DeliveryState::Sent | DeliveryState::Delivered
        ) && self.direction == Direction::Outgoing;
        if expects_network_id != self.network_id.is_some() {
            return Err(CourierError::invalid_message(
                "network id does not match delivery state",
            ));
        }

        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    pub(crate) fn set_delivery(&mut self, delivery: DeliveryState) {
        self.delivery = delivery;
    }

    pub(crate) fn set_network_id(&mut self, network_id: Option<NetworkMessageId>) {
        self.network_id = network_id;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
