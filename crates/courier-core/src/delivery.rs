//! Delivery state machine
//!
//! Governs the legal transitions of a message record's delivery status:
//! `Pending -> Sent -> Delivered`, with `Failed` reachable from `Pending`
//! (and, for transport failures, from `Sent`), and `Retry` as the single
//! permitted re-entry from `Failed` back to `Pending`. Transitions are
//! applied by the message store under its atomic update, so a concurrent
//! cancel and acknowledgment race is resolved by whichever transition
//! commits first.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::message::{Direction, MessageRecord};
use crate::types::NetworkMessageId;

// ----------------------------------------------------------------------------
// Delivery State
// ----------------------------------------------------------------------------

/// Delivery status of an outgoing message record
///
/// Incoming records are `Delivered` at creation and never transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryState {
    /// Durably recorded, not yet accepted by the transport
    Pending,
    /// Accepted by the transport, awaiting peer acknowledgment
    Sent,
    /// Peer acknowledged receipt
    Delivered,
    /// Send abandoned, with the reason recorded
    Failed(FailureReason),
}

impl DeliveryState {
    /// Whether no further transition is expected (failed records may still
    /// be retried explicitly)
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::Failed(_))
    }

    fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Pending => "pending",
            DeliveryState::Sent => "sent",
            DeliveryState::Delivered => "delivered",
            DeliveryState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryState::Failed(reason) => write!(f, "failed ({reason})"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

// ----------------------------------------------------------------------------
// Failure Reason
// ----------------------------------------------------------------------------

/// Reason code recorded on a failed message, surfaced in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Cancelled by the caller while still pending
    Cancelled,
    /// Peer unreachable after the ack timeout elapsed
    PeerUnreachable,
    /// Retry budget exhausted without transport acceptance
    RetriesExhausted,
    /// Transport rejected the send outright
    TransportRejected,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::Cancelled => "cancelled",
            FailureReason::PeerUnreachable => "peer unreachable",
            FailureReason::RetriesExhausted => "retries exhausted",
            FailureReason::TransportRejected => "transport rejected",
        };
        write!(f, "{s}")
    }
}

// ----------------------------------------------------------------------------
// Transition Error
// ----------------------------------------------------------------------------

/// Attempted transition not permitted from the record's current state
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot {event} a message in state {from}")]
pub struct TransitionError {
    /// State the record was in when the transition was attempted
    pub from: DeliveryState,
    /// Label of the rejected transition
    pub event: &'static str,
}

// ----------------------------------------------------------------------------
// Delivery Transition
// ----------------------------------------------------------------------------

/// A requested change to a record's delivery status
///
/// The only mutations the store's `update` accepts: delivery state and the
/// network id, nothing else. `apply` validates against the current state
/// before touching the record, so a rejected transition leaves it intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryTransition {
    /// Transport accepted the send and produced a network id
    MarkSent { network_id: NetworkMessageId },
    /// Peer acknowledged receipt
    MarkDelivered,
    /// Abandon the send with a reason
    MarkFailed { reason: FailureReason },
    /// Re-enter `Pending` from `Failed` for a fresh send attempt
    Retry,
}

/// What applying a transition did to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The record changed state
    Applied,
    /// Duplicate acknowledgment for an already-delivered record; no change
    AlreadyDelivered,
}

impl DeliveryTransition {
    /// Short label for logs and transition errors
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryTransition::MarkSent { .. } => "mark sent",
            DeliveryTransition::MarkDelivered => "deliver",
            DeliveryTransition::MarkFailed {
                reason: FailureReason::Cancelled,
            } => "cancel",
            DeliveryTransition::MarkFailed { .. } => "fail",
            DeliveryTransition::Retry => "retry",
        }
    }

    /// Apply this transition to a record, checking legality first
    ///
    /// The check and the mutation are a single unit: callers (the store)
    /// run this under the same lock as the commit, giving compare-and-set
    /// semantics keyed on the current state.
    pub fn apply(&self, record: &mut MessageRecord) -> Result<TransitionOutcome, TransitionError> {
        let from = record.delivery();

        if record.direction() == Direction::Incoming {
            return Err(self.rejected(from));
        }

        match (self, from) {
            (DeliveryTransition::MarkSent { network_id }, DeliveryState::Pending) => {
                record.set_delivery(DeliveryState::Sent);
                record.set_network_id(Some(*network_id));
                Ok(TransitionOutcome::Applied)
            }

            (DeliveryTransition::MarkDelivered, DeliveryState::Sent) => {
                record.set_delivery(DeliveryState::Delivered);
                Ok(TransitionOutcome::Applied)
            }
            // Duplicate acknowledgments are expected under at-least-once
            // delivery of the ack stream.
            (DeliveryTransition::MarkDelivered, DeliveryState::Delivered) => {
                Ok(TransitionOutcome::AlreadyDelivered)
            }

            // Cancellation only applies to still-pending records; a record
            // the transport already accepted keeps its fate.
            (
                DeliveryTransition::MarkFailed {
                    reason: FailureReason::Cancelled,
                },
                DeliveryState::Pending,
            ) => {
                record.set_delivery(DeliveryState::Failed(FailureReason::Cancelled));
                Ok(TransitionOutcome::Applied)
            }
            (
                DeliveryTransition::MarkFailed { reason },
                DeliveryState::Pending | DeliveryState::Sent,
            ) if *reason != FailureReason::Cancelled => {
                record.set_delivery(DeliveryState::Failed(*reason));
                // No acknowledgment is expected afterward; the binding is
                // released and a retry requests a fresh network id.
                record.set_network_id(None);
                Ok(TransitionOutcome::Applied)
            }

            (DeliveryTransition::Retry, DeliveryState::Failed(_)) => {
                record.set_delivery(DeliveryState::Pending);
                record.set_network_id(None);
                Ok(TransitionOutcome::Applied)
            }

            _ => Err(self.rejected(from)),
        }
    }

    fn rejected(&self, from: DeliveryState) -> TransitionError {
        TransitionError {
            from,
            event: self.label(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
