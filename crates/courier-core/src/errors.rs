//! Error types for the delivery core
//!
//! This module contains the error taxonomy used throughout the crate:
//! transport and storage collaborator errors, correlation misuse errors,
//! and the main CourierError type that unifies them all.

use crate::types::{ConversationId, NetworkMessageId, RecordId};

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Errors reported by the transport collaborator when a send attempt fails
///
/// These are runtime conditions, not bugs: the logic layer maps them to a
/// `Failed` delivery state once the retry budget is exhausted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("peer unreachable for conversation {conversation}")]
    PeerUnreachable { conversation: ConversationId },
    #[error("transport timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("transport rejected send: {reason}")]
    SendRejected { reason: String },
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Whether a later attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Shutdown)
    }
}

// ----------------------------------------------------------------------------
// Storage Errors
// ----------------------------------------------------------------------------

/// Errors reported by the message store collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("durable write failed: {reason}")]
    WriteFailed { reason: String },
    #[error("store capacity exceeded (limit: {limit})")]
    CapacityExceeded { limit: usize },
    #[error("no record with id {id}")]
    UnknownRecord { id: RecordId },
}

// ----------------------------------------------------------------------------
// Correlation Errors
// ----------------------------------------------------------------------------

/// Misuse of the outbound correlator
///
/// These are precondition violations in the caller, not recoverable runtime
/// conditions: callers must not retry them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CorrelationError {
    #[error("record {record} is not outgoing")]
    NotOutgoing { record: RecordId },
    #[error("a correlation handle already exists for record {record}")]
    AlreadyRegistered { record: RecordId },
    #[error("correlation handle does not match any pending registration")]
    UnknownHandle,
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the delivery-tracking core
#[derive(Debug, Clone, thiserror::Error)]
pub enum CourierError {
    /// Two attempts to bind the same network id to different records.
    /// Indicates a transport bug or replay; never silently resolved.
    #[error("network id {network_id} in conversation {conversation} is already bound to a different record")]
    DuplicateBinding {
        conversation: ConversationId,
        network_id: NetworkMessageId,
    },

    #[error("correlation error: {0}")]
    Correlation(#[from] CorrelationError),

    #[error("delivery transition error: {0}")]
    Transition(#[from] crate::delivery::TransitionError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid message: {reason}")]
    InvalidMessage { reason: String },

    /// Channel communication error (internal to the task architecture)
    #[error("channel error: {message}")]
    Channel { message: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl CourierError {
    /// Create an invalid message error with a reason
    pub fn invalid_message<T: Into<String>>(reason: T) -> Self {
        CourierError::InvalidMessage {
            reason: reason.into(),
        }
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        CourierError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        CourierError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a duplicate binding error
    pub fn duplicate_binding(conversation: ConversationId, network_id: NetworkMessageId) -> Self {
        CourierError::DuplicateBinding {
            conversation,
            network_id,
        }
    }

    /// Create a storage write failure
    pub fn write_failed<T: Into<String>>(reason: T) -> Self {
        CourierError::Storage(StorageError::WriteFailed {
            reason: reason.into(),
        })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, CourierError>;
