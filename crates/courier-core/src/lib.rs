//! Courier delivery-tracking core
//!
//! This crate provides the data model and deterministic state for tracking
//! text-message delivery in a peer-to-peer messaging client: durable message
//! records, the delivery state machine, the outbound correlator that maps
//! local records to transport-assigned network ids, and the message store
//! contract with an in-memory reference implementation.
//!
//! Async orchestration (transport dispatch, retries, reconciliation) lives
//! in `courier-runtime`; everything here is synchronous and unit-testable.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod correlator;
pub mod delivery;
pub mod errors;
pub mod message;
pub mod store;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{ChannelConfig, DeliveryConfig, StoreConfig};
pub use correlator::{CorrelationHandle, OutboundCorrelator};
pub use delivery::{
    DeliveryState, DeliveryTransition, FailureReason, TransitionError, TransitionOutcome,
};
pub use errors::{CorrelationError, CourierError, Result, StorageError, TransportError};
pub use message::{Direction, MessageKind, MessageRecord};
pub use store::{MemoryStore, MessageStore, StoreEvent};
pub use types::{
    ConversationId, NetworkMessageId, PeerId, RecordId, SystemTimeSource, TimeSource, Timestamp,
};
