//! Courier runtime engine
//!
//! This crate contains the async engine for the Courier delivery core:
//! - `Messenger` / `MessengerBuilder`: the service handle exposed to
//!   presentation layers
//! - `TransportAdapter` / `TransportEvent`: the transport collaborator
//!   boundary
//! - the core-logic task that serializes every delivery mutation, schedules
//!   retries, and reconciles durable state on startup
//!
//! This is the "engine"; `courier-core` provides the deterministic state it
//! drives.

mod channel;
mod logic;
pub mod service;
pub mod transport;

pub use service::{Messenger, MessengerBuilder};
pub use transport::{TransportAdapter, TransportEvent};

// Re-export core types for convenience
pub use courier_core::{
    ChannelConfig, ConversationId, CourierError, DeliveryConfig, DeliveryState, Direction,
    FailureReason, MemoryStore, MessageKind, MessageRecord, MessageStore, NetworkMessageId, PeerId,
    RecordId, Result, StoreConfig, StoreEvent, Timestamp, TransportError,
};
