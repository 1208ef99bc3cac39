//! Transport adapter boundary
//!
//! The transport collaborator owns the actual network I/O: encrypting and
//! sending bytes to a peer, surfacing acknowledgments, and reporting
//! connectivity changes. This module defines the boundary the delivery
//! engine consumes: a send trait plus a typed event stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use courier_core::{ConversationId, MessageKind, NetworkMessageId, Timestamp, TransportError};

// ----------------------------------------------------------------------------
// Transport Adapter
// ----------------------------------------------------------------------------

/// Send-side contract of the transport collaborator
///
/// `send` resolves once the transport has accepted the message and assigned
/// a network id, not when the peer acknowledges receipt. Implementations
/// must bound the call with their own timeout/retry policy; the engine maps
/// errors to retries and, eventually, a failed record.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    async fn send(
        &self,
        conversation: ConversationId,
        text: &str,
        kind: MessageKind,
    ) -> Result<NetworkMessageId, TransportError>;
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Events emitted by the transport toward the delivery engine
///
/// The acknowledgment stream is at-least-once: duplicates are expected and
/// tolerated downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransportEvent {
    /// The peer acknowledged receipt of a message
    Acknowledged {
        conversation: ConversationId,
        network_id: NetworkMessageId,
        delivered_at: Timestamp,
    },
    /// A message arrived from the peer
    Inbound {
        conversation: ConversationId,
        text: String,
        kind: MessageKind,
        timestamp: Timestamp,
    },
    /// The peer became reachable
    PeerOnline { conversation: ConversationId },
    /// The peer became unreachable
    PeerOffline { conversation: ConversationId },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
