//! Engine channel protocol
//!
//! Typed channels connecting the service handle and the transport to the
//! core-logic task. All delivery mutations funnel through these channels,
//! so the logic task serializes them without shared locks.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use courier_core::{ChannelConfig, ConversationId, RecordId};

use crate::transport::TransportEvent;

// ----------------------------------------------------------------------------
// Commands: Service Handle -> Logic Task
// ----------------------------------------------------------------------------

/// Commands sent from the service handle to the logic task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Command {
    /// Attempt transport dispatch of a pending record
    Dispatch { record: RecordId },
    /// Cancel a still-pending record
    Cancel { record: RecordId },
    /// Re-enter a failed record as pending and dispatch it afresh
    Retry { record: RecordId },
    /// Release correlation state for a closed conversation
    CloseConversation { conversation: ConversationId },
    /// Stop the logic task
    Shutdown,
}

// ----------------------------------------------------------------------------
// Channel Constructors
// ----------------------------------------------------------------------------

pub(crate) fn create_command_channel(
    config: &ChannelConfig,
) -> (mpsc::Sender<Command>, mpsc::Receiver<Command>) {
    mpsc::channel(config.command_buffer_size)
}

pub(crate) fn create_event_channel(
    config: &ChannelConfig,
) -> (mpsc::Sender<TransportEvent>, mpsc::Receiver<TransportEvent>) {
    mpsc::channel(config.event_buffer_size)
}
