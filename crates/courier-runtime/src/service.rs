//! Messenger service
//!
//! The handle exposed to presentation layers: send, cancel, retry, history,
//! and change-notification subscriptions. Built with [`MessengerBuilder`],
//! which wires the store and transport to the core-logic task and spawns it.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;

use courier_core::{
    ChannelConfig, ConversationId, CourierError, DeliveryConfig, MessageKind, MessageRecord,
    MessageStore, RecordId, Result, StoreEvent, SystemTimeSource, Timestamp,
};

use crate::channel::{create_command_channel, create_event_channel, Command};
use crate::logic::LogicTask;
use crate::transport::{TransportAdapter, TransportEvent};

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Builder for the messenger service
#[derive(Default)]
pub struct MessengerBuilder {
    store: Option<Arc<dyn MessageStore>>,
    transport: Option<Arc<dyn TransportAdapter>>,
    delivery_config: DeliveryConfig,
    channel_config: ChannelConfig,
}

impl MessengerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            transport: None,
            delivery_config: DeliveryConfig::default(),
            channel_config: ChannelConfig::default(),
        }
    }

    /// Set the durable message store
    pub fn store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the transport adapter
    pub fn transport(mut self, transport: Arc<dyn TransportAdapter>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Override the retry/timeout configuration
    pub fn delivery_config(mut self, config: DeliveryConfig) -> Self {
        self.delivery_config = config;
        self
    }

    /// Override channel buffer sizes
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Spawn the engine and return the service handle plus the sender the
    /// transport uses to inject its events
    ///
    /// Startup reconciliation runs inside the spawned task before any
    /// command or event is consumed.
    pub fn build(self) -> Result<(Messenger, mpsc::Sender<TransportEvent>)> {
        let store = self
            .store
            .ok_or_else(|| CourierError::config_error("messenger requires a store"))?;
        let transport = self
            .transport
            .ok_or_else(|| CourierError::config_error("messenger requires a transport"))?;

        let (command_tx, command_rx) = create_command_channel(&self.channel_config);
        let (event_tx, event_rx) = create_event_channel(&self.channel_config);

        let task = LogicTask::new(
            Arc::clone(&store),
            transport,
            self.delivery_config,
            SystemTimeSource,
            command_tx.clone(),
            command_rx,
            event_rx,
        );
        let task = tokio::spawn(task.run());

        Ok((
            Messenger {
                store,
                command_tx,
                task,
            },
            event_tx,
        ))
    }
}

// ----------------------------------------------------------------------------
// Messenger Handle
// ----------------------------------------------------------------------------

/// Handle to a running messenger engine
pub struct Messenger {
    store: Arc<dyn MessageStore>,
    command_tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl Messenger {
    /// Send a text message to a conversation
    ///
    /// Returns once the pending record is durably inserted, before any
    /// network confirmation. A send that later fails surfaces as a
    /// failed-state record in history, not as an error here.
    pub async fn send_text(
        &self,
        conversation: ConversationId,
        text: String,
        kind: MessageKind,
    ) -> Result<RecordId> {
        let record = MessageRecord::outgoing(conversation, text, kind, Timestamp::now());
        let id = self.store.insert(record)?;

        // The durable record already exists; if the engine is gone the
        // record simply stays pending and is recovered on the next start.
        if let Err(e) = self.command_tx.send(Command::Dispatch { record: id }).await {
            warn!(%id, error = %e, "dispatch not enqueued, record remains pending");
        }

        Ok(id)
    }

    /// Cancel a still-pending send
    ///
    /// A late cancel (the record already reached sent or delivered) is
    /// silently ignored.
    pub async fn cancel(&self, record: RecordId) -> Result<()> {
        self.command_tx
            .send(Command::Cancel { record })
            .await
            .map_err(|_| CourierError::channel_error("logic task unavailable"))
    }

    /// Re-attempt a failed send
    pub async fn retry(&self, record: RecordId) -> Result<()> {
        self.command_tx
            .send(Command::Retry { record })
            .await
            .map_err(|_| CourierError::channel_error("logic task unavailable"))
    }

    /// Release correlation state for a conversation the user closed
    ///
    /// History is untouched; only the network-id bindings are dropped, so
    /// later acknowledgments for the conversation are discarded as unknown.
    pub async fn close_conversation(&self, conversation: ConversationId) -> Result<()> {
        self.command_tx
            .send(Command::CloseConversation { conversation })
            .await
            .map_err(|_| CourierError::channel_error("logic task unavailable"))
    }

    /// Read-only conversation history, ordered by creation time then id
    pub fn history(&self, conversation: ConversationId) -> Result<Vec<MessageRecord>> {
        self.store.by_conversation(conversation)
    }

    /// Fetch a single record
    pub fn record(&self, id: RecordId) -> Result<Option<MessageRecord>> {
        self.store.get(id)
    }

    /// Subscribe to all store change events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    /// Subscribe to change events for a single conversation
    pub fn subscribe_conversation(
        &self,
        conversation: ConversationId,
    ) -> mpsc::Receiver<StoreEvent> {
        let mut feed = self.store.subscribe();
        let (tx, rx) = mpsc::channel(ChannelConfig::default().notify_buffer_size);

        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => {
                        if event.record().conversation() != conversation {
                            continue;
                        }
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%conversation, skipped, "conversation subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        rx
    }

    /// Stop the engine gracefully
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
        let _ = self.task.await;
    }
}
