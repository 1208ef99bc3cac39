//! Core-logic task
//!
//! The single task that owns the outbound correlator and drives every
//! delivery mutation: dispatching pending records to the transport, binding
//! network ids, resolving acknowledgments, scheduling retries with
//! exponential backoff, and reconciling state on startup. Commands arrive
//! from the service handle and events from the transport over bounded
//! channels; the store's compare-and-set update remains the final
//! serialization point per record, so races (late cancel vs. transport
//! acceptance, duplicate acks) are resolved at the commit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use courier_core::{
    ConversationId, CorrelationHandle, CourierError, DeliveryConfig, DeliveryState,
    DeliveryTransition, FailureReason, MessageRecord, MessageStore, OutboundCorrelator, RecordId,
    TimeSource, TransitionOutcome,
};

use crate::channel::Command;
use crate::transport::{TransportAdapter, TransportEvent};

// ----------------------------------------------------------------------------
// Logic Task
// ----------------------------------------------------------------------------

pub(crate) struct LogicTask<T: TimeSource> {
    store: Arc<dyn MessageStore>,
    transport: Arc<dyn TransportAdapter>,
    config: DeliveryConfig,
    time_source: T,
    correlator: OutboundCorrelator,
    /// Live correlation handles for records between registration and bind
    handles: HashMap<RecordId, CorrelationHandle>,
    /// Dispatch attempts per record since it last entered pending
    attempts: HashMap<RecordId, u32>,
    /// Conversations whose peer is currently unreachable
    offline: HashSet<ConversationId>,
    /// Loopback sender for retry timers
    command_tx: mpsc::Sender<Command>,
    command_rx: mpsc::Receiver<Command>,
    event_rx: mpsc::Receiver<TransportEvent>,
}

impl<T: TimeSource> LogicTask<T> {
    pub(crate) fn new(
        store: Arc<dyn MessageStore>,
        transport: Arc<dyn TransportAdapter>,
        config: DeliveryConfig,
        time_source: T,
        command_tx: mpsc::Sender<Command>,
        command_rx: mpsc::Receiver<Command>,
        event_rx: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            time_source,
            correlator: OutboundCorrelator::new(),
            handles: HashMap::new(),
            attempts: HashMap::new(),
            offline: HashSet::new(),
            command_tx,
            command_rx,
            event_rx,
        }
    }

    /// Run until shutdown
    pub(crate) async fn run(mut self) {
        self.reconcile();

        let sweep_period = (self.config.ack_timeout / 4).max(Duration::from_millis(250));
        let mut sweep = tokio::time::interval(sweep_period);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut events_open = true;

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(Command::Shutdown) | None => {
                        info!("logic task shutting down");
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                },
                event = self.event_rx.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!("transport event feed closed");
                        events_open = false;
                    }
                },
                _ = sweep.tick() => self.sweep_ack_timeouts(),
            }
        }
    }

    /// Rebuild the correlator from the durable store on startup
    ///
    /// Only `Sent` records re-enter the binding table; `Pending` records are
    /// left unregistered and retryable. The transport has no memory of past
    /// sessions, so nothing is derived from it.
    fn reconcile(&mut self) {
        match self.store.sent_records() {
            Ok(records) => {
                self.correlator.rebuild(records.iter());
                info!(
                    bindings = self.correlator.binding_count(),
                    "correlator rebuilt from durable state"
                );
            }
            Err(e) => error!(error = %e, "startup reconciliation failed"),
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Dispatch { record } => self.dispatch(record).await,
            Command::Cancel { record } => self.cancel(record),
            Command::Retry { record } => self.retry(record).await,
            Command::CloseConversation { conversation } => {
                debug!(%conversation, "conversation closed, pruning correlations");
                self.correlator.prune_conversation(conversation);
                self.offline.remove(&conversation);
            }
            Command::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Acknowledged {
                conversation,
                network_id,
                delivered_at,
            } => {
                let Some(record) = self
                    .correlator
                    .resolve_acknowledgment(conversation, network_id)
                else {
                    // Stale or foreign ack (e.g. from before a restart):
                    // logged and discarded, never surfaced as a failure.
                    warn!(%conversation, %network_id, "unknown acknowledgment discarded");
                    return;
                };

                match self.store.update(record, DeliveryTransition::MarkDelivered) {
                    Ok(TransitionOutcome::Applied) => {
                        debug!(%record, %network_id, delivered_at = delivered_at.as_millis(),
                            "delivery confirmed");
                    }
                    Ok(TransitionOutcome::AlreadyDelivered) => {
                        debug!(%record, "duplicate acknowledgment ignored");
                    }
                    Err(e) => {
                        warn!(%record, error = %e, "acknowledgment could not be applied");
                    }
                }
            }

            TransportEvent::Inbound {
                conversation,
                text,
                kind,
                timestamp,
            } => {
                let record = MessageRecord::incoming(conversation, text, kind, timestamp);
                if let Err(e) = self.store.insert(record) {
                    error!(%conversation, error = %e, "failed to store inbound message");
                }
            }

            TransportEvent::PeerOnline { conversation } => {
                self.offline.remove(&conversation);
                self.retry_pending(conversation).await;
            }

            TransportEvent::PeerOffline { conversation } => {
                debug!(%conversation, "peer went offline");
                self.offline.insert(conversation);
            }
        }
    }

    /// Attempt transport dispatch of a pending record
    async fn dispatch(&mut self, id: RecordId) {
        let record = match self.store.get(id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(%id, "dispatch requested for unknown record");
                return;
            }
            Err(e) => {
                error!(%id, error = %e, "store read failed during dispatch");
                return;
            }
        };

        if record.delivery() != DeliveryState::Pending {
            debug!(%id, state = %record.delivery(), "skipping dispatch of non-pending record");
            return;
        }
        if self.offline.contains(&record.conversation()) {
            // Left pending; the next PeerOnline event re-dispatches.
            debug!(%id, "peer offline, dispatch deferred");
            return;
        }

        let handle = match self.handles.get(&id) {
            Some(handle) => handle.clone(),
            None => match self.correlator.register_pending(&record) {
                Ok(handle) => {
                    self.handles.insert(id, handle.clone());
                    handle
                }
                Err(e) => {
                    // Precondition violation in this task; do not retry.
                    error!(%id, error = %e, "correlator registration failed");
                    return;
                }
            },
        };

        let attempt = {
            let counter = self.attempts.entry(id).or_insert(0);
            *counter += 1;
            *counter
        };

        match self
            .transport
            .send(record.conversation(), record.text(), record.kind())
            .await
        {
            Ok(network_id) => {
                if let Err(e) = self.correlator.bind_network_id(&handle, network_id) {
                    // DuplicateBinding is a transport bug or replay; surface
                    // it loudly and abandon the record rather than guess.
                    error!(%id, %network_id, error = %e, "network id binding rejected");
                    self.fail_record(id, FailureReason::TransportRejected);
                    return;
                }
                self.handles.remove(&id);

                match self
                    .store
                    .update(id, DeliveryTransition::MarkSent { network_id })
                {
                    Ok(_) => {
                        self.attempts.remove(&id);
                        debug!(%id, %network_id, attempt, "transport accepted send");
                    }
                    Err(e) => {
                        // The record changed underneath us (e.g. cancelled
                        // while the send was in flight); the commit wins.
                        warn!(%id, error = %e, "record no longer pending after send");
                        self.correlator.unbind(record.conversation(), network_id);
                    }
                }
            }

            Err(transport_err) => {
                warn!(%id, attempt, error = %transport_err, "transport send failed");
                if !transport_err.is_retryable() {
                    self.fail_record(id, FailureReason::TransportRejected);
                } else if attempt > self.config.max_retries {
                    self.fail_record(id, FailureReason::RetriesExhausted);
                } else {
                    self.schedule_retry(id, attempt);
                }
            }
        }
    }

    /// Re-enqueue a dispatch after the backoff delay
    fn schedule_retry(&self, id: RecordId, attempt: u32) {
        let delay = self.config.backoff_delay(attempt);
        let tx = self.command_tx.clone();
        debug!(%id, attempt, delay_ms = delay.as_millis() as u64, "retry scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::Dispatch { record: id }).await;
        });
    }

    fn cancel(&mut self, id: RecordId) {
        match self.store.update(
            id,
            DeliveryTransition::MarkFailed {
                reason: FailureReason::Cancelled,
            },
        ) {
            Ok(_) => {
                if let Some(handle) = self.handles.remove(&id) {
                    self.correlator.abandon(handle);
                }
                self.attempts.remove(&id);
                debug!(%id, "pending send cancelled");
            }
            // The record already reached sent/delivered: the cancel lost the
            // race and is ignored.
            Err(CourierError::Transition(e)) => {
                debug!(%id, from = %e.from, "late cancel ignored");
            }
            Err(e) => warn!(%id, error = %e, "cancel failed"),
        }
    }

    /// Re-enter a failed record as pending with a fresh attempt counter
    async fn retry(&mut self, id: RecordId) {
        match self.store.update(id, DeliveryTransition::Retry) {
            Ok(_) => {
                self.attempts.remove(&id);
                self.dispatch(id).await;
            }
            Err(e) => debug!(%id, error = %e, "retry rejected"),
        }
    }

    /// Re-dispatch every pending record of a conversation
    async fn retry_pending(&mut self, conversation: ConversationId) {
        let pending = match self.store.pending_records(conversation) {
            Ok(records) => records,
            Err(e) => {
                error!(%conversation, error = %e, "could not list pending records");
                return;
            }
        };

        if !pending.is_empty() {
            info!(%conversation, count = pending.len(), "peer online, retrying pending records");
        }
        for record in pending {
            self.dispatch(record.id()).await;
        }
    }

    /// Fail sent records whose acknowledgment never arrived
    fn sweep_ack_timeouts(&mut self) {
        let now = self.time_source.now();
        let records = match self.store.sent_records() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "ack timeout sweep skipped");
                return;
            }
        };

        for record in records {
            if now.duration_since(record.created_at()) <= self.config.ack_timeout {
                continue;
            }
            let id = record.id();
            warn!(%id, "no acknowledgment within timeout, marking failed");
            if let Some(network_id) = record.network_id() {
                self.correlator.unbind(record.conversation(), network_id);
            }
            if let Err(e) = self.store.update(
                id,
                DeliveryTransition::MarkFailed {
                    reason: FailureReason::PeerUnreachable,
                },
            ) {
                // An ack may have landed between the read and this update;
                // the committed state stands.
                debug!(%id, error = %e, "timeout transition rejected");
            }
        }
    }

    fn fail_record(&mut self, id: RecordId, reason: FailureReason) {
        if let Some(handle) = self.handles.remove(&id) {
            self.correlator.abandon(handle);
        }
        self.attempts.remove(&id);
        if let Err(e) = self
            .store
            .update(id, DeliveryTransition::MarkFailed { reason })
        {
            warn!(%id, error = %e, "failure transition rejected");
        }
    }
}
