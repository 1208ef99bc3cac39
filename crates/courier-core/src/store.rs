//! Message store contract and in-memory reference implementation
//!
//! The store is the durable collaborator the rest of the core manipulates:
//! a key-indexed, ordered collection of message records with change
//! notification. Its atomic `update` is the sole synchronization primitive
//! for delivery mutations: the transition legality check runs under the
//! same commit as the write, so no record can regress under concurrency.

use std::sync::Mutex;

use hashbrown::HashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::{ChannelConfig, StoreConfig};
use crate::delivery::{DeliveryState, DeliveryTransition, TransitionOutcome};
use crate::message::MessageRecord;
use crate::types::{ConversationId, RecordId};
use crate::{CourierError, Result, StorageError};

// ----------------------------------------------------------------------------
// Change Notification
// ----------------------------------------------------------------------------

/// Event emitted after a committed store mutation
///
/// Notification strictly happens-after the durable write; consumers never
/// observe a record the store has not committed.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A new record was inserted
    Inserted { record: MessageRecord },
    /// A record's delivery state changed
    Updated { record: MessageRecord },
}

impl StoreEvent {
    /// The record the event carries
    pub fn record(&self) -> &MessageRecord {
        match self {
            StoreEvent::Inserted { record } | StoreEvent::Updated { record } => record,
        }
    }
}

// ----------------------------------------------------------------------------
// Message Store Contract
// ----------------------------------------------------------------------------

/// Contract required of the durable message store
///
/// Implementations must guarantee: `insert` completes (or reports failure)
/// before the caller proceeds; `update` is atomic compare-and-set keyed on
/// the record's current delivery state; a failed operation leaves the prior
/// observable state untouched.
pub trait MessageStore: Send + Sync {
    /// Durably insert a record, assigning its id
    fn insert(&self, record: MessageRecord) -> Result<RecordId>;

    /// Atomically apply a delivery transition to a record
    ///
    /// The mutation is restricted to the delivery state and network id; an
    /// illegal transition is rejected without touching the record.
    fn update(&self, id: RecordId, transition: DeliveryTransition) -> Result<TransitionOutcome>;

    /// Fetch a record by id
    fn get(&self, id: RecordId) -> Result<Option<MessageRecord>>;

    /// All records of a conversation, ordered by creation time then id
    fn by_conversation(&self, conversation: ConversationId) -> Result<Vec<MessageRecord>>;

    /// All records currently in `Sent` state, for correlator rebuild
    fn sent_records(&self) -> Result<Vec<MessageRecord>>;

    /// All records currently in `Pending` state, for retry on reconnect
    fn pending_records(&self, conversation: ConversationId) -> Result<Vec<MessageRecord>>;

    /// Subscribe to the change-notification feed
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

// ----------------------------------------------------------------------------
// In-Memory Store
// ----------------------------------------------------------------------------

struct StoreInner {
    next_id: u64,
    records: HashMap<RecordId, MessageRecord>,
    /// Per-conversation record ids in insertion order
    conversations: HashMap<ConversationId, Vec<RecordId>>,
}

/// In-memory reference implementation of [`MessageStore`]
///
/// A single lock serializes all mutations, which gives `update` its
/// compare-and-set semantics directly. Change events are published on a
/// broadcast channel while the commit lock is held, so subscribers observe
/// mutations in commit order.
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    events: broadcast::Sender<StoreEvent>,
    config: StoreConfig,
}

impl MemoryStore {
    /// Create an empty store with default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default(), &ChannelConfig::default())
    }

    /// Create an empty store with the given limits and notify buffer size
    pub fn with_config(config: StoreConfig, channels: &ChannelConfig) -> Self {
        let (events, _) = broadcast::channel(channels.notify_buffer_size);
        Self {
            inner: Mutex::new(StoreInner {
                next_id: 1,
                records: HashMap::new(),
                conversations: HashMap::new(),
            }),
            events,
            config,
        }
    }

    /// Total number of stored records
    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // A poisoned lock means a panic mid-commit; nothing to salvage.
        self.inner.lock().expect("message store lock poisoned")
    }

    fn validate_input(&self, record: &MessageRecord) -> Result<()> {
        record.validate()?;

        let char_count = record.text().chars().count();
        if char_count > self.config.max_text_length {
            return Err(CourierError::invalid_message(format!(
                "text exceeds maximum length of {} characters",
                self.config.max_text_length
            )));
        }

        let record_size = bincode::serialized_size(record)
            .map_err(|e| CourierError::write_failed(e.to_string()))?;
        if record_size as usize > self.config.max_record_size {
            return Err(CourierError::invalid_message(format!(
                "record size {} bytes exceeds maximum of {} bytes",
                record_size, self.config.max_record_size
            )));
        }

        Ok(())
    }

    fn notify(&self, event: StoreEvent) {
        // No subscribers is fine; the feed is best-effort for presentation.
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for MemoryStore {
    fn insert(&self, mut record: MessageRecord) -> Result<RecordId> {
        self.validate_input(&record)?;

        let mut inner = self.lock();

        if inner.records.len() >= self.config.max_total_records {
            return Err(StorageError::CapacityExceeded {
                limit: self.config.max_total_records,
            }
            .into());
        }
        let conversation = record.conversation();
        if let Some(ids) = inner.conversations.get(&conversation) {
            if ids.len() >= self.config.max_records_per_conversation {
                return Err(StorageError::CapacityExceeded {
                    limit: self.config.max_records_per_conversation,
                }
                .into());
            }
        }

        let id = RecordId::new(inner.next_id);
        inner.next_id += 1;
        record.assign_id(id);

        inner.records.insert(id, record.clone());
        inner.conversations.entry(conversation).or_default().push(id);

        self.notify(StoreEvent::Inserted { record });
        Ok(id)
    }

    fn update(&self, id: RecordId, transition: DeliveryTransition) -> Result<TransitionOutcome> {
        let mut inner = self.lock();

        let record = inner
            .records
            .get_mut(&id)
            .ok_or(StorageError::UnknownRecord { id })?;

        // Legality check and mutation under the same lock: compare-and-set
        // keyed on the current delivery state.
        let outcome = transition.apply(record)?;

        match outcome {
            TransitionOutcome::Applied => {
                let committed = record.clone();
                debug!(record = %id, state = %committed.delivery(), "delivery state committed");
                self.notify(StoreEvent::Updated { record: committed });
            }
            TransitionOutcome::AlreadyDelivered => {
                debug!(record = %id, "duplicate delivery acknowledgment ignored");
            }
        }

        Ok(outcome)
    }

    fn get(&self, id: RecordId) -> Result<Option<MessageRecord>> {
        Ok(self.lock().records.get(&id).cloned())
    }

    fn by_conversation(&self, conversation: ConversationId) -> Result<Vec<MessageRecord>> {
        let inner = self.lock();

        let ids = match inner.conversations.get(&conversation) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };

        let mut records: Vec<MessageRecord> = ids
            .iter()
            .filter_map(|id| inner.records.get(id))
            .cloned()
            .collect();

        records.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then(a.id().cmp(&b.id()))
        });

        Ok(records)
    }

    fn sent_records(&self) -> Result<Vec<MessageRecord>> {
        Ok(self
            .lock()
            .records
            .values()
            .filter(|r| r.delivery() == DeliveryState::Sent)
            .cloned()
            .collect())
    }

    fn pending_records(&self, conversation: ConversationId) -> Result<Vec<MessageRecord>> {
        let mut records: Vec<MessageRecord> = self
            .lock()
            .records
            .values()
            .filter(|r| r.conversation() == conversation && r.delivery() == DeliveryState::Pending)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id());
        Ok(records)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
