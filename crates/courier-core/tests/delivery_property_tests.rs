//! Property-based tests for the delivery state machine
//!
//! These tests verify invariants over random event interleavings: delivery
//! state only moves along the permitted forward path, duplicate
//! acknowledgments are idempotent, and the network-id pairing invariant
//! holds in every reachable state.

use courier_core::{
    ConversationId, DeliveryState, DeliveryTransition, FailureReason, MemoryStore, MessageKind,
    MessageRecord, MessageStore, NetworkMessageId, PeerId, RecordId, Timestamp,
};
use proptest::prelude::*;

/// Generate arbitrary transition events, including nonsensical ones
fn arb_transition() -> impl Strategy<Value = DeliveryTransition> {
    prop_oneof![
        (0u32..1000).prop_map(|n| DeliveryTransition::MarkSent {
            network_id: NetworkMessageId::new(n),
        }),
        Just(DeliveryTransition::MarkDelivered),
        arb_failure_reason().prop_map(|reason| DeliveryTransition::MarkFailed { reason }),
        Just(DeliveryTransition::Retry),
    ]
}

fn arb_failure_reason() -> impl Strategy<Value = FailureReason> {
    prop_oneof![
        Just(FailureReason::Cancelled),
        Just(FailureReason::PeerUnreachable),
        Just(FailureReason::RetriesExhausted),
        Just(FailureReason::TransportRejected),
    ]
}

fn arb_message_text() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[a-zA-Z0-9 .,!?]{1,200}").unwrap()
}

fn test_conversation() -> ConversationId {
    ConversationId::new(PeerId::new([1, 2, 3, 4, 5, 6, 7, 8]))
}

/// Rank of a state along the forward path; `Failed` sits outside the path
/// and is tracked separately.
fn forward_rank(state: DeliveryState) -> Option<u8> {
    match state {
        DeliveryState::Pending => Some(0),
        DeliveryState::Sent => Some(1),
        DeliveryState::Delivered => Some(2),
        DeliveryState::Failed(_) => None,
    }
}

proptest! {
    /// Property: under arbitrary interleavings, state never moves backward
    /// along pending -> sent -> delivered, and delivered is absorbing.
    #[test]
    fn transitions_never_regress(
        text in arb_message_text(),
        transitions in prop::collection::vec(arb_transition(), 1..40),
    ) {
        let store = MemoryStore::new();
        let id = store
            .insert(MessageRecord::outgoing(
                test_conversation(),
                text,
                MessageKind::Normal,
                Timestamp::new(1_000),
            ))
            .unwrap();

        let mut previous = DeliveryState::Pending;
        for transition in transitions {
            let _ = store.update(id, transition);
            let current = store.get(id).unwrap().unwrap().delivery();

            match (forward_rank(previous), forward_rank(current)) {
                // Both on the forward path: rank must not decrease
                (Some(prev), Some(cur)) => prop_assert!(cur >= prev),
                // Re-entry from failed only lands on pending
                (None, Some(cur)) => prop_assert_eq!(cur, 0),
                // Delivered never becomes failed
                (Some(prev), None) => prop_assert!(prev < 2),
                (None, None) => {}
            }
            previous = current;
        }
    }

    /// Property: the network id is present exactly in sent/delivered states.
    #[test]
    fn network_id_pairing_invariant(
        transitions in prop::collection::vec(arb_transition(), 1..40),
    ) {
        let store = MemoryStore::new();
        let id = store
            .insert(MessageRecord::outgoing(
                test_conversation(),
                "hello".to_string(),
                MessageKind::Normal,
                Timestamp::new(1_000),
            ))
            .unwrap();

        for transition in transitions {
            let _ = store.update(id, transition);
            let record = store.get(id).unwrap().unwrap();
            let expects_id = matches!(
                record.delivery(),
                DeliveryState::Sent | DeliveryState::Delivered
            );
            prop_assert_eq!(expects_id, record.network_id().is_some());
        }
    }

    /// Property: applying the same acknowledgment twice yields the same
    /// final state as applying it once.
    #[test]
    fn duplicate_acknowledgment_idempotent(
        network_id in 0u32..1000,
        duplicates in 1usize..5,
    ) {
        let store = MemoryStore::new();
        let id = store
            .insert(MessageRecord::outgoing(
                test_conversation(),
                "hello".to_string(),
                MessageKind::Normal,
                Timestamp::new(1_000),
            ))
            .unwrap();

        store
            .update(id, DeliveryTransition::MarkSent {
                network_id: NetworkMessageId::new(network_id),
            })
            .unwrap();
        store.update(id, DeliveryTransition::MarkDelivered).unwrap();
        let once = store.get(id).unwrap().unwrap();

        for _ in 0..duplicates {
            store.update(id, DeliveryTransition::MarkDelivered).unwrap();
        }
        let after = store.get(id).unwrap().unwrap();
        prop_assert_eq!(once, after);
    }

    /// Property: incoming records are inert under every transition.
    #[test]
    fn incoming_records_inert(
        text in arb_message_text(),
        transitions in prop::collection::vec(arb_transition(), 1..20),
    ) {
        let store = MemoryStore::new();
        let id = store
            .insert(MessageRecord::incoming(
                test_conversation(),
                text,
                MessageKind::Normal,
                Timestamp::new(1_000),
            ))
            .unwrap();
        let original = store.get(id).unwrap().unwrap();

        for transition in transitions {
            prop_assert!(store.update(id, transition).is_err());
        }
        prop_assert_eq!(store.get(id).unwrap().unwrap(), original);
    }

    /// Property: history order is insertion order, regardless of which
    /// records are acknowledged and in what order.
    #[test]
    fn history_order_independent_of_ack_order(
        count in 2usize..10,
        ack_order in prop::collection::vec(0usize..10, 0..10),
    ) {
        let store = MemoryStore::new();
        let conv = test_conversation();

        let mut ids: Vec<RecordId> = Vec::new();
        for i in 0..count {
            let id = store
                .insert(MessageRecord::outgoing(
                    conv,
                    format!("message {i}"),
                    MessageKind::Normal,
                    Timestamp::new(1_000 + i as u64),
                ))
                .unwrap();
            store
                .update(id, DeliveryTransition::MarkSent {
                    network_id: NetworkMessageId::new(i as u32),
                })
                .unwrap();
            ids.push(id);
        }

        for index in ack_order {
            if let Some(&id) = ids.get(index) {
                store.update(id, DeliveryTransition::MarkDelivered).unwrap();
            }
        }

        let history: Vec<RecordId> = store
            .by_conversation(conv)
            .unwrap()
            .iter()
            .map(|r| r.id())
            .collect();
        prop_assert_eq!(history, ids);
    }
}
