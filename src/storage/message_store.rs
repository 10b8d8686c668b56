use crate::domain::message::{DeliveryState, Message};
use crate::error::{AppError, Result};
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

/// Result of a guarded state-transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied { from: DeliveryState },
    /// The attempt targeted an earlier-than-current state or a terminal
    /// record; the stored state was kept.
    Discarded { current: DeliveryState },
}

/// Keyed message store with an external-id index.
///
/// Mutations go through the owning `DashMap` entry, so concurrent webhook
/// deliveries for the same message serialize on the per-key lock; no lock
/// is ever held across an await point.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: DashMap<Uuid, Message>,
    external_index: DashMap<String, Uuid>,
}

impl MessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, message: Message) {
        if let Some(ext) = &message.external_id {
            self.external_index.insert(ext.clone(), message.id);
        }
        self.messages.insert(message.id, message);
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Message> {
        self.messages.get(&id).map(|m| m.clone())
    }

    #[must_use]
    pub fn get_by_external_id(&self, external_id: &str) -> Option<Message> {
        let id = *self.external_index.get(external_id)?;
        self.get(id)
    }

    #[must_use]
    pub fn find_by_recipient(&self, to: &str) -> Vec<Message> {
        self.messages.iter().filter(|m| m.to == to).map(|m| m.clone()).collect()
    }

    /// Records the gateway-assigned id. The external id is immutable: a
    /// second assignment with a different value is a conflict.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist and
    /// `AppError::Conflict` if a different external id was already set.
    pub fn assign_external_id(&self, id: Uuid, external_id: &str) -> Result<()> {
        let mut message = self.messages.get_mut(&id).ok_or(AppError::NotFound)?;
        match &message.external_id {
            Some(existing) if existing == external_id => return Ok(()),
            Some(existing) => {
                return Err(AppError::Conflict(format!(
                    "message {id} already has external id {existing}"
                )));
            }
            None => {}
        }
        message.external_id = Some(external_id.to_string());
        message.updated_at = Utc::now();
        drop(message);
        self.external_index.insert(external_id.to_string(), id);
        Ok(())
    }

    /// Attempts a state transition under the per-message lock, applying the
    /// total-order rule: only transitions that advance past the current
    /// state are applied, everything else is discarded and reported.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    pub fn transition(&self, id: Uuid, next: DeliveryState) -> Result<TransitionOutcome> {
        let mut message = self.messages.get_mut(&id).ok_or(AppError::NotFound)?;
        let current = message.state;
        if current.can_transition_to(next) {
            message.state = next;
            message.updated_at = Utc::now();
            Ok(TransitionOutcome::Applied { from: current })
        } else {
            Ok(TransitionOutcome::Discarded { current })
        }
    }

    /// Marks a message `failed` with the error that caused it.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    pub fn record_failure(&self, id: Uuid, error: &str) -> Result<TransitionOutcome> {
        let mut message = self.messages.get_mut(&id).ok_or(AppError::NotFound)?;
        let current = message.state;
        if current.can_transition_to(DeliveryState::Failed) {
            message.state = DeliveryState::Failed;
            message.error = Some(error.to_string());
            message.updated_at = Utc::now();
            Ok(TransitionOutcome::Applied { from: current })
        } else {
            Ok(TransitionOutcome::Discarded { current })
        }
    }

    /// Finalizes the cost reported by the carrier.
    pub fn set_cost(&self, id: Uuid, cost: f64) {
        if let Some(mut message) = self.messages.get_mut(&id) {
            message.cost = Some(cost);
            message.updated_at = Utc::now();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_outbound(store: &MessageStore) -> Message {
        let message = Message::outbound(
            None,
            "+15550001111".into(),
            "+15552223333".into(),
            "hi".into(),
            Vec::new(),
        );
        store.insert(message.clone());
        message
    }

    #[test]
    fn external_id_is_write_once() {
        let store = MessageStore::new();
        let message = stored_outbound(&store);

        store.assign_external_id(message.id, "ext-1").expect("first assignment");
        // Idempotent re-assignment of the same value is fine.
        store.assign_external_id(message.id, "ext-1").expect("same value");
        assert!(store.assign_external_id(message.id, "ext-2").is_err());

        assert_eq!(store.get_by_external_id("ext-1").map(|m| m.id), Some(message.id));
    }

    #[test]
    fn out_of_order_transition_is_discarded() {
        let store = MessageStore::new();
        let message = stored_outbound(&store);

        assert!(matches!(
            store.transition(message.id, DeliveryState::Dispatched).expect("dispatch"),
            TransitionOutcome::Applied { .. }
        ));
        assert!(matches!(
            store.transition(message.id, DeliveryState::Delivered).expect("delivered"),
            TransitionOutcome::Applied { .. }
        ));
        // "sent" arriving after "delivered" must not regress the state.
        assert!(matches!(
            store.transition(message.id, DeliveryState::Sent).expect("late sent"),
            TransitionOutcome::Discarded { current: DeliveryState::Delivered }
        ));
        assert_eq!(store.get(message.id).map(|m| m.state), Some(DeliveryState::Delivered));
    }

    #[test]
    fn record_failure_respects_terminal_states() {
        let store = MessageStore::new();
        let message = stored_outbound(&store);

        store.transition(message.id, DeliveryState::Delivered).expect("delivered");
        assert!(matches!(
            store.record_failure(message.id, "late failure").expect("attempt"),
            TransitionOutcome::Discarded { .. }
        ));
        let stored = store.get(message.id).expect("present");
        assert_eq!(stored.state, DeliveryState::Delivered);
        assert!(stored.error.is_none());
    }
}
