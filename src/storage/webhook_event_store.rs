use crate::domain::webhook::{GatewayEvent, WebhookEvent, WebhookEventStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Outcome of recording a freshly received event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// An event with this provider id was seen before. Replays of processed
    /// events are acknowledged without reapplying.
    Duplicate { already_processed: bool },
}

/// Audit store for received webhook events, keyed by the provider event id.
/// Every event is retained regardless of processing outcome.
#[derive(Debug, Default)]
pub struct WebhookEventStore {
    events: DashMap<String, WebhookEvent>,
}

impl WebhookEventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_if_new(&self, event: GatewayEvent, received_at: DateTime<Utc>) -> InsertOutcome {
        use dashmap::mapref::entry::Entry;

        match self.events.entry(event.id.clone()) {
            Entry::Occupied(existing) => InsertOutcome::Duplicate {
                already_processed: existing.get().status == WebhookEventStatus::Processed,
            },
            Entry::Vacant(slot) => {
                slot.insert(WebhookEvent::received(event, received_at));
                InsertOutcome::Created
            }
        }
    }

    #[must_use]
    pub fn get(&self, event_id: &str) -> Option<WebhookEvent> {
        self.events.get(event_id).map(|e| e.clone())
    }

    pub fn mark_processed(&self, event_id: &str) {
        if let Some(mut event) = self.events.get_mut(event_id) {
            event.status = WebhookEventStatus::Processed;
            event.next_attempt_at = None;
        }
    }

    /// Records a failed processing attempt and returns the total attempt
    /// count so the caller can decide between rescheduling and dead-lettering.
    pub fn record_failure(&self, event_id: &str, error: &str) -> u32 {
        match self.events.get_mut(event_id) {
            Some(mut event) => {
                event.attempts += 1;
                event.status = WebhookEventStatus::Failed;
                event.last_error = Some(error.to_string());
                event.next_attempt_at = None;
                event.attempts
            }
            None => 0,
        }
    }

    pub fn schedule_retry(&self, event_id: &str, next_attempt_at: DateTime<Utc>) {
        if let Some(mut event) = self.events.get_mut(event_id) {
            event.next_attempt_at = Some(next_attempt_at);
        }
    }

    pub fn mark_dead(&self, event_id: &str) {
        if let Some(mut event) = self.events.get_mut(event_id) {
            event.status = WebhookEventStatus::Dead;
            event.next_attempt_at = None;
        }
    }

    /// Failed events whose scheduled retry time has arrived.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>, limit: usize) -> Vec<WebhookEvent> {
        self.events
            .iter()
            .filter(|e| {
                e.status == WebhookEventStatus::Failed
                    && e.next_attempt_at.is_some_and(|at| at <= now)
            })
            .take(limit)
            .map(|e| e.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::GatewayEventType;

    fn event(id: &str) -> GatewayEvent {
        GatewayEvent {
            id: id.to_string(),
            event_type: GatewayEventType::Sent,
            occurred_at: Utc::now(),
            payload: serde_json::json!({ "id": "ext-1" }),
        }
    }

    #[test]
    fn duplicate_detection_tracks_processing_state() {
        let store = WebhookEventStore::new();
        assert_eq!(store.insert_if_new(event("evt-1"), Utc::now()), InsertOutcome::Created);
        assert_eq!(
            store.insert_if_new(event("evt-1"), Utc::now()),
            InsertOutcome::Duplicate { already_processed: false }
        );

        store.mark_processed("evt-1");
        assert_eq!(
            store.insert_if_new(event("evt-1"), Utc::now()),
            InsertOutcome::Duplicate { already_processed: true }
        );
    }

    #[test]
    fn due_returns_only_scheduled_failures() {
        let store = WebhookEventStore::new();
        store.insert_if_new(event("evt-1"), Utc::now());
        store.insert_if_new(event("evt-2"), Utc::now());

        assert_eq!(store.record_failure("evt-1", "boom"), 1);
        store.schedule_retry("evt-1", Utc::now() - chrono::Duration::seconds(1));
        // evt-2 failed but its retry is in the future.
        store.record_failure("evt-2", "boom");
        store.schedule_retry("evt-2", Utc::now() + chrono::Duration::seconds(60));

        let due = store.due(Utc::now(), 10);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].event_id, "evt-1");
    }

    #[test]
    fn dead_events_are_never_due() {
        let store = WebhookEventStore::new();
        store.insert_if_new(event("evt-1"), Utc::now());
        store.record_failure("evt-1", "boom");
        store.schedule_retry("evt-1", Utc::now() - chrono::Duration::seconds(1));
        store.mark_dead("evt-1");

        assert!(store.due(Utc::now(), 10).is_empty());
        assert_eq!(store.get("evt-1").map(|e| e.status), Some(WebhookEventStatus::Dead));
    }
}
