pub mod message_store;
pub mod opt_out_store;
pub mod webhook_event_store;

pub use message_store::{MessageStore, TransitionOutcome};
pub use opt_out_store::OptOutStore;
pub use webhook_event_store::{InsertOutcome, WebhookEventStore};
