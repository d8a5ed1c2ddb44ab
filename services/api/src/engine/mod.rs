//! services/api/src/engine/mod.rs
//!
//! The lifecycle engine: notification delivery with dedupe and fan-out, and
//! the background sweeper for listing expiry and due-date scanning.

pub mod notifier;
pub mod sweeper;

#[cfg(test)]
pub mod testing;

pub use notifier::{notification_payload, Delivery, NotificationEngine};
pub use sweeper::{DueDateSummary, Sweeper};
