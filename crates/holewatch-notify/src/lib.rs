//! holewatch-notify: delivers confirmed health transitions to chat
//! recipients.
//!
//! Delivery is at-most-once: one `sendMessage` call per recipient, no
//! retries, failures are logged and dropped.

pub mod dry_run;
pub mod error;
pub mod telegram;

use std::future::Future;

use holewatch_core::TransitionEvent;

pub use dry_run::LogNotifier;
pub use error::NotifyError;
pub use telegram::{TelegramNotifier, TelegramNotifierBuilder};

/// Sink for transition events. Must not fail outward.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &TransitionEvent) -> impl Future<Output = ()> + Send;
}
