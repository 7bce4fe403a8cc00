//! Dry-run notifier.

use tracing::info;

use holewatch_core::TransitionEvent;

use crate::Notifier;

/// Logs each event instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, event: &TransitionEvent) {
        info!(
            device = %event.device_name,
            health = %event.health,
            recipients = ?event.recipients,
            "dry run: {}",
            event.text()
        );
    }
}
