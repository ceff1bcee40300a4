//! Notifier that writes to the daemon log

use async_trait::async_trait;

use super::traits::{Notifier, NotifyResult};

/// Emits notifications as `info` events under the `leasekeep::notify` target
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) -> NotifyResult<()> {
        tracing::info!(target: "leasekeep::notify", title, message, "Notification");
        Ok(())
    }
}
