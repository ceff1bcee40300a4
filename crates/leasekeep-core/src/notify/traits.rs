//! Notifier trait definition

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors a notification backend can report
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification backend unavailable: {0}")]
    Unavailable(String),

    #[error("Notification failed: {0}")]
    Failed(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Notification abstraction
///
/// Implementations:
/// - `LogNotifier`: writes the notification to the log
/// - `NoOpNotifier`: silent
/// - `RecordingNotifier`: keeps notifications for assertions
/// - Desktop backends live with the caller
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str) -> NotifyResult<()>;
}

/// Type alias for an Arc-wrapped notifier
pub type SharedNotifier = Arc<dyn Notifier>;

/// Notifications are best effort: failures are logged, never propagated.
pub async fn notify_logged(notifier: &dyn Notifier, title: &str, message: &str) {
    if let Err(e) = notifier.notify(title, message).await {
        tracing::warn!(error = %e, title, "Notification failed");
    }
}
