//! Recording notifier for tests

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{Notifier, NotifyError, NotifyResult};

/// A delivered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

/// Keeps every notification; can be told to fail
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every call records and then errors
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) -> NotifyResult<()> {
        self.sent.lock().push(Notification {
            title: title.to_string(),
            message: message.to_string(),
        });
        if self.fail {
            return Err(NotifyError::Failed("injected failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{notify_logged, LogNotifier, NoOpNotifier};

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.notify("leasekeep", "Revoked 3 lease(s)").await.unwrap();

        assert_eq!(
            notifier.sent(),
            vec![Notification {
                title: "leasekeep".to_string(),
                message: "Revoked 3 lease(s)".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_notify_logged_swallows_errors() {
        let notifier = RecordingNotifier::failing();
        notify_logged(&notifier, "t", "m").await;
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_builtin_notifiers_succeed() {
        assert!(NoOpNotifier::new().notify("t", "m").await.is_ok());
        assert!(LogNotifier::new().notify("t", "m").await.is_ok());
    }
}
