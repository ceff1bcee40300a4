//! No-op notifier implementation

use async_trait::async_trait;

use super::traits::{Notifier, NotifyResult};

/// A notifier that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

impl NoOpNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, _title: &str, _message: &str) -> NotifyResult<()> {
        Ok(())
    }
}
