//! Wall-clock implementation

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::traits::Clock;

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}
