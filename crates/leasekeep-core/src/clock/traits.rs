//! Clock trait definition

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Clock abstraction
///
/// Every expiry computation and every scheduler sleep goes through a clock,
/// never through the wall clock directly.
///
/// Implementations:
/// - `SystemClock`: wall-clock time and tokio sleeps
/// - `ManualClock`: frozen time advanced explicitly by tests
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;

    /// Resolve once `period` has elapsed on this clock
    async fn sleep(&self, period: Duration);
}

/// Type alias for an Arc-wrapped clock
pub type SharedClock = Arc<dyn Clock>;
