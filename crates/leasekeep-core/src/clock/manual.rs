//! Manually advanced clock for deterministic tests

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::traits::Clock;

/// A clock that only moves when told to
///
/// Sleepers wake when [`ManualClock::advance`] or [`ManualClock::set`] pushes
/// the current time past their deadline.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use chrono::{TimeZone, Utc};
/// use leasekeep_core::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(Utc.timestamp_opt(0, 0).unwrap());
/// clock.advance(Duration::from_secs(60));
/// assert_eq!(clock.now().timestamp(), 60);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: watch::Sender<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        let (now, _) = watch::channel(start);
        Self { now }
    }

    /// Move time forward by `by`
    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        self.now.send_modify(|now| {
            *now = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
        });
    }

    /// Jump to an absolute time
    pub fn set(&self, to: DateTime<Utc>) {
        self.now.send_replace(to);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.borrow()
    }

    async fn sleep(&self, period: Duration) {
        let mut rx = self.now.subscribe();
        let delta = chrono::Duration::from_std(period).unwrap_or(chrono::Duration::MAX);
        let deadline = rx
            .borrow()
            .checked_add_signed(delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        loop {
            if *rx.borrow_and_update() >= deadline {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new(start());
        assert_eq!(clock.now(), start());

        clock.advance(Duration::from_secs(3601));
        assert_eq!(clock.now().timestamp(), start().timestamp() + 3601);

        clock.set(start());
        assert_eq!(clock.now(), start());
    }

    #[tokio::test]
    async fn test_sleep_wakes_only_after_deadline() {
        let clock = Arc::new(ManualClock::new(start()));
        let sleeper = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sleep(Duration::from_secs(10)).await })
        };

        tokio::task::yield_now().await;
        clock.advance(Duration::from_secs(5));
        tokio::task::yield_now().await;
        assert!(!sleeper.is_finished());

        clock.advance(Duration::from_secs(5));
        tokio::time::timeout(Duration::from_secs(1), sleeper)
            .await
            .expect("sleeper should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_system_clock_sleep() {
        let clock = crate::clock::SystemClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.now() >= before);
    }
}
