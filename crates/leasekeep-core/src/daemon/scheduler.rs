//! Expiry scheduler

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{Daemon, Shutdown};

/// Default time between expiry sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Sweep immediately, then every `interval` on the daemon's clock until
/// `shutdown` fires.
///
/// The first sweep catches leases that expired while the daemon was down.
pub async fn run_scheduler(daemon: Arc<Daemon>, interval: Duration, shutdown: Shutdown) {
    info!(interval = %humantime::format_duration(interval), "Expiry scheduler started");

    daemon.sweep();

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = daemon.clock().sleep(interval) => {
                debug!("Sweeping expired leases");
                daemon.sweep();
            }
        }
    }

    info!("Expiry scheduler stopped");
}
