//! Daemon core
//!
//! Owns the lease store and drives it from two places: command handlers
//! invoked per connection, and the expiry scheduler. Both go through the
//! same revoke-and-remove path under the store lock.
//!
//! ```rust,ignore
//! let daemon = Arc::new(Daemon::open(&config.state_path, clock, revoker, notifier)?);
//! let shutdown = Shutdown::new();
//! run(daemon, &config, shutdown).await?;
//! ```

mod handlers;
mod scheduler;
mod server;
mod shutdown;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::clock::SharedClock;
use crate::config::DaemonConfig;
use crate::notify::SharedNotifier;
use crate::protocol::{load_or_create_secret, MessageSigner, ProtocolError};
use crate::revoke::SharedRevoker;
use crate::store::{LeaseStore, StoreError};

pub use handlers::{RequestError, RevocationBatch, NOTIFY_TITLE};
pub use scheduler::{run_scheduler, DEFAULT_SWEEP_INTERVAL};
pub use server::{bind_socket, handle_connection, serve, RequestHandler, REQUEST_TIMEOUT};
pub use shutdown::Shutdown;

/// Errors that stop the daemon from starting
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Failed to load lease state: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to load shared secret: {0}")]
    Secret(#[from] ProtocolError),

    #[error("Failed to bind socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type DaemonResult<T> = Result<T, DaemonError>;

/// The lease daemon: store plus the collaborators it drives
pub struct Daemon {
    store: LeaseStore,
    clock: SharedClock,
    revoker: SharedRevoker,
    notifier: SharedNotifier,
}

impl Daemon {
    pub fn new(
        store: LeaseStore,
        clock: SharedClock,
        revoker: SharedRevoker,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            store,
            clock,
            revoker,
            notifier,
        }
    }

    /// Load persisted state and build the daemon
    ///
    /// Corrupt state is an error; the daemon never starts on a guess.
    pub fn open(
        state_path: &Path,
        clock: SharedClock,
        revoker: SharedRevoker,
        notifier: SharedNotifier,
    ) -> DaemonResult<Self> {
        let store = LeaseStore::open(state_path)?;
        info!(
            path = %state_path.display(),
            leases = store.lock().len(),
            "Lease state loaded"
        );
        Ok(Self::new(store, clock, revoker, notifier))
    }

    pub fn store(&self) -> &LeaseStore {
        &self.store
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon").field("store", &self.store).finish()
    }
}

/// Serve `daemon` on the configured socket until `shutdown` fires
///
/// Binds the socket, starts the scheduler (which sweeps once straight away),
/// and on shutdown stops accepting, waits for the scheduler and removes the
/// socket node.
pub async fn run(daemon: Arc<Daemon>, config: &DaemonConfig, shutdown: Shutdown) -> DaemonResult<()> {
    let secret = load_or_create_secret(&config.secret_path)?;
    let signer = Arc::new(MessageSigner::new(secret));

    let listener = bind_socket(&config.socket_path).map_err(|e| DaemonError::Bind {
        path: config.socket_path.clone(),
        source: e,
    })?;
    info!(socket = %config.socket_path.display(), "Daemon listening");

    let scheduler = tokio::spawn(run_scheduler(
        daemon.clone(),
        config.sweep_interval,
        shutdown.clone(),
    ));

    serve(listener, daemon, signer, shutdown.clone()).await;

    shutdown.trigger();
    if let Err(e) = scheduler.await {
        warn!(error = %e, "Scheduler task ended abnormally");
    }

    if let Err(e) = std::fs::remove_file(&config.socket_path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(socket = %config.socket_path.display(), error = %e, "Failed to remove socket");
        }
    }

    info!("Daemon stopped");
    Ok(())
}
