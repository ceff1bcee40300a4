//! leasekeep core
//!
//! Tracks secrets that have been materialized into local files or shell
//! sessions for a limited time, and undoes them when they expire, are
//! revoked, or are dropped from their project's configuration.
//!
//! The daemon owns a single [`store::LeaseStore`]; every change to it goes
//! through the command handlers or the expiry scheduler in [`daemon`].
//! Clients reach it over a Unix socket with HMAC-signed messages
//! ([`protocol`], [`client`]).
//!
//! ```rust,ignore
//! use leasekeep_core::{DaemonClient, DaemonConfig, LeaseRequest, LeaseType};
//!
//! let client = DaemonClient::from_config(&DaemonConfig::default())?;
//! client
//!     .grant(
//!         "/home/me/project/leases.toml",
//!         vec![LeaseRequest::new("op://vault/db", "/home/me/project/.env", "DB_PASSWORD", LeaseType::Env, "1h")],
//!         false,
//!     )
//!     .await?;
//! ```

pub mod clock;
pub mod lease;
pub mod fs_atomic;
pub mod store;
pub mod revoke;
pub mod notify;
pub mod protocol;
pub mod daemon;
pub mod client;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use clock::{Clock, SharedClock, SystemClock, ManualClock};

pub use lease::{
    Lease, LeaseKey, LeaseRequest, LeaseType, LeaseError, InvalidLease,
    SHELL_DESTINATION,
};

pub use store::{LeaseStore, StoreError};

pub use revoke::{Revoker, RevokeError, SharedRevoker, FsRevoker};

pub use notify::{Notifier, NotifyError, SharedNotifier, LogNotifier, NoOpNotifier};

pub use protocol::{
    Command, ResponseBody, MessageSigner, ProtocolError,
    GrantRequest, GrantResponse, RevokeRequest, RevokeResponse,
    StatusRequest, StatusResponse, CleanupResponse,
};

pub use daemon::{Daemon, DaemonError, Shutdown};

pub use client::{DaemonClient, ClientError, ClientResult};

pub use config::{DaemonConfig, ConfigError};
