//! Revoker trait definition

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::lease::Lease;

/// Errors that can occur while undoing a lease
#[derive(Error, Debug)]
pub enum RevokeError {
    #[error("IO error revoking {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination {0} is not a regular file")]
    NotAFile(PathBuf),

    #[error("Revoke failed: {0}")]
    Other(String),
}

impl RevokeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type RevokeResult<T> = Result<T, RevokeError>;

/// Capability that undoes one lease's filesystem effect
///
/// Implementations:
/// - `FsRevoker`: the real thing, dispatching on [`crate::lease::LeaseType`]
/// - `RecordingRevoker`: records calls, optionally failing, for tests
///
/// Called with the store lock held, so implementations must only do short
/// local I/O.
pub trait Revoker: Send + Sync {
    fn revoke(&self, lease: &Lease) -> RevokeResult<()>;
}

/// Type alias for an Arc-wrapped revoker
pub type SharedRevoker = Arc<dyn Revoker>;
