//! Revocation: undoing a lease's effect on the filesystem
//!
//! - `file` leases: the destination file is deleted
//! - `env` leases: the variable's value is blanked in the destination file
//! - `shell` leases: nothing to do here; the caller unsets the variable
//!
//! Every revoke is idempotent. A destination that is already gone counts as
//! revoked.

mod traits;
mod fs_revoker;
mod env_file;
mod recording;

pub use traits::{Revoker, RevokeError, RevokeResult, SharedRevoker};
pub use fs_revoker::FsRevoker;
pub use env_file::{blank_variable, blank_variable_in};
pub use recording::RecordingRevoker;
