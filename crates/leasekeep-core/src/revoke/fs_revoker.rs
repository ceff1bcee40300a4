//! Filesystem revoker

use std::fs;
use std::io;
use std::path::Path;

use super::env_file::blank_variable;
use super::traits::{RevokeError, RevokeResult, Revoker};
use crate::lease::{Lease, LeaseType};

/// Revoker that edits or deletes lease destinations on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRevoker;

impl FsRevoker {
    pub fn new() -> Self {
        Self
    }
}

impl Revoker for FsRevoker {
    fn revoke(&self, lease: &Lease) -> RevokeResult<()> {
        match lease.lease_type {
            LeaseType::File => remove_file(Path::new(&lease.destination)),
            LeaseType::Env => {
                if lease.variable.is_empty() {
                    // Container lease: the children carry the file edits
                    return Ok(());
                }
                blank_variable(Path::new(&lease.destination), &lease.variable).map(|_| ())
            }
            LeaseType::Shell => Ok(()),
        }
    }
}

fn remove_file(path: &Path) -> RevokeResult<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => return Err(RevokeError::NotAFile(path.to_path_buf())),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(RevokeError::io(path, e)),
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RevokeError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::{LeaseRequest, SHELL_DESTINATION};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn lease(destination: &Path, variable: &str, lease_type: LeaseType) -> Lease {
        let now = Utc.timestamp_opt(0, 0).unwrap();
        LeaseRequest::new("s1", destination.to_string_lossy(), variable, lease_type, "1h")
            .into_lease(lease_type, "/p/config.toml", now, now)
    }

    #[test]
    fn test_file_lease_is_deleted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret.pem");
        fs::write(&path, "key material").unwrap();

        FsRevoker::new().revoke(&lease(&path, "", LeaseType::File)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_lease_is_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("already-gone");

        FsRevoker::new().revoke(&lease(&path, "", LeaseType::File)).unwrap();
    }

    #[test]
    fn test_file_lease_pointing_at_directory_fails() {
        let dir = tempdir().unwrap();
        let err = FsRevoker::new()
            .revoke(&lease(dir.path(), "", LeaseType::File))
            .unwrap_err();
        assert!(matches!(err, RevokeError::NotAFile(_)));
    }

    #[test]
    fn test_env_lease_is_blanked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "A=1\nTOKEN=abc # ci\nB=2\n").unwrap();

        FsRevoker::new().revoke(&lease(&path, "TOKEN", LeaseType::Env)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1\nTOKEN= # ci\nB=2\n");
    }

    #[test]
    fn test_env_container_and_shell_leases_touch_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "A=1\n").unwrap();

        FsRevoker::new().revoke(&lease(&path, "", LeaseType::Env)).unwrap();
        FsRevoker::new()
            .revoke(&lease(Path::new(SHELL_DESTINATION), "TOKEN", LeaseType::Shell))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1\n");
    }
}
