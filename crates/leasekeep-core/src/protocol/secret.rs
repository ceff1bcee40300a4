//! Shared secret file
//!
//! Any process that can read this file can talk to the daemon. It is created
//! on first use with owner-only permissions; deleting or rotating it locks
//! out every existing client.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::SecretString;

use super::error::{ProtocolError, ProtocolResult};
use crate::fs_atomic::{ensure_private_dir, PRIVATE_FILE_MODE};

const SECRET_BYTES: usize = 32;

/// Read the shared secret at `path`, generating it first if it is absent.
///
/// Creation never replaces a file another process wrote in the meantime;
/// whoever loses that race reads the winner's secret.
pub fn load_or_create_secret(path: &Path) -> ProtocolResult<SecretString> {
    match read_secret(path) {
        Ok(secret) => return Ok(secret),
        Err(ReadError::Missing) => {}
        Err(ReadError::Failed(e)) => return Err(e),
    }

    create_secret(path)?;
    tracing::info!(path = %path.display(), "Created shared secret");

    match read_secret(path) {
        Ok(secret) => Ok(secret),
        Err(ReadError::Missing) => Err(ProtocolError::secret(path, "vanished after creation")),
        Err(ReadError::Failed(e)) => Err(e),
    }
}

enum ReadError {
    Missing,
    Failed(ProtocolError),
}

fn read_secret(path: &Path) -> Result<SecretString, ReadError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ReadError::Missing),
        Err(e) => return Err(ReadError::Failed(ProtocolError::secret(path, e))),
    };

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ReadError::Failed(ProtocolError::secret(path, "file is empty")));
    }

    warn_if_shared(path);
    Ok(SecretString::from(trimmed.to_string()))
}

fn create_secret(path: &Path) -> ProtocolResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_private_dir(parent).map_err(|e| ProtocolError::secret(path, e))?;

    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let encoded = hex::encode(bytes);

    let mut tmp = tempfile::Builder::new()
        .prefix(".leasekeep-secret-")
        .tempfile_in(parent)
        .map_err(|e| ProtocolError::secret(path, e))?;
    set_private(tmp.as_file()).map_err(|e| ProtocolError::secret(path, e))?;
    tmp.write_all(encoded.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ProtocolError::secret(path, e))?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(ProtocolError::secret(path, e.error)),
    }
}

#[cfg(unix)]
fn set_private(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(PRIVATE_FILE_MODE))
}

#[cfg(not(unix))]
fn set_private(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mode = meta.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            tracing::warn!(path = %path.display(), mode = %format!("{:o}", mode), "Shared secret is readable by other users");
        }
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::tempdir;

    #[test]
    fn test_creates_secret_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run").join("secret");

        let first = load_or_create_secret(&path).unwrap();
        let second = load_or_create_secret(&path).unwrap();

        assert_eq!(first.expose_secret().len(), SECRET_BYTES * 2);
        assert_eq!(first.expose_secret(), second.expose_secret());
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("secret");
        load_or_create_secret(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_existing_secret_is_read_trimmed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret");
        fs::write(&path, "abc123\n").unwrap();

        let secret = load_or_create_secret(&path).unwrap();
        assert_eq!(secret.expose_secret(), "abc123");
    }

    #[test]
    fn test_empty_secret_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret");
        fs::write(&path, "  \n").unwrap();

        assert!(matches!(load_or_create_secret(&path), Err(ProtocolError::Secret { .. })));
    }
}
