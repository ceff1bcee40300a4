//! Atomic file replacement
//!
//! Every file the daemon rewrites (state file, shared secret, env files
//! being revoked) goes through [`atomic_write`]: write a temp file in the
//! same directory, fsync it, rename it over the target, then fsync the
//! directory. Readers see either the old complete file or the new one.

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Owner read/write
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Owner read/write/search
pub const PRIVATE_DIR_MODE: u32 = 0o700;

/// Atomically replace `path` with `data`, creating it with `mode`.
///
/// The parent directory must already exist.
pub fn atomic_write(path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".leasekeep-")
        .suffix(".tmp")
        .tempfile_in(parent)?;

    tmp.write_all(data)?;
    tmp.flush()?;
    set_mode(tmp.as_file(), mode)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    fsync_dir(parent);
    Ok(())
}

/// Atomically replace `path`, keeping the permissions the existing file had.
pub fn atomic_rewrite(path: &Path, data: &[u8]) -> io::Result<()> {
    let mode = existing_mode(path)?.unwrap_or(PRIVATE_FILE_MODE);
    atomic_write(path, data, mode)
}

/// Create `dir` (and parents) with owner-only permissions if it is missing.
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(PRIVATE_DIR_MODE)
            .create(dir)
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    file.set_permissions(Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn existing_mode(path: &Path) -> io::Result<Option<u32>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.permissions().mode() & 0o7777)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn existing_mode(_path: &Path) -> io::Result<Option<u32>> {
    Ok(None)
}

/// Best effort: some filesystems refuse to open directories for sync.
fn fsync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Ok(handle) = fs::File::open(dir) {
            let _ = handle.sync_all();
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_atomic_write_creates_private_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        atomic_write(&path, b"{}", PRIVATE_FILE_MODE).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert_eq!(mode_of(&path), 0o600);
    }

    #[test]
    fn test_atomic_write_replaces_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        atomic_write(&path, b"first", PRIVATE_FILE_MODE).unwrap();
        atomic_write(&path, b"second", PRIVATE_FILE_MODE).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_atomic_rewrite_keeps_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "A=1\n").unwrap();
        fs::set_permissions(&path, Permissions::from_mode(0o640)).unwrap();

        atomic_rewrite(&path, b"A=\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "A=\n");
        assert_eq!(mode_of(&path), 0o640);
    }

    #[test]
    fn test_ensure_private_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        ensure_private_dir(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(mode_of(&nested), 0o700);

        // Existing directories are left alone
        ensure_private_dir(&nested).unwrap();
    }
}
