//! Lease map and its state file

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs_atomic::{atomic_write, PRIVATE_FILE_MODE};
use crate::lease::{Lease, LeaseKey};

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

/// Errors from loading or saving the state file
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("State file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("State file {path} has unsupported version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },

    #[error("IO error on state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u32,
    #[serde(default)]
    leases: Vec<Lease>,
}

/// Process-wide lease state
///
/// All access goes through [`LeaseStore::lock`], which hands out a
/// [`LeaseMap`] guard. Handlers and the expiry sweep hold that guard for
/// their whole read-modify-write sequence, then call [`LeaseMap::save`]
/// once before releasing it.
pub struct LeaseStore {
    state_path: PathBuf,
    leases: Mutex<HashMap<LeaseKey, Lease>>,
}

impl LeaseStore {
    /// Load the store from `state_path`.
    ///
    /// A missing file is a first run and yields an empty store. A file that
    /// exists but cannot be parsed is an error; the daemon must not start on
    /// guessed state.
    pub fn open(state_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let state_path = state_path.into();
        let leases = load(&state_path)?;

        tracing::debug!(path = %state_path.display(), count = leases.len(), "Loaded lease state");

        Ok(Self {
            state_path,
            leases: Mutex::new(leases),
        })
    }

    /// Acquire the exclusive lock over the lease map
    pub fn lock(&self) -> LeaseMap<'_> {
        LeaseMap {
            state_path: &self.state_path,
            leases: self.leases.lock(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}

impl std::fmt::Debug for LeaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseStore")
            .field("state_path", &self.state_path)
            .finish()
    }
}

fn load(path: &Path) -> StoreResult<HashMap<LeaseKey, Lease>> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let state: StateFile = serde_json::from_slice(&content).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })?;

    if state.version != STATE_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: state.version,
        });
    }

    Ok(state
        .leases
        .into_iter()
        .map(|lease| (lease.key(), lease))
        .collect())
}

/// Exclusive view of the lease map, alive for as long as the lock is held
pub struct LeaseMap<'a> {
    state_path: &'a Path,
    leases: MutexGuard<'a, HashMap<LeaseKey, Lease>>,
}

impl LeaseMap<'_> {
    pub fn get(&self, key: &LeaseKey) -> Option<&Lease> {
        self.leases.get(key)
    }

    pub fn contains(&self, key: &LeaseKey) -> bool {
        self.leases.contains_key(key)
    }

    /// Insert or replace by identity; returns the lease that was replaced
    pub fn upsert(&mut self, lease: Lease) -> Option<Lease> {
        self.leases.insert(lease.key(), lease)
    }

    pub fn remove(&mut self, key: &LeaseKey) -> Option<Lease> {
        self.leases.remove(key)
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lease> {
        self.leases.values()
    }

    /// Identities of every tracked lease, in stable order
    pub fn keys(&self) -> Vec<LeaseKey> {
        let mut keys: Vec<LeaseKey> = self.leases.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Identities of leases owned by `config_file`, in stable order
    pub fn keys_for_config(&self, config_file: &str) -> Vec<LeaseKey> {
        let mut keys: Vec<LeaseKey> = self
            .leases
            .values()
            .filter(|l| l.config_file == config_file)
            .map(Lease::key)
            .collect();
        keys.sort();
        keys
    }

    /// Identities of leases whose expiry is at or before `now`
    pub fn expired_keys(&self, now: DateTime<Utc>) -> Vec<LeaseKey> {
        let mut keys: Vec<LeaseKey> = self
            .leases
            .values()
            .filter(|l| l.is_expired(now))
            .map(Lease::key)
            .collect();
        keys.sort();
        keys
    }

    /// Copy of the current leases, optionally limited to one config file,
    /// ordered by expiry then identity
    pub fn snapshot(&self, config_file: Option<&str>) -> Vec<Lease> {
        let mut leases: Vec<Lease> = self
            .leases
            .values()
            .filter(|l| config_file.map_or(true, |c| l.config_file == c))
            .cloned()
            .collect();
        leases.sort_by(|a, b| {
            a.expires_at
                .cmp(&b.expires_at)
                .then_with(|| a.key().cmp(&b.key()))
        });
        leases
    }

    /// Write the full map to the state file with an atomic replace
    pub fn save(&self) -> StoreResult<()> {
        let mut leases: Vec<Lease> = self.leases.values().cloned().collect();
        leases.sort_by_key(Lease::key);

        let state = StateFile {
            version: STATE_VERSION,
            leases,
        };
        let json = serde_json::to_vec_pretty(&state)?;

        atomic_write(self.state_path, &json, PRIVATE_FILE_MODE).map_err(|e| StoreError::Io {
            path: self.state_path.to_path_buf(),
            source: e,
        })
    }

    /// Save, logging instead of failing
    ///
    /// In-memory state stays authoritative; the next mutation retries.
    pub fn save_logged(&self) -> bool {
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist lease state");
                false
            }
        }
    }
}
