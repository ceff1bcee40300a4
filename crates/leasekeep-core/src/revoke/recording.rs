//! Recording revoker for tests

use std::collections::HashSet;

use parking_lot::Mutex;

use super::traits::{RevokeError, RevokeResult, Revoker};
use crate::lease::{Lease, LeaseKey};

/// Revoker that remembers every call and touches nothing
///
/// Identities registered with [`RecordingRevoker::fail_on`] return an error,
/// which lets tests exercise the partial-failure paths.
#[derive(Debug, Default)]
pub struct RecordingRevoker {
    calls: Mutex<Vec<LeaseKey>>,
    failing: Mutex<HashSet<LeaseKey>>,
}

impl RecordingRevoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make revokes of `key` fail
    pub fn fail_on(&self, key: LeaseKey) {
        self.failing.lock().insert(key);
    }

    /// Every identity passed to `revoke`, in call order, failures included
    pub fn calls(&self) -> Vec<LeaseKey> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, key: &LeaseKey) -> usize {
        self.calls.lock().iter().filter(|k| *k == key).count()
    }
}

impl Revoker for RecordingRevoker {
    fn revoke(&self, lease: &Lease) -> RevokeResult<()> {
        let key = lease.key();
        self.calls.lock().push(key.clone());

        if self.failing.lock().contains(&key) {
            return Err(RevokeError::Other(format!("injected failure for {}", key)));
        }
        Ok(())
    }
}
