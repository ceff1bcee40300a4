//! Command handlers
//!
//! Every handler takes the store lock once, does its whole read-modify-write
//! under it, persists at most once and releases the lock before any await.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::Daemon;
use crate::lease::{
    expiry_from, parse_lease_duration, InvalidLease, LeaseKey, LeaseRequest, LeaseResult,
    LeaseType,
};
use crate::notify::notify_logged;
use crate::protocol::{
    CleanupResponse, Command, GrantRequest, GrantResponse, LeaseFailure, ResponseBody,
    RevokeRequest, RevokeResponse, SkippedLease, StatusRequest, StatusResponse,
};
use crate::store::LeaseMap;

/// Title used for mass-revocation notifications
pub const NOTIFY_TITLE: &str = "leasekeep";

/// Failures that reject a whole request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("{} invalid lease declaration(s)", .0.len())]
    InvalidLeases(Vec<InvalidLease>),

    #[error("config_file is required")]
    MissingConfigFile,

    #[error("config_file must be an absolute path: {0}")]
    RelativeConfigFile(String),

    #[error("nothing to revoke: pass leases, all, or config_file")]
    EmptyRevoke,

    #[error("Malformed request: {0}")]
    Malformed(String),
}

impl From<RequestError> for ResponseBody {
    fn from(error: RequestError) -> Self {
        let message = error.to_string();
        match error {
            RequestError::InvalidLeases(invalid) => ResponseBody::invalid(message, invalid),
            _ => ResponseBody::error(message),
        }
    }
}

/// Outcome of driving a set of leases through revoke-and-remove
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationBatch {
    pub revoked: Vec<LeaseKey>,
    pub failed: Vec<LeaseFailure>,
    pub unset: Vec<String>,
}

impl RevocationBatch {
    /// Leases removed from tracking, whether or not the revoker succeeded
    pub fn removed(&self) -> usize {
        self.revoked.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed() == 0
    }
}

/// Which leases a revoke request targets
enum RevokeScope {
    Keys(Vec<LeaseKey>),
    Config(String),
    All,
}

impl RevokeScope {
    fn from_request(req: RevokeRequest) -> Result<Self, RequestError> {
        if !req.leases.is_empty() {
            let mut seen = HashSet::new();
            let keys = req
                .leases
                .into_iter()
                .filter(|key| seen.insert(key.clone()))
                .collect();
            return Ok(RevokeScope::Keys(keys));
        }
        if req.all {
            return Ok(RevokeScope::All);
        }
        match req.config_file {
            Some(config_file) if !config_file.is_empty() => Ok(RevokeScope::Config(config_file)),
            _ => Err(RequestError::EmptyRevoke),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RevokeScope::Keys(_) => "keys",
            RevokeScope::Config(_) => "config",
            RevokeScope::All => "all",
        }
    }
}

impl Daemon {
    /// Decode a verified payload and run the command it names
    pub async fn dispatch(&self, payload: &[u8]) -> ResponseBody {
        let command: Command = match serde_json::from_slice(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Rejected malformed command");
                return RequestError::Malformed(e.to_string()).into();
            }
        };

        debug!(command = command.name(), "Dispatching command");

        match command {
            Command::Grant(req) => respond(self.grant(req)),
            Command::Revoke(req) => respond(self.revoke(req).await),
            Command::Status(req) => ResponseBody::ok(&self.status(req)),
            Command::Cleanup(_) => ResponseBody::ok(&self.cleanup()),
        }
    }

    /// Reconcile the leases of one config file against a new declaration set
    ///
    /// Tracked leases of `config_file` missing from the request are revoked;
    /// the rest are upserted with fresh expiries. Declarations are all checked
    /// before the store is touched, so an invalid one leaves state unchanged.
    pub fn grant(&self, req: GrantRequest) -> Result<GrantResponse, RequestError> {
        if req.config_file.trim().is_empty() {
            return Err(RequestError::MissingConfigFile);
        }
        if !Path::new(&req.config_file).is_absolute() {
            return Err(RequestError::RelativeConfigFile(req.config_file));
        }

        let now = self.clock.now();
        let mut validated = Vec::with_capacity(req.leases.len());
        let mut invalid = Vec::new();

        for decl in req.leases {
            match check_declaration(&decl, now) {
                Ok((lease_type, expires_at)) => validated.push((decl, lease_type, expires_at)),
                Err(e) => invalid.push(InvalidLease {
                    lease: decl.key(),
                    error: e.to_string(),
                }),
            }
        }

        if !invalid.is_empty() {
            warn!(
                config_file = %req.config_file,
                invalid = invalid.len(),
                "Rejected grant with invalid declarations"
            );
            return Err(RequestError::InvalidLeases(invalid));
        }

        let incoming: HashSet<LeaseKey> = validated.iter().map(|(decl, ..)| decl.key()).collect();
        let mut response = GrantResponse::default();
        let mut batch = RevocationBatch::default();

        let mut map = self.store.lock();

        for key in map.keys_for_config(&req.config_file) {
            if !incoming.contains(&key) {
                debug!(lease = %key, "Lease dropped from config");
                self.revoke_and_remove(&mut map, &key, &mut batch);
            }
        }

        let mut seen = HashSet::new();
        for (decl, lease_type, expires_at) in validated {
            let key = decl.key();
            if !seen.insert(key.clone()) {
                response.skipped.push(SkippedLease {
                    lease: key,
                    reason: "duplicate declaration".to_string(),
                });
                continue;
            }

            if let Some(existing) = map.get(&key) {
                if existing.config_file != req.config_file {
                    if !req.override_owner {
                        response.skipped.push(SkippedLease {
                            reason: format!("owned by {}", existing.config_file),
                            lease: key,
                        });
                        continue;
                    }
                    info!(
                        lease = %key,
                        from = %existing.config_file,
                        to = %req.config_file,
                        "Lease ownership overridden"
                    );
                }
            }

            let lease = decl.into_lease(lease_type, &req.config_file, now, expires_at);
            map.upsert(lease.clone());
            response.granted.push(lease);
        }

        map.save_logged();
        drop(map);

        info!(
            config_file = %req.config_file,
            granted = response.granted.len(),
            revoked = batch.revoked.len(),
            skipped = response.skipped.len(),
            failed = batch.failed.len(),
            "Grant reconciled"
        );

        response.revoked = batch.revoked;
        response.failed = batch.failed;
        response.unset = batch.unset;
        Ok(response)
    }

    /// Revoke explicit identities or a whole scope
    ///
    /// Scope `all` notifies once with the number of leases revoked, after the
    /// store lock has been released.
    pub async fn revoke(&self, req: RevokeRequest) -> Result<RevokeResponse, RequestError> {
        let scope = RevokeScope::from_request(req)?;
        let notify = matches!(scope, RevokeScope::All);
        let response = self.revoke_scope(scope);

        if notify && !response.revoked.is_empty() {
            let message = format!("Revoked {} lease(s)", response.revoked.len());
            notify_logged(self.notifier.as_ref(), NOTIFY_TITLE, &message).await;
        }

        Ok(response)
    }

    fn revoke_scope(&self, scope: RevokeScope) -> RevokeResponse {
        let scope_name = scope.name();
        let mut response = RevokeResponse::default();
        let mut batch = RevocationBatch::default();

        let mut map = self.store.lock();

        let targets = match scope {
            RevokeScope::Keys(keys) => keys,
            RevokeScope::Config(config_file) => map.keys_for_config(&config_file),
            RevokeScope::All => map.keys(),
        };

        for key in targets {
            if !self.revoke_and_remove(&mut map, &key, &mut batch) {
                response.not_found.push(key);
            }
        }

        if !batch.is_empty() {
            map.save_logged();
        }
        drop(map);

        info!(
            scope = scope_name,
            revoked = batch.revoked.len(),
            failed = batch.failed.len(),
            not_found = response.not_found.len(),
            "Revoke complete"
        );

        response.revoked = batch.revoked;
        response.failed = batch.failed;
        response.unset = batch.unset;
        response
    }

    /// Snapshot of tracked leases, soonest expiry first
    pub fn status(&self, req: StatusRequest) -> StatusResponse {
        let map = self.store.lock();
        StatusResponse {
            leases: map.snapshot(req.config_file.as_deref()),
        }
    }

    /// Expire due leases, then drop orphans
    ///
    /// A lease whose destination file is gone has nothing left to undo and is
    /// simply untracked. A lease whose owning config file is gone is revoked.
    pub fn cleanup(&self) -> CleanupResponse {
        let now = self.clock.now();
        let mut batch = RevocationBatch::default();
        let mut dropped = Vec::new();

        let mut map = self.store.lock();

        for key in map.expired_keys(now) {
            self.revoke_and_remove(&mut map, &key, &mut batch);
        }
        let expired = std::mem::take(&mut batch.revoked);
        let mut changed = !expired.is_empty() || !batch.failed.is_empty();

        for lease in map.snapshot(None) {
            let key = lease.key();
            if lease.lease_type != LeaseType::Shell && !path_present(&lease.destination) {
                debug!(lease = %key, "Destination gone, dropping lease");
                map.remove(&key);
                dropped.push(key);
            } else if !path_present(&lease.config_file) {
                debug!(lease = %key, config_file = %lease.config_file, "Config gone, revoking lease");
                self.revoke_and_remove(&mut map, &key, &mut batch);
            }
        }
        changed |= !dropped.is_empty() || !batch.is_empty();

        if changed {
            map.save_logged();
        }
        drop(map);

        let mut orphaned = dropped;
        orphaned.append(&mut batch.revoked);
        orphaned.sort();

        info!(
            expired = expired.len(),
            orphaned = orphaned.len(),
            failed = batch.failed.len(),
            "Cleanup complete"
        );

        CleanupResponse {
            expired,
            orphaned,
            failed: batch.failed,
            unset: batch.unset,
        }
    }

    /// One expiry pass: revoke and untrack every lease due at the clock's now
    pub fn sweep(&self) -> RevocationBatch {
        let now = self.clock.now();
        let mut batch = RevocationBatch::default();

        let mut map = self.store.lock();
        for key in map.expired_keys(now) {
            self.revoke_and_remove(&mut map, &key, &mut batch);
        }
        if !batch.is_empty() {
            map.save_logged();
        }
        drop(map);

        if !batch.is_empty() {
            info!(
                revoked = batch.revoked.len(),
                failed = batch.failed.len(),
                "Expired leases revoked"
            );
        }
        for unset in &batch.unset {
            debug!(instruction = %unset, "Expired shell lease has no caller to unset it");
        }
        batch
    }

    /// Undo one lease and stop tracking it
    ///
    /// Shell leases yield an unset instruction instead of a revoker call. A
    /// revoker failure is recorded but the lease is removed anyway. Returns
    /// false when `key` is not tracked.
    fn revoke_and_remove(
        &self,
        map: &mut LeaseMap<'_>,
        key: &LeaseKey,
        batch: &mut RevocationBatch,
    ) -> bool {
        let Some(lease) = map.get(key).cloned() else {
            return false;
        };

        let outcome = match lease.lease_type {
            LeaseType::Shell => {
                batch.unset.extend(lease.unset_instruction());
                Ok(())
            }
            LeaseType::Env | LeaseType::File => self.revoker.revoke(&lease),
        };

        map.remove(key);

        match outcome {
            Ok(()) => {
                debug!(lease = %key, lease_type = %lease.lease_type, "Lease revoked");
                batch.revoked.push(key.clone());
            }
            Err(e) => {
                warn!(lease = %key, error = %e, "Revoke failed, lease untracked anyway");
                batch.failed.push(LeaseFailure {
                    lease: key.clone(),
                    error: e.to_string(),
                });
            }
        }
        true
    }
}

fn check_declaration(
    decl: &LeaseRequest,
    now: chrono::DateTime<chrono::Utc>,
) -> LeaseResult<(LeaseType, chrono::DateTime<chrono::Utc>)> {
    let lease_type = decl.validate()?;
    let ttl = parse_lease_duration(&decl.duration)?;
    let expires_at = expiry_from(now, ttl, &decl.duration)?;
    Ok((lease_type, expires_at))
}

/// Whether anything, including a dangling symlink, sits at `path`
fn path_present(path: &str) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn respond<T: Serialize>(result: Result<T, RequestError>) -> ResponseBody {
    match result {
        Ok(data) => ResponseBody::ok(&data),
        Err(e) => e.into(),
    }
}
