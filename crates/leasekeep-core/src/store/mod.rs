//! Lease store: the daemon's authoritative state
//!
//! An in-memory map keyed by lease identity, guarded by a single exclusive
//! lock, with a JSON snapshot on disk rewritten atomically after every
//! mutating command.

mod lease_store;

pub use lease_store::{LeaseStore, LeaseMap, StoreError, StoreResult, STATE_VERSION};
