//! Lease model
//!
//! A lease is one secret value materialized into one destination for a
//! bounded time. Its identity is the `(source, destination, variable)` triple.

mod types;
mod duration;

pub use types::{
    Lease, LeaseKey, LeaseRequest, LeaseType, LeaseError, LeaseResult, InvalidLease,
    SHELL_DESTINATION,
};
pub use duration::{parse_lease_duration, expiry_from};
