//! Lease durations
//!
//! Durations are humantime strings: `"90s"`, `"15m"`, `"1h30m"`, `"2days"`.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::types::{LeaseError, LeaseResult};

/// Parse a lease time-to-live. Zero and empty durations are rejected.
pub fn parse_lease_duration(value: &str) -> LeaseResult<Duration> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(value, "empty duration"));
    }

    let duration = humantime::parse_duration(trimmed).map_err(|e| invalid(value, e))?;
    if duration.is_zero() {
        return Err(invalid(value, "duration must be greater than zero"));
    }
    Ok(duration)
}

/// `now + ttl`, failing instead of wrapping for absurd values
pub fn expiry_from(now: DateTime<Utc>, ttl: Duration, value: &str) -> LeaseResult<DateTime<Utc>> {
    let delta = chrono::Duration::from_std(ttl).map_err(|e| invalid(value, e))?;
    now.checked_add_signed(delta)
        .ok_or_else(|| invalid(value, "expiry out of range"))
}

fn invalid(value: &str, reason: impl ToString) -> LeaseError {
    LeaseError::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
