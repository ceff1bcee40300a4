//! Lease types

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Destination sentinel for leases that never touch a file.
pub const SHELL_DESTINATION: &str = "<shell>";

/// Validation errors for a single lease declaration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaseError {
    #[error("Unknown lease type: {0}")]
    UnknownType(String),

    #[error("Invalid duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Destination must be an absolute path: {0}")]
    RelativeDestination(String),
}

pub type LeaseResult<T> = Result<T, LeaseError>;

/// How a lease is materialized, and therefore how it is undone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseType {
    /// `KEY=value` line inside an environment file
    Env,
    /// Whole file owned by the lease
    File,
    /// Variable exported into the caller's shell; no file effect
    Shell,
}

impl LeaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseType::Env => "env",
            LeaseType::File => "file",
            LeaseType::Shell => "shell",
        }
    }
}

impl fmt::Display for LeaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaseType {
    type Err = LeaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "env" => Ok(LeaseType::Env),
            "file" => Ok(LeaseType::File),
            "shell" => Ok(LeaseType::Shell),
            other => Err(LeaseError::UnknownType(other.to_string())),
        }
    }
}

/// Identity of a lease
///
/// Kept as a structured key rather than a joined string so that distinct
/// triples can never collide, whatever characters the fields contain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaseKey {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub variable: String,
}

impl LeaseKey {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        variable: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            variable: variable.into(),
        }
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variable.is_empty() {
            write!(f, "{} -> {}", self.source, self.destination)
        } else {
            write!(f, "{} -> {} ({})", self.source, self.destination, self.variable)
        }
    }
}

/// A tracked lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Provider URI the secret came from; opaque to the daemon
    pub source: String,
    /// Absolute path, or [`SHELL_DESTINATION`]
    pub destination: String,
    /// Variable name; empty for whole-file and container leases
    #[serde(default)]
    pub variable: String,
    pub lease_type: LeaseType,
    /// Value format tag supplied by the caller (e.g. `raw`, `json`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Owning project configuration
    pub config_file: String,
    /// Container lease this one was exploded from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_source: Option<String>,
}

impl Lease {
    pub fn key(&self) -> LeaseKey {
        LeaseKey::new(&self.source, &self.destination, &self.variable)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Container leases stand for a whole structured value whose members were
    /// exploded into child leases.
    pub fn is_container(&self) -> bool {
        self.variable.is_empty() && self.lease_type != LeaseType::File
    }

    /// The instruction the caller runs in its own shell to drop a shell lease.
    pub fn unset_instruction(&self) -> Option<String> {
        if self.lease_type == LeaseType::Shell && !self.variable.is_empty() {
            Some(format!("unset {}", self.variable))
        } else {
            None
        }
    }
}

/// A lease declaration as sent by a client in a `grant` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRequest {
    pub source: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub variable: String,
    /// `env`, `file` or `shell`
    pub lease_type: String,
    #[serde(default)]
    pub format: String,
    /// Time to live, e.g. `"1h"`
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_source: Option<String>,
}

impl LeaseRequest {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        variable: impl Into<String>,
        lease_type: LeaseType,
        duration: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            variable: variable.into(),
            lease_type: lease_type.as_str().to_string(),
            format: String::new(),
            duration: duration.into(),
            parent_source: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_parent(mut self, parent_source: impl Into<String>) -> Self {
        self.parent_source = Some(parent_source.into());
        self
    }

    /// Identity this declaration will occupy once granted.
    ///
    /// Shell leases with no destination land on the shell sentinel.
    pub fn key(&self) -> LeaseKey {
        let destination = if self.destination.is_empty()
            && self.lease_type.trim().eq_ignore_ascii_case("shell")
        {
            SHELL_DESTINATION.to_string()
        } else {
            self.destination.clone()
        };
        LeaseKey::new(&self.source, destination, &self.variable)
    }

    /// Check everything that does not depend on the clock.
    pub fn validate(&self) -> LeaseResult<LeaseType> {
        let lease_type: LeaseType = self.lease_type.parse()?;

        if self.source.trim().is_empty() {
            return Err(LeaseError::MissingField("source"));
        }

        match lease_type {
            LeaseType::Shell => {
                if self.variable.is_empty() {
                    return Err(LeaseError::MissingField("variable"));
                }
            }
            LeaseType::Env | LeaseType::File => {
                if self.destination.is_empty() {
                    return Err(LeaseError::MissingField("destination"));
                }
                if !Path::new(&self.destination).is_absolute() {
                    return Err(LeaseError::RelativeDestination(self.destination.clone()));
                }
            }
        }

        Ok(lease_type)
    }

    /// Turn a validated declaration into a lease stamped by the caller's clock
    pub fn into_lease(
        self,
        lease_type: LeaseType,
        config_file: &str,
        granted_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Lease {
        let key = self.key();
        Lease {
            source: key.source,
            destination: key.destination,
            variable: key.variable,
            lease_type,
            format: self.format,
            granted_at,
            expires_at,
            config_file: config_file.to_string(),
            parent_source: self.parent_source,
        }
    }
}

/// A declaration that failed validation, reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidLease {
    pub lease: LeaseKey,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_lease_type_parse() {
        assert_eq!("env".parse::<LeaseType>().unwrap(), LeaseType::Env);
        assert_eq!("FILE".parse::<LeaseType>().unwrap(), LeaseType::File);
        assert_eq!(" shell ".parse::<LeaseType>().unwrap(), LeaseType::Shell);
        assert_eq!(
            "vault".parse::<LeaseType>(),
            Err(LeaseError::UnknownType("vault".to_string()))
        );
    }

    #[test]
    fn test_keys_do_not_collide_on_separators() {
        let a = LeaseKey::new("a|b", "c", "");
        let b = LeaseKey::new("a", "b|c", "");
        assert_ne!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_shell_request_gets_sentinel_destination() {
        let req = LeaseRequest::new("op://vault/token", "", "TOKEN", LeaseType::Shell, "1h");
        assert_eq!(req.key().destination, SHELL_DESTINATION);
        assert_eq!(req.validate().unwrap(), LeaseType::Shell);
    }

    #[test]
    fn test_validate_rejects_relative_destination() {
        let req = LeaseRequest::new("s1", "relative/.env", "V", LeaseType::Env, "1h");
        assert_eq!(
            req.validate(),
            Err(LeaseError::RelativeDestination("relative/.env".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let req = LeaseRequest::new("", "/tmp/d", "V", LeaseType::Env, "1h");
        assert_eq!(req.validate(), Err(LeaseError::MissingField("source")));

        let req = LeaseRequest::new("s1", "", "", LeaseType::Shell, "1h");
        assert_eq!(req.validate(), Err(LeaseError::MissingField("variable")));
    }

    #[test]
    fn test_into_lease_and_helpers() {
        let req = LeaseRequest::new("s1", "", "TOKEN", LeaseType::Shell, "1h")
            .with_format("raw")
            .with_parent("s0");
        let lease = req.into_lease(LeaseType::Shell, "/p/config.toml", at(0), at(3600));

        assert_eq!(lease.key(), LeaseKey::new("s1", SHELL_DESTINATION, "TOKEN"));
        assert_eq!(lease.parent_source.as_deref(), Some("s0"));
        assert_eq!(lease.unset_instruction().as_deref(), Some("unset TOKEN"));
        assert!(!lease.is_expired(at(3599)));
        assert!(lease.is_expired(at(3600)));
        assert!(!lease.is_container());
    }

    #[test]
    fn test_lease_json_shape() {
        let lease = LeaseRequest::new("s1", "/tmp/d", "", LeaseType::File, "1h")
            .into_lease(LeaseType::File, "/p/c.toml", at(0), at(60));
        let json = serde_json::to_value(&lease).unwrap();

        assert_eq!(json["lease_type"], "file");
        assert_eq!(json["variable"], "");
        assert!(json.get("parent_source").is_none());
        assert!(json.get("format").is_none());

        let back: Lease = serde_json::from_value(json).unwrap();
        assert_eq!(back, lease);
    }
}
