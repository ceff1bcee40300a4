//! Command and response payloads

use serde::{Deserialize, Serialize};

use crate::lease::{InvalidLease, Lease, LeaseKey, LeaseRequest};

/// A request payload, tagged by `command`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    Grant(GrantRequest),
    Revoke(RevokeRequest),
    Status(StatusRequest),
    Cleanup(CleanupRequest),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Grant(_) => "grant",
            Command::Revoke(_) => "revoke",
            Command::Status(_) => "status",
            Command::Cleanup(_) => "cleanup",
        }
    }
}

/// Declare the full set of leases for one configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub leases: Vec<LeaseRequest>,
    pub config_file: String,
    /// Take over identities currently owned by another config file
    #[serde(default, rename = "override")]
    pub override_owner: bool,
}

/// Revoke explicit identities, or everything in a scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leases: Vec<LeaseKey>,
    #[serde(default)]
    pub all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
}

impl RevokeRequest {
    pub fn keys(leases: Vec<LeaseKey>) -> Self {
        Self {
            leases,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn config(config_file: impl Into<String>) -> Self {
        Self {
            config_file: Some(config_file.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupRequest {}

/// A lease whose revoke failed; it is no longer tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseFailure {
    pub lease: LeaseKey,
    pub error: String,
}

/// A grant declaration the daemon declined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLease {
    pub lease: LeaseKey,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantResponse {
    pub granted: Vec<Lease>,
    /// Leases dropped from the config and revoked during reconciliation
    #[serde(default)]
    pub revoked: Vec<LeaseKey>,
    #[serde(default)]
    pub skipped: Vec<SkippedLease>,
    #[serde(default)]
    pub failed: Vec<LeaseFailure>,
    /// Shell commands the caller runs to drop reconciled shell leases
    #[serde(default)]
    pub unset: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeResponse {
    pub revoked: Vec<LeaseKey>,
    #[serde(default)]
    pub failed: Vec<LeaseFailure>,
    #[serde(default)]
    pub not_found: Vec<LeaseKey>,
    #[serde(default)]
    pub unset: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub leases: Vec<Lease>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub expired: Vec<LeaseKey>,
    pub orphaned: Vec<LeaseKey>,
    #[serde(default)]
    pub failed: Vec<LeaseFailure>,
    #[serde(default)]
    pub unset: Vec<String>,
}

/// Response payload: success with command data, or a whole-request failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseBody {
    Ok {
        data: serde_json::Value,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        invalid: Vec<InvalidLease>,
    },
}

impl ResponseBody {
    pub fn ok<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => ResponseBody::Ok { data },
            Err(e) => ResponseBody::error(format!("failed to encode response: {}", e)),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ResponseBody::Error {
            error: error.into(),
            invalid: Vec::new(),
        }
    }

    pub fn invalid(error: impl Into<String>, invalid: Vec<InvalidLease>) -> Self {
        ResponseBody::Error {
            error: error.into(),
            invalid,
        }
    }
}
