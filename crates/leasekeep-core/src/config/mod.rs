//! Daemon configuration (YAML)
//!
//! Lives at `~/.config/leasekeep/daemon.yaml` by default. Every field is
//! optional; a missing file means all defaults.
//!
//! ```yaml
//! socket_path: /run/user/1000/leasekeep/daemon.sock
//! sweep_interval: 30s
//! log_level: debug
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::daemon::DEFAULT_SWEEP_INTERVAL;
use crate::fs_atomic::ensure_private_dir;

/// Overrides the base directory for state, secret and socket
pub const HOME_ENV: &str = "LEASEKEEP_HOME";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where the daemon keeps its files and how it behaves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    /// Shared HMAC secret, created on first use
    pub secret_path: PathBuf,
    pub state_path: PathBuf,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Default filter; `LEASEKEEP_LOG` takes precedence
    pub log_level: String,
    /// Append logs here instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::in_dir(base_dir())
    }
}

impl DaemonConfig {
    /// Defaults with every file placed under `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            socket_path: dir.join("daemon.sock"),
            secret_path: dir.join("secret"),
            state_path: dir.join("state.json"),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            log_level: "info".to_string(),
            log_file: None,
        }
    }

    /// `~/.config/leasekeep/daemon.yaml`
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| home_dir().join(".config"));
        config_dir.join("leasekeep").join("daemon.yaml")
    }

    /// Load from `path`, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Create the parent directories of every configured path, owner-only
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        let paths = [
            Some(&self.socket_path),
            Some(&self.secret_path),
            Some(&self.state_path),
            self.log_file.as_ref(),
        ];
        for path in paths.into_iter().flatten() {
            if let Some(parent) = path.parent() {
                ensure_private_dir(parent)?;
            }
        }
        Ok(())
    }
}

/// `$LEASEKEEP_HOME`, else the platform's local data dir plus `leasekeep`
pub fn base_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| home_dir().join(".local").join("share"))
        .join("leasekeep")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let duration = humantime::parse_duration(&s).map_err(serde::de::Error::custom)?;
        if duration.is_zero() {
            return Err(serde::de::Error::custom("interval must be greater than zero"));
        }
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = DaemonConfig::load(&dir.path().join("daemon.yaml")).unwrap();
        assert_eq!(config.sweep_interval, Duration::from_secs(10));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.yaml");
        fs::write(
            &path,
            "sweep_interval: 1m 30s\nstate_path: /var/lib/leasekeep/state.json\n",
        )
        .unwrap();

        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.sweep_interval, Duration::from_secs(90));
        assert_eq!(config.state_path, PathBuf::from("/var/lib/leasekeep/state.json"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.yaml");
        fs::write(&path, "sweep_interval: [nope\n").unwrap();
        assert!(matches!(DaemonConfig::load(&path), Err(ConfigError::Parse { .. })));

        fs::write(&path, "sweep_interval: 0s\n").unwrap();
        assert!(matches!(DaemonConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_in_dir_layout() {
        let config = DaemonConfig::in_dir("/tmp/lk");
        assert_eq!(config.socket_path, PathBuf::from("/tmp/lk/daemon.sock"));
        assert_eq!(config.secret_path, PathBuf::from("/tmp/lk/secret"));
        assert_eq!(config.state_path, PathBuf::from("/tmp/lk/state.json"));
    }

    #[test]
    fn test_yaml_round_trip_uses_human_durations() {
        let config = DaemonConfig::in_dir("/tmp/lk");
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("sweep_interval: 10s"));
        assert_eq!(serde_yaml::from_str::<DaemonConfig>(&yaml).unwrap(), config);
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_dirs_creates_private_parents() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let mut config = DaemonConfig::in_dir(dir.path().join("data"));
        config.log_file = Some(dir.path().join("logs").join("daemon.log"));
        config.ensure_dirs().unwrap();

        for sub in ["data", "logs"] {
            let mode = fs::metadata(dir.path().join(sub)).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
