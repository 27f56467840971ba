//! Configuration module for confpush
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/confpush/confpush.toml)
//! - User configuration (~/.confpush.toml)
//! - Project configuration (./confpush.toml)
//! - Environment variables
//!
//! Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorContext, Result};
use crate::telemetry::LogFormat;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// SSH transport settings
    pub ssh: SshSettings,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Colors and output settings
    pub colors: ColorsConfig,
}

/// Default values applied when a task does not say otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Device timeout in seconds
    pub timeout: u64,

    /// Number of devices processed concurrently
    pub forks: usize,

    /// Whether diffs are requested when `get_diffs` is omitted
    pub get_diffs: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: 60,
            forks: 5,
            get_diffs: true,
        }
    }
}

/// SSH transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// ssh executable
    pub executable: String,

    /// sshpass executable, used when a password is supplied
    pub sshpass_executable: String,

    /// Extra arguments placed before the generated ones
    pub args: Vec<String>,

    /// StrictHostKeyChecking
    pub host_key_checking: bool,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            executable: "ssh".to_string(),
            sshpass_executable: "sshpass".to_string(),
            args: vec![],
            host_key_checking: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level when no `-v` flag and no `RUST_LOG` is given
    pub level: String,

    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Colors and output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Enable colors
    pub enabled: bool,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(Error::FileNotFound(path.clone()));
            }
        }

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        // Explicit path takes priority
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = vec![PathBuf::from("/etc/confpush/confpush.toml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".confpush.toml"));
        }

        paths.push(PathBuf::from("confpush.toml"));
        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => {
                // Try TOML first, then YAML
                toml::from_str(&content)
                    .or_else(|_| serde_yaml::from_str(&content))
                    .map_err(|e| {
                        Error::Config(format!(
                            "Failed to parse config file {}: {}",
                            path.display(),
                            e
                        ))
                    })?
            }
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; non-default values in `other` win
    fn merge(&self, other: Config) -> Config {
        let base = Defaults::default();
        Config {
            defaults: Defaults {
                timeout: if other.defaults.timeout != base.timeout {
                    other.defaults.timeout
                } else {
                    self.defaults.timeout
                },
                forks: if other.defaults.forks != base.forks {
                    other.defaults.forks
                } else {
                    self.defaults.forks
                },
                get_diffs: if other.defaults.get_diffs != base.get_diffs {
                    other.defaults.get_diffs
                } else {
                    self.defaults.get_diffs
                },
            },
            ssh: if other.ssh != SshSettings::default() {
                other.ssh
            } else {
                self.ssh.clone()
            },
            logging: if other.logging != LoggingConfig::default() {
                other.logging
            } else {
                self.logging.clone()
            },
            colors: if other.colors != ColorsConfig::default() {
                other.colors
            } else {
                self.colors.clone()
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // CONFPUSH_TIMEOUT
        if let Ok(timeout) = std::env::var("CONFPUSH_TIMEOUT") {
            if let Ok(n) = timeout.parse() {
                self.defaults.timeout = n;
            }
        }

        // CONFPUSH_FORKS
        if let Ok(forks) = std::env::var("CONFPUSH_FORKS") {
            if let Ok(n) = forks.parse() {
                self.defaults.forks = n;
            }
        }

        // CONFPUSH_SSH_EXECUTABLE
        if let Ok(executable) = std::env::var("CONFPUSH_SSH_EXECUTABLE") {
            self.ssh.executable = executable;
        }

        // CONFPUSH_LOG_FORMAT
        if let Ok(format) = std::env::var("CONFPUSH_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                self.logging.format = format;
            }
        }

        // CONFPUSH_LOG_LEVEL
        if let Ok(level) = std::env::var("CONFPUSH_LOG_LEVEL") {
            self.logging.level = level;
        }

        // NO_COLOR
        if std::env::var("NO_COLOR").is_ok() || std::env::var("CONFPUSH_NO_COLOR").is_ok() {
            self.colors.enabled = false;
        }
    }

    /// Load from a specific file, skipping the standard locations
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.forks, 5);
        assert_eq!(config.defaults.timeout, 60);
        assert!(config.defaults.get_diffs);
        assert_eq!(config.ssh.executable, "ssh");
        assert!(config.ssh.host_key_checking);
    }

    #[test]
    fn test_config_merge() {
        let base = Config::default();
        let other = Config {
            defaults: Defaults {
                forks: 10,
                ..Defaults::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.defaults.forks, 10);
        assert_eq!(merged.defaults.timeout, 60);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[defaults]\ntimeout = 120\n\n[ssh]\nargs = [\"-o\", \"ControlMaster=auto\"]\nhost_key_checking = false\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.timeout, 120);
        assert_eq!(config.ssh.args, vec!["-o", "ControlMaster=auto"]);
        assert!(!config.ssh.host_key_checking);
        assert_eq!(config.ssh.executable, "ssh");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "defaults:\n  forks: 2\n  get_diffs: false").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.forks, 2);
        assert!(!config.defaults.get_diffs);
    }

    #[test]
    #[serial]
    fn test_load_missing_explicit_path() {
        let missing = PathBuf::from("/nonexistent/confpush.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("CONFPUSH_FORKS", "20");
        std::env::set_var("CONFPUSH_LOG_FORMAT", "json");
        std::env::set_var("CONFPUSH_NO_COLOR", "1");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.defaults.forks, 20);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.colors.enabled);
        std::env::remove_var("CONFPUSH_FORKS");
        std::env::remove_var("CONFPUSH_LOG_FORMAT");
        std::env::remove_var("CONFPUSH_NO_COLOR");
    }
}
