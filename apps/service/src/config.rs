use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::WriteMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("invalid config value `{key}`: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistrySettings,
    pub polling: PollingSettings,
    pub snapshots: SnapshotSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub path: path::PathBuf,
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_seconds: u64,
    pub max_concurrent_probes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout_seconds: Option<u64>,
    pub shutdown_grace_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    pub directory: path::PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self { path: "servers.json".into(), write_mode: WriteMode::default() }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            max_concurrent_probes: 1,
            probe_timeout_seconds: None,
            shutdown_grace_seconds: 10,
        }
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self { directory: "logs".into() }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_seconds.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/watch.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/watch.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Registry")?;
        write_1(f, "Path", &self.registry.path.display())?;
        write_1(f, "Write Mode", &self.registry.write_mode)?;
        write_title_1(f, "Polling")?;
        write_1(f, "Interval (s)", &self.polling.interval_seconds)?;
        write_1(f, "Max Concurrent Probes", &self.polling.max_concurrent_probes)?;
        match self.polling.probe_timeout_seconds {
            Some(secs) => write_1(f, "Probe Timeout (s)", &secs)?,
            None => write_1(f, "Probe Timeout (s)", &"none")?,
        }
        write_1(f, "Shutdown Grace (s)", &self.polling.shutdown_grace_seconds)?;
        write_title_1(f, "Snapshots")?;
        write_1(f, "Directory", &self.snapshots.directory.display())?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;

        Ok(())
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// With no path the built-in defaults are returned and nothing is touched
    /// on disk. With a path the file is read, or created from the defaults
    /// when it does not exist yet.
    ///
    /// ```rust,no_run
    /// # use uppe_watch::config::Config;
    /// let cfg = Config::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), uppe_watch::config::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let Some(path) = optional_path else {
            return Ok(Self::default());
        };
        let config_path = normalize_toml_path(path.as_ref());

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str::<Self>(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Reject values the poller cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "polling.interval_seconds",
                reason: "must be at least 1",
            });
        }
        if self.polling.max_concurrent_probes == 0 {
            return Err(ConfigError::Invalid {
                key: "polling.max_concurrent_probes",
                reason: "must be at least 1",
            });
        }
        if self.polling.probe_timeout_seconds == Some(0) {
            return Err(ConfigError::Invalid {
                key: "polling.probe_timeout_seconds",
                reason: "must be at least 1 when set",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_reference_behavior() {
        let cfg = Config::from_config(None::<&path::Path>).unwrap();
        assert_eq!(cfg.registry.path, path::PathBuf::from("servers.json"));
        assert_eq!(cfg.registry.write_mode, WriteMode::Replace);
        assert_eq!(cfg.polling.interval(), Duration::from_secs(5));
        assert_eq!(cfg.polling.max_concurrent_probes, 1);
        assert!(cfg.polling.probe_timeout().is_none());
        assert_eq!(cfg.snapshots.directory, path::PathBuf::from("logs"));
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let requested = dir.path().join("nested/watch");

        let cfg = Config::from_config(Some(&requested)).unwrap();

        let written = dir.path().join("nested/watch.toml");
        assert!(written.exists());
        let raw = fs::read_to_string(written).unwrap();
        assert!(raw.contains("interval_seconds = 5"));
        assert_eq!(cfg.polling.interval_seconds, 5);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watch.toml");
        fs::write(
            &path,
            "[registry]\nwrite_mode = \"in_place\"\n\n[polling]\ninterval_seconds = 30\nprobe_timeout_seconds = 3\n",
        )
        .unwrap();

        let cfg = Config::from_config(Some(&path)).unwrap();
        assert_eq!(cfg.registry.write_mode, WriteMode::InPlace);
        assert_eq!(cfg.registry.path, path::PathBuf::from("servers.json"));
        assert_eq!(cfg.polling.interval_seconds, 30);
        assert_eq!(cfg.polling.probe_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(cfg.polling.shutdown_grace_seconds, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watch.toml");
        fs::write(&path, "[polling]\ninterval_seconds = 0\n").unwrap();
        assert!(matches!(
            Config::from_config(Some(&path)),
            Err(ConfigError::Invalid { key: "polling.interval_seconds", .. })
        ));

        fs::write(&path, "[polling]\nmax_concurrent_probes = 0\n").unwrap();
        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watch.toml");
        fs::write(&path, "[polling\n").unwrap();
        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn test_display_lists_sections() {
        let rendered = Config::default().to_string();
        assert!(rendered.starts_with("Current Internal Configuration State:"));
        assert!(rendered.contains("Write Mode: replace"));
        assert!(rendered.contains("Probe Timeout (s): none"));
    }
}
