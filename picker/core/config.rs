use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use picker_logging::LogLevel;
use serde::Deserialize;
use thiserror::Error;

use crate::{recommend::MIN_GROUP_SIZE, wheel::SETTLE_DELAY};

const MAX_SETTLE_MS: u64 = 60_000;

/// Errors raised while loading a [`PickerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("reading picker config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("parsing picker config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid picker config: {0}")]
    Invalid(String),
}

/// Session settings. Every key is optional.
///
/// ```toml
/// seed = 42
///
/// [wheel]
/// settle_delay_ms = 3000
///
/// [groups]
/// default_size = 4
///
/// [telemetry]
/// log_path = "logs/picker.jsonl"
/// event_log = "logs/events.jsonl"
/// min_level = "INFO"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PickerConfig {
    /// Seed for reproducible spins and shuffles.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Wheel settings.
    #[serde(default)]
    pub wheel: WheelSettings,
    /// Grouping settings.
    #[serde(default)]
    pub groups: GroupSettings,
    /// Log and event destinations.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// `[wheel]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WheelSettings {
    /// Milliseconds between a spin and its result.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl WheelSettings {
    /// Settle delay as a duration.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for WheelSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// `[groups]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSettings {
    /// Group size used until the user picks another.
    #[serde(default = "default_group_size")]
    pub default_size: usize,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            default_size: default_group_size(),
        }
    }
}

/// `[telemetry]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySettings {
    /// JSON-lines log file.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// JSON-lines session event file.
    #[serde(default)]
    pub event_log: Option<PathBuf>,
    /// Lowest level written to the log file.
    #[serde(default = "default_min_level")]
    pub min_level: LogLevel,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_path: None,
            event_log: None,
            min_level: default_min_level(),
        }
    }
}

impl PickerConfig {
    /// Loads and validates a TOML file. Relative telemetry paths resolve
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        let base = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        for target in [
            &mut config.telemetry.log_path,
            &mut config.telemetry.event_log,
        ]
        .into_iter()
        .flatten()
        {
            if target.is_relative() {
                *target = base.join(&*target);
            }
        }
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wheel.settle_delay_ms == 0 || self.wheel.settle_delay_ms > MAX_SETTLE_MS {
            return Err(ConfigError::Invalid(format!(
                "wheel.settle_delay_ms must be within 1..={MAX_SETTLE_MS}, got {}",
                self.wheel.settle_delay_ms
            )));
        }
        if self.groups.default_size < MIN_GROUP_SIZE {
            return Err(ConfigError::Invalid(format!(
                "groups.default_size must be at least {MIN_GROUP_SIZE}, got {}",
                self.groups.default_size
            )));
        }
        Ok(())
    }
}

fn default_settle_delay_ms() -> u64 {
    u64::try_from(SETTLE_DELAY.as_millis()).unwrap_or(MAX_SETTLE_MS)
}

const fn default_group_size() -> usize {
    MIN_GROUP_SIZE
}

const fn default_min_level() -> LogLevel {
    LogLevel::Info
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PickerConfig::from_toml("").unwrap();
        assert_eq!(config.wheel.settle_delay(), SETTLE_DELAY);
        assert_eq!(config.groups.default_size, 2);
        assert_eq!(config.seed, None);
        assert_eq!(config.telemetry.min_level, LogLevel::Info);
    }

    #[test]
    fn parses_every_table() {
        let config = PickerConfig::from_toml(
            r#"
            seed = 7

            [wheel]
            settle_delay_ms = 500

            [groups]
            default_size = 4

            [telemetry]
            min_level = "WARN"
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.wheel.settle_delay_ms, 500);
        assert_eq!(config.groups.default_size, 4);
        assert_eq!(config.telemetry.min_level, LogLevel::Warn);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            PickerConfig::from_toml("[wheel]\nsettle_delay_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PickerConfig::from_toml("[groups]\ndefault_size = 1"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PickerConfig::from_toml("[wheel]\nspin = true"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("picker.toml");
        fs::write(
            &path,
            "[telemetry]\nlog_path = \"logs/picker.jsonl\"\nevent_log = \"/tmp/events.jsonl\"\n",
        )
        .unwrap();
        let config = PickerConfig::load(&path).unwrap();
        assert_eq!(
            config.telemetry.log_path.unwrap(),
            dir.path().join("logs/picker.jsonl")
        );
        assert_eq!(
            config.telemetry.event_log.unwrap(),
            PathBuf::from("/tmp/events.jsonl")
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            PickerConfig::load(dir.path().join("nope.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
