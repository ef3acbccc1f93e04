use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cues::CueOutput;
use crate::logging::LogConfig;
use crate::session::ProtocolTiming;
use crate::stages::StageTable;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Test protocol timing and stage table
    pub protocol: ProtocolSettings,

    /// Where results are kept
    pub storage: StorageSettings,

    /// Audible cues during a run
    pub cues: CueSettings,

    /// Logging output
    pub logging: LogConfig,
}

/// Protocol settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Countdown before the first shuttle, in seconds
    pub preparation_seconds: u32,

    /// Recovery between shuttles, in seconds
    pub rest_seconds: u32,

    /// Wall-clock length of one tick in milliseconds
    pub tick_millis: u64,

    /// Custom stage table; the standard Yo-Yo IR1 table when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<StageTable>,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        let timing = ProtocolTiming::default();
        Self {
            preparation_seconds: timing.preparation_seconds,
            rest_seconds: timing.rest_seconds,
            tick_millis: 1000,
            stages: None,
        }
    }
}

/// Result storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite history database
    pub database_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: AppConfig::data_dir().join("history.db"),
        }
    }
}

/// Cue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueSettings {
    /// tone, bell or silent
    pub output: CueOutput,

    /// Tone volume, 0.0 to 1.0
    pub volume: f32,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            output: CueOutput::Tone,
            volume: 0.5,
        }
    }
}

/// Keys accepted by [`AppConfig::get`] and [`AppConfig::set`]
pub const CONFIG_KEYS: &[&str] = &[
    "protocol.preparation_seconds",
    "protocol.rest_seconds",
    "protocol.tick_millis",
    "storage.database_path",
    "cues.output",
    "cues.volume",
    "logging.level",
    "logging.format",
    "logging.file_path",
    "logging.rotation",
];

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML configuration: {}", path.as_ref().display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
            }
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        tracing::info!(path = %path.as_ref().display(), "Configuration saved");
        Ok(())
    }

    /// Directory holding the default config and history files
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".yoyors")
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Load configuration, falling back to defaults when the file does not exist.
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the test clock cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.protocol.tick_millis == 0 {
            bail!("protocol.tick_millis must be greater than zero");
        }
        // Every phase lasts at least one tick
        if self.protocol.preparation_seconds == 0 {
            bail!("protocol.preparation_seconds must be at least 1");
        }
        if self.protocol.rest_seconds == 0 {
            bail!("protocol.rest_seconds must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.cues.volume) {
            bail!("cues.volume must be between 0.0 and 1.0, got {}", self.cues.volume);
        }
        Ok(())
    }

    /// Stage table in effect
    pub fn stage_table(&self) -> StageTable {
        self.protocol.stages.clone().unwrap_or_default()
    }

    pub fn timing(&self) -> ProtocolTiming {
        ProtocolTiming {
            preparation_seconds: self.protocol.preparation_seconds,
            rest_seconds: self.protocol.rest_seconds,
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.protocol.tick_millis)
    }

    /// Read a setting by dotted key, e.g. `protocol.rest_seconds`
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "protocol.preparation_seconds" => self.protocol.preparation_seconds.to_string(),
            "protocol.rest_seconds" => self.protocol.rest_seconds.to_string(),
            "protocol.tick_millis" => self.protocol.tick_millis.to_string(),
            "storage.database_path" => self.storage.database_path.display().to_string(),
            "cues.output" => self.cues.output.to_string(),
            "cues.volume" => self.cues.volume.to_string(),
            "logging.level" => self.logging.level.to_string(),
            "logging.format" => self.logging.format.to_string(),
            "logging.file_path" => self
                .logging
                .file_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "logging.rotation" => self.logging.rotation.to_string(),
            _ => bail!("Unknown configuration key: {}", key),
        };
        Ok(value)
    }

    /// Change a setting by dotted key. An empty value clears `logging.file_path`.
    ///
    /// The configuration is left untouched when the new value is rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        updated.apply(key, value.trim())?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "protocol.preparation_seconds" => {
                self.protocol.preparation_seconds = parse_value(key, value)?;
            }
            "protocol.rest_seconds" => self.protocol.rest_seconds = parse_value(key, value)?,
            "protocol.tick_millis" => self.protocol.tick_millis = parse_value(key, value)?,
            "storage.database_path" => self.storage.database_path = PathBuf::from(value),
            "cues.output" => self.cues.output = parse_value(key, value)?,
            "cues.volume" => self.cues.volume = parse_value(key, value)?,
            "logging.level" => {
                self.logging.level = value.parse().map_err(anyhow::Error::msg)?;
            }
            "logging.format" => {
                self.logging.format = value.parse().map_err(anyhow::Error::msg)?;
            }
            "logging.file_path" => {
                self.logging.file_path = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "logging.rotation" => self.logging.rotation = parse_value(key, value)?,
            _ => bail!("Unknown configuration key: {}", key),
        }
        Ok(())
    }

    /// Every `key = value` pair, in [`CONFIG_KEYS`] order
    pub fn entries(&self) -> Result<Vec<(&'static str, String)>> {
        CONFIG_KEYS
            .iter()
            .map(|key| Ok((*key, self.get(key)?)))
            .collect()
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value '{}' for {}: {}", value, key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.timing(), ProtocolTiming::default());
        assert_eq!(config.tick_period(), Duration::from_secs(1));
        assert_eq!(config.stage_table(), StageTable::yoyo_ir1());
        assert_eq!(config.cues.output, CueOutput::Tone);
        assert_eq!(config.cues.volume, 0.5);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [protocol]
            rest_seconds = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.protocol.rest_seconds, 8);
        assert_eq!(config.protocol.preparation_seconds, 5);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_custom_stage_table() {
        let config: AppConfig = toml::from_str(
            r#"
            [[protocol.stages]]
            level = "A"
            speed_kmh = 10.0
            shuttle_seconds = 7.2
            cumulative_distance = 40

            [[protocol.stages]]
            level = "B"
            speed_kmh = 12.0
            shuttle_seconds = 6.0
            cumulative_distance = 80
            "#,
        )
        .unwrap();

        let table = config.stage_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.last().unwrap().level, "B");
    }

    #[test]
    fn test_get_and_set() {
        let mut config = AppConfig::default();

        config.set("protocol.rest_seconds", "12").unwrap();
        config.set("cues.output", "bell").unwrap();
        config.set("logging.level", "debug").unwrap();
        config.set("logging.file_path", "/tmp/yoyors.log").unwrap();

        assert_eq!(config.get("protocol.rest_seconds").unwrap(), "12");
        assert_eq!(config.get("cues.output").unwrap(), "bell");
        assert_eq!(config.get("logging.level").unwrap(), "debug");
        assert_eq!(config.get("logging.file_path").unwrap(), "/tmp/yoyors.log");

        config.set("logging.file_path", "").unwrap();
        assert!(config.logging.file_path.is_none());

        assert!(config.set("protocol.rest_seconds", "soon").is_err());
        assert!(config.set("protocol.tick_millis", "0").is_err());
        assert!(config.get("protocol.speed").is_err());
        assert_eq!(config.entries().unwrap().len(), CONFIG_KEYS.len());
    }

    #[test]
    fn test_zero_length_phases_rejected() {
        let mut config = AppConfig::default();

        assert!(config.set("protocol.rest_seconds", "0").is_err());
        assert!(config.set("protocol.preparation_seconds", "0").is_err());
        assert_eq!(config.timing(), ProtocolTiming::default());
        config.set("protocol.rest_seconds", "1").unwrap();
        config.set("protocol.preparation_seconds", "1").unwrap();

        let parsed: AppConfig = toml::from_str("[protocol]\nrest_seconds = 0").unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_cue_settings() {
        let config: AppConfig = toml::from_str(
            r#"
            [cues]
            output = "silent"
            "#,
        )
        .unwrap();
        assert_eq!(config.cues.output, CueOutput::Silent);
        assert_eq!(config.cues.volume, 0.5);

        let mut config = AppConfig::default();
        config.set("cues.volume", "0.8").unwrap();
        assert_eq!(config.get("cues.volume").unwrap(), "0.8");
        assert!(config.set("cues.volume", "1.5").is_err());
        assert!(config.set("cues.output", "buzzer").is_err());
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = AppConfig::default();
        original.protocol.preparation_seconds = 3;
        original.storage.database_path = temp_dir.path().join("history.db");

        original.save_to_file(&config_path).unwrap();
        let loaded = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_or_default() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert_eq!(AppConfig::load_or_default(&missing).unwrap(), AppConfig::default());

        let broken = temp_dir.path().join("broken.toml");
        fs::write(&broken, "protocol = 3").unwrap();
        assert!(AppConfig::load_or_default(&broken).is_err());
    }
}
