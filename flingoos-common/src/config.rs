//! Configuration loading and data folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is never fatal: the service logs a warning and starts
//! with defaults. A TOML file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "FLINGOOS_DATA_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Interface to bind the HTTP server on
    pub host: String,

    /// HTTP server port
    pub port: u16,

    /// Folder for generated trigger files (optional)
    pub data_folder: Option<PathBuf>,

    /// Base URL of the recording agent (bridge)
    pub bridge_url: String,

    /// Base URL of the remote processing pipeline
    pub forge_url: String,

    /// Base URL of the workflow result store
    pub store_url: String,

    /// Result-store partition queried for workflows
    pub cohort_key: String,

    /// EventBus capacity per subscriber
    pub event_capacity: usize,

    /// Timeout applied by the HTTP adapters to each request
    pub request_timeout_ms: u64,

    /// Write generated trigger descriptors to `<data_folder>/triggers`
    pub save_triggers: bool,

    pub logging: LoggingConfig,

    pub pipeline: PipelineTimings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
}

/// Durations of the placeholder pipeline steps, in milliseconds
///
/// These only pace the progress feed and may be tuned freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineTimings {
    pub flush_ms: u64,
    pub upload_audio_ms: u64,
    pub upload_screenshots_ms: u64,
    pub upload_telemetry_ms: u64,
    pub verify_uploads_ms: u64,
    pub processing_wait_ms: u64,
    pub persist_results_ms: u64,
    /// Pause between the final snapshot and the final lifecycle event
    pub completion_delay_ms: u64,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8844,
            data_folder: None,
            bridge_url: "http://localhost:8845".to_string(),
            forge_url: "http://localhost:8846".to_string(),
            store_url: "http://localhost:8847".to_string(),
            cohort_key: "diligent4".to_string(),
            event_capacity: 100,
            request_timeout_ms: 10_000,
            save_triggers: true,
            logging: LoggingConfig::default(),
            pipeline: PipelineTimings::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for PipelineTimings {
    fn default() -> Self {
        Self {
            flush_ms: 1_000,
            upload_audio_ms: 3_000,
            upload_screenshots_ms: 2_000,
            upload_telemetry_ms: 4_000,
            verify_uploads_ms: 2_000,
            processing_wait_ms: 5_000,
            persist_results_ms: 2_000,
            completion_delay_ms: 3_000,
        }
    }
}

impl PipelineTimings {
    /// All delays zero, for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            flush_ms: 0,
            upload_audio_ms: 0,
            upload_screenshots_ms: 0,
            upload_telemetry_ms: 0,
            verify_uploads_ms: 0,
            processing_wait_ms: 0,
            persist_results_ms: 0,
            completion_delay_ms: 0,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be greater than zero".to_string()));
        }
        if self.cohort_key.trim().is_empty() {
            return Err(Error::Config("cohort_key must not be empty".to_string()));
        }
        for (key, url) in [
            ("bridge_url", &self.bridge_url),
            ("forge_url", &self.forge_url),
            ("store_url", &self.store_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("{} must be an http(s) URL: {}", key, url)));
            }
        }
        Ok(())
    }
}

/// Default configuration file path for the platform
///
/// `~/.config/flingoos/webui.toml` on Linux, the platform config directory
/// elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flingoos").join("webui.toml"))
}

/// Load the TOML configuration
///
/// An explicitly requested file must exist. When no path is given the
/// platform default is tried, and its absence yields defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        info!("Configuration loaded from {}", path.display());
        return TomlConfig::from_toml_str(&content);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            info!("Configuration loaded from {}", path.display());
            TomlConfig::from_toml_str(&content)
        }
        Some(path) => {
            warn!("Config file not found at {}, using defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write configuration to TOML atomically, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Data folder resolution: CLI → `FLINGOOS_DATA_FOLDER` → TOML → OS default
pub struct DataFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl DataFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_value: toml.data_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        if let Some(path) = &self.toml_value {
            return path.clone();
        }
        default_data_folder()
    }
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("flingoos"))
        .unwrap_or_else(|| PathBuf::from("./flingoos_data"))
}

/// Creates the data folder layout on startup
pub struct DataFolderInitializer {
    root: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn triggers_dir(&self) -> PathBuf {
        self.root.join("triggers")
    }

    /// Idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.triggers_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TomlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8844);
        assert_eq!(config.cohort_key, "diligent4");
        assert_eq!(config.pipeline.upload_telemetry_ms, 4_000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            port = 9000

            [pipeline]
            upload_audio_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.pipeline.upload_audio_ms, 10);
        assert_eq!(config.pipeline.flush_ms, 1_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TomlConfig::from_toml_str("event_capacity = 0").is_err());
        assert!(TomlConfig::from_toml_str("bridge_url = \"localhost:1\"").is_err());
        assert!(TomlConfig::from_toml_str("port = \"not a port\"").is_err());
    }

    #[test]
    fn test_immediate_timings() {
        let timings = PipelineTimings::immediate();
        assert_eq!(timings.completion_delay_ms, 0);
        assert_eq!(timings.processing_wait_ms, 0);
    }
}
