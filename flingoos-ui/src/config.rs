//! Service configuration for flingoos-ui
//!
//! Merges command-line overrides over the TOML bootstrap configuration and
//! builds the production collaborators from the result.

use crate::models::PipelineConfig;
use crate::services::{
    AgentError, BridgeClient, CollaboratorError, ForgeClient, ServiceCollaborators,
    TriggerGenerator, WorkflowStoreClient,
};
use flingoos_common::config::{DataFolderInitializer, DataFolderResolver, TomlConfig};
use flingoos_common::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Values supplied on the command line (or their env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_folder: Option<PathBuf>,
    pub bridge_url: Option<String>,
    pub forge_url: Option<String>,
    pub store_url: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub data_folder: PathBuf,
    pub bridge_url: String,
    pub forge_url: String,
    pub store_url: String,
    pub event_capacity: usize,
    pub request_timeout: Duration,
    pub save_triggers: bool,
    pub log_level: String,
    pub pipeline: PipelineConfig,
}

impl ServiceConfig {
    /// Apply `cli` over `toml` and validate the merged values
    pub fn resolve(toml: &TomlConfig, cli: CliOverrides) -> Result<Self> {
        let data_folder = DataFolderResolver::new(cli.data_folder, toml).resolve();

        let mut merged = toml.clone();
        if let Some(url) = cli.bridge_url {
            merged.bridge_url = url;
        }
        if let Some(url) = cli.forge_url {
            merged.forge_url = url;
        }
        if let Some(url) = cli.store_url {
            merged.store_url = url;
        }
        merged.validate()?;

        Ok(Self {
            host: cli.host.unwrap_or(merged.host),
            port: cli.port.unwrap_or(merged.port),
            data_folder,
            bridge_url: merged.bridge_url,
            forge_url: merged.forge_url,
            store_url: merged.store_url,
            event_capacity: merged.event_capacity,
            request_timeout: Duration::from_millis(merged.request_timeout_ms),
            save_triggers: merged.save_triggers,
            log_level: merged.logging.level,
            pipeline: PipelineConfig::new(merged.pipeline, merged.cohort_key),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address {}:{}: {}", self.host, self.port, e)))
    }

    /// Trigger output directory, created on demand; `None` when disabled
    pub fn prepare_triggers_dir(&self) -> Result<Option<PathBuf>> {
        if !self.save_triggers {
            return Ok(None);
        }
        let initializer = DataFolderInitializer::new(self.data_folder.clone());
        initializer.ensure_directory_exists()?;
        info!("Trigger descriptors saved to {}", initializer.triggers_dir().display());
        Ok(Some(initializer.triggers_dir()))
    }

    pub fn build_agent(&self) -> std::result::Result<BridgeClient, AgentError> {
        BridgeClient::new(self.bridge_url.clone(), self.request_timeout)
    }

    pub fn build_collaborators(
        &self,
        triggers_dir: Option<PathBuf>,
    ) -> std::result::Result<ServiceCollaborators, CollaboratorError> {
        Ok(ServiceCollaborators::new(
            TriggerGenerator::new(triggers_dir),
            ForgeClient::new(self.forge_url.clone(), self.request_timeout)?,
            WorkflowStoreClient::new(self.store_url.clone(), self.request_timeout)?,
        ))
    }
}

/// Reloadable log filter
///
/// Starts from `RUST_LOG` or `info` so that config loading is logged, then
/// takes the configured level. An explicit `RUST_LOG` is never replaced.
pub struct LogFilter {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilter {
    pub fn layer(env_filter: Option<EnvFilter>) -> (reload::Layer<EnvFilter, Registry>, Self) {
        let from_env = env_filter.is_some();
        let (layer, handle) =
            reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
        (layer, Self { handle, from_env })
    }

    /// Switch to the configured level; no-op when `RUST_LOG` was set
    pub fn apply_configured(&self, level: &str) -> std::result::Result<(), reload::Error> {
        if self.from_env {
            return Ok(());
        }
        self.handle.reload(EnvFilter::new(level))
    }

    /// Directive string of the active filter
    pub fn current(&self) -> Option<String> {
        self.handle.with_current(|f| f.to_string()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_cli_overrides_take_priority() {
        let mut toml = TomlConfig::default();
        toml.port = 9000;
        toml.bridge_url = "http://bridge.local:1".to_string();

        let config = ServiceConfig::resolve(
            &toml,
            CliOverrides {
                port: Some(9100),
                data_folder: Some(PathBuf::from("/tmp/flingoos-cli")),
                bridge_url: Some("http://10.0.0.5:8845".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.bridge_url, "http://10.0.0.5:8845");
        assert_eq!(config.data_folder, PathBuf::from("/tmp/flingoos-cli"));
        assert_eq!(config.pipeline.cohort_key, "diligent4");
        assert_eq!(config.socket_addr().unwrap().port(), 9100);
    }

    #[test]
    fn test_invalid_override_url_rejected() {
        let result = ServiceConfig::resolve(
            &TomlConfig::default(),
            CliOverrides {
                forge_url: Some("forge.local".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_triggers_dir_disabled() {
        let mut toml = TomlConfig::default();
        toml.save_triggers = false;
        let config = ServiceConfig::resolve(
            &toml,
            CliOverrides {
                data_folder: Some(PathBuf::from("/nonexistent/never-created")),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(config.prepare_triggers_dir().unwrap().is_none());
    }

    #[test]
    fn test_triggers_dir_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::resolve(
            &TomlConfig::default(),
            CliOverrides {
                data_folder: Some(dir.path().to_path_buf()),
                ..Default::default()
            },
        )
        .unwrap();

        let triggers = config.prepare_triggers_dir().unwrap().unwrap();
        assert!(triggers.is_dir());
    }

    #[test]
    fn test_log_filter_takes_configured_level() {
        let (layer, filter) = LogFilter::layer(None);
        let _subscriber = tracing_subscriber::registry().with(layer);
        assert_eq!(filter.current().as_deref(), Some("info"));

        filter.apply_configured("debug").unwrap();
        assert_eq!(filter.current().as_deref(), Some("debug"));
    }

    #[test]
    fn test_log_filter_keeps_env_directive() {
        let (layer, filter) = LogFilter::layer(Some(EnvFilter::new("warn")));
        let _subscriber = tracing_subscriber::registry().with(layer);

        filter.apply_configured("trace").unwrap();
        assert_eq!(filter.current().as_deref(), Some("warn"));
    }
}
