//! Structured logging bootstrap for applications embedding the registry

use crate::error::{ConfVarError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "confvar_registry=debug")
    pub level: String,
    /// Whether to emit one JSON object per event
    pub json_format: bool,
    /// Whether to enable pretty formatting with colors
    pub pretty_format: bool,
    /// Optional file path for log output
    pub file_path: Option<String>,
    /// Whether to include target module information
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_format: false,
            file_path: None,
            include_targets: true,
        }
    }
}

/// Initialize the tracing subscriber with the given configuration.
///
/// Fails instead of panicking if a global subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.level).map_err(|e| ConfVarError::Logging {
        message: format!("invalid level filter '{}': {e}", config.level),
    })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let file = config
        .file_path
        .as_deref()
        .map(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ConfVarError::io(std::path::Path::new(path), e))
        })
        .transpose()?;

    let installed = if config.json_format {
        let layer = fmt::layer()
            .with_target(config.include_targets)
            .with_thread_names(true)
            .json();
        match file {
            Some(file) => registry.with(layer.with_writer(file)).try_init(),
            None => registry.with(layer).try_init(),
        }
    } else if config.pretty_format {
        let layer = fmt::layer().pretty().with_target(config.include_targets);
        match file {
            Some(file) => registry
                .with(layer.with_ansi(false).with_writer(file))
                .try_init(),
            None => registry.with(layer).try_init(),
        }
    } else {
        let layer = fmt::layer().with_target(config.include_targets);
        match file {
            Some(file) => registry
                .with(layer.with_ansi(false).with_writer(file))
                .try_init(),
            None => registry.with(layer).try_init(),
        }
    };

    installed.map_err(|e| ConfVarError::Logging {
        message: e.to_string(),
    })
}
