//! Test utilities shared across the workspace.
//!
//! Enabled for this crate's own tests and for dependents through the
//! `testing` feature.

use crate::logging::{init_logging, LoggingConfig};
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for tests. Safe to call from every test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string());
        // Another harness may already own the global subscriber.
        let _ = init_logging(LoggingConfig {
            level,
            ..LoggingConfig::default()
        });
    });
}

/// Create a temporary directory that cleans up on drop.
#[cfg(any(test, feature = "tempfile"))]
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Write `content` to `relative` under `dir`, creating parent directories.
pub fn write_config(dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create config directory");
    }
    std::fs::write(&path, content).expect("Failed to write config file");
    path
}
