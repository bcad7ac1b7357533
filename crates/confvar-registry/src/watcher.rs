//! Hot-reload of a configuration directory on file changes.

use crate::registry::Registry;
use crate::settings::LoaderOptions;
use confvar_common::{ConfVarError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reloads a directory into a registry whenever a configuration file in it
/// changes. Watching stops when the value is dropped.
pub struct ConfigWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Start watching `dir`.
    ///
    /// Reloads are incremental: files whose content did not change are
    /// skipped, so listeners only fire for values that actually changed.
    pub fn watch(registry: Arc<Registry>, dir: impl AsRef<Path>, options: LoaderOptions) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let recursive = options.recursive;
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let reload_dir = dir.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event, &options) => {
                debug!(paths = ?event.paths, kind = ?event.kind, "configuration change detected");
                reload(&registry, &reload_dir, &options);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "file watcher reported an error"),
        })
        .map_err(watch_error)?;

        watcher.watch(&dir, mode).map_err(watch_error)?;
        info!(dir = %dir.display(), recursive, "watching configuration directory");

        Ok(Self { dir, _watcher: watcher })
    }

    /// The watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher").field("dir", &self.dir).finish()
    }
}

/// Whether `event` touches a configuration file and warrants a reload.
pub fn is_relevant(event: &Event, options: &LoaderOptions) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|path| options.matches(path))
}

fn reload(registry: &Registry, dir: &Path, options: &LoaderOptions) {
    match registry.load_from_directory_with(dir, false, options) {
        Ok(report) => {
            for (path, err) in &report.failed {
                warn!(path = %path.display(), error = %err, "configuration file not reloaded");
            }
        }
        Err(err) => error!(dir = %dir.display(), error = %err, "configuration reload failed"),
    }
}

fn watch_error(e: notify::Error) -> ConfVarError {
    ConfVarError::Watch {
        message: e.to_string(),
    }
}
