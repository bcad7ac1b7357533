//! The name-addressed variable registry.

use crate::convert::render;
use crate::loader::{self, DirectoryReport, LoadReport, SourceStamp};
use crate::settings::LoaderOptions;
use crate::tree;
use crate::validation::validate_name;
use crate::variable::{Variable, VariableBase, VariableValue};
use chrono::Utc;
use confvar_common::{ConfVarError, Result};
use parking_lot::{Mutex, RwLock};
use serde_yaml::Value;
use std::any::type_name;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of named configuration variables.
///
/// Construct one at startup and share it (`Arc<Registry>`) with every
/// consumer. Entries are never removed; they live as long as the
/// registry.
///
/// ```
/// use confvar_registry::Registry;
///
/// let registry = Registry::new();
/// let timeout = registry.lookup_or_create("timeout", 30u32, "request timeout").unwrap();
/// registry.load_from_str("timeout: 45").unwrap();
/// assert_eq!(timeout.get_value(), 45);
/// ```
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<dyn VariableBase>>>,
    sources: Mutex<HashMap<PathBuf, SourceStamp>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the variable called `name`, creating it with `default` if absent.
    ///
    /// The first registration wins: on later calls `default` and
    /// `description` are ignored. Fails with `InvalidName` for names outside
    /// `[0-9a-z_.]+` and with `TypeMismatch` if `name` holds another type.
    pub fn lookup_or_create<T: VariableValue>(
        &self,
        name: &str,
        default: T,
        description: &str,
    ) -> Result<Arc<Variable<T>>> {
        validate_name(name)?;
        let mut entries = self.entries.write();
        match entries.entry(name.to_string()) {
            Entry::Occupied(entry) => downcast(name, Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let variable = Arc::new(Variable::new(name, default, description)?);
                entry.insert(Arc::clone(&variable) as Arc<dyn VariableBase>);
                debug!(variable = %name, value_type = type_name::<T>(), "variable registered");
                Ok(variable)
            }
        }
    }

    /// Return the variable called `name` without creating it.
    pub fn lookup<T: VariableValue>(&self, name: &str) -> Result<Option<Arc<Variable<T>>>> {
        validate_name(name)?;
        self.lookup_base(name)
            .map(|entry| downcast(name, entry))
            .transpose()
    }

    /// Type-erased lookup.
    pub fn lookup_base(&self, name: &str) -> Option<Arc<dyn VariableBase>> {
        self.entries.read().get(name).cloned()
    }

    /// Whether a variable called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Number of registered variables.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no variable is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Call `callback` for every variable, in ascending name order.
    ///
    /// The callback runs on a snapshot taken under the lock, so it may
    /// register new variables; those are not visited.
    pub fn visit<F>(&self, mut callback: F)
    where
        F: FnMut(&Arc<dyn VariableBase>),
    {
        let mut snapshot: Vec<(String, Arc<dyn VariableBase>)> = self
            .entries
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, entry) in &snapshot {
            callback(entry);
        }
    }

    /// Current values rendered as text, keyed by name.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        self.visit(|entry| match entry.serialize() {
            Ok(text) => {
                out.insert(entry.name().to_string(), text);
            }
            Err(err) => warn!(variable = %entry.name(), error = %err, "cannot render variable"),
        });
        out
    }

    /// Apply a parsed configuration tree to already-declared variables.
    ///
    /// Names that no code has declared are reported but never registered.
    /// A value that fails to convert leaves its variable unchanged and does
    /// not stop the rest of the tree from loading.
    pub fn load_from_tree(&self, root: &Value) -> LoadReport {
        let mut report = LoadReport::default();
        for (name, node) in tree::flatten(root) {
            let Some(variable) = self.lookup_base(&name) else {
                if !node.is_mapping() {
                    debug!(variable = %name, "no declared variable for configuration key");
                    report.unmatched.push(name);
                }
                continue;
            };

            let outcome = render(node)
                .map_err(|e| ConfVarError::conversion(&name, e))
                .and_then(|text| variable.deserialize(&text));
            match outcome {
                Ok(true) => report.updated.push(name),
                Ok(false) => report.unchanged.push(name),
                Err(err) => {
                    warn!(variable = %name, error = %err, "keeping previous value");
                    report.failures.push((name, err));
                }
            }
        }
        report
    }

    /// Parse YAML text and apply it.
    pub fn load_from_str(&self, text: &str) -> Result<LoadReport> {
        let root = loader::parse_document("<inline>", text)?;
        Ok(self.load_from_tree(&root))
    }

    /// Read, parse, and apply one file.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let root = loader::read_document(path.as_ref())?;
        Ok(self.load_from_tree(&root))
    }

    /// Load every configuration file under `dir` with default options.
    ///
    /// See [`Registry::load_from_directory_with`].
    pub fn load_from_directory(&self, dir: impl AsRef<Path>, force: bool) -> Result<DirectoryReport> {
        self.load_from_directory_with(dir, force, &LoaderOptions::default())
    }

    /// Load every configuration file under `dir`.
    ///
    /// Files are applied in sorted path order. Unless `force` is set, a
    /// file whose content is unchanged since it was last applied is
    /// skipped. Unreadable or malformed files are reported and the rest
    /// still load; only a failure to list `dir` itself is an error.
    /// Stamps of files under `dir` that are no longer discovered are dropped.
    pub fn load_from_directory_with(
        &self,
        dir: impl AsRef<Path>,
        force: bool,
        options: &LoaderOptions,
    ) -> Result<DirectoryReport> {
        let dir = dir.as_ref();
        let mut report = DirectoryReport::default();

        let files = loader::discover(dir, options)?;
        self.sources
            .lock()
            .retain(|path, _| !path.starts_with(dir) || files.binary_search(path).is_ok());

        for path in files {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    let err = ConfVarError::io(&path, e);
                    warn!(error = %err, "skipping unreadable configuration file");
                    report.failed.push((path, err));
                    continue;
                }
            };

            let hash = loader::content_hash(&text);
            if !force && self.sources.lock().get(&path).is_some_and(|stamp| stamp.hash == hash) {
                debug!(path = %path.display(), "configuration file unchanged");
                report.skipped.push(path);
                continue;
            }

            let root = match loader::parse_document(&path.display().to_string(), &text) {
                Ok(root) => root,
                Err(err) => {
                    warn!(error = %err, "skipping malformed configuration file");
                    report.failed.push((path, err));
                    continue;
                }
            };

            self.sources.lock().insert(
                path.clone(),
                SourceStamp {
                    hash,
                    loaded_at: Utc::now(),
                },
            );
            let file_report = self.load_from_tree(&root);
            report.loaded.push((path, file_report));
        }

        info!(
            dir = %dir.display(),
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "configuration directory loaded"
        );
        Ok(report)
    }

    /// What was last applied from `path` by a directory load.
    pub fn source_stamp(&self, path: &Path) -> Option<SourceStamp> {
        self.sources.lock().get(path).copied()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("variables", &self.len())
            .field("sources", &self.sources.lock().len())
            .finish()
    }
}

fn downcast<T: VariableValue>(name: &str, entry: Arc<dyn VariableBase>) -> Result<Arc<Variable<T>>> {
    let found = entry.type_name();
    entry
        .into_any()
        .downcast::<Variable<T>>()
        .map_err(|_| ConfVarError::type_mismatch(name, type_name::<T>(), found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use confvar_common::test_utils::{create_temp_dir, init_test_logging, write_config};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_lookup_or_create_returns_same_instance() {
        let registry = Registry::new();
        let first = registry.lookup_or_create("db.pool.size", 10u32, "pool size").unwrap();
        let second = registry.lookup_or_create("db.pool.size", 99u32, "ignored").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.get_value(), 10);
        assert_eq!(second.description(), "pool size");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_name() {
        let registry = Registry::new();
        let err = registry.lookup_or_create("Bad Name!", 1, "").unwrap_err();
        assert!(err.is_invalid_name());
        assert!(registry.lookup::<i32>("Bad Name!").unwrap_err().is_invalid_name());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_type_mismatch() {
        let registry = Registry::new();
        registry.lookup_or_create("timeout", 30i32, "").unwrap();

        let err = registry.lookup_or_create("timeout", 30.0f64, "").unwrap_err();
        assert!(matches!(
            err,
            ConfVarError::TypeMismatch { expected: "f64", found: "i32", .. }
        ));
        assert!(registry.lookup::<i64>("timeout").unwrap_err().is_type_mismatch());
        assert!(registry.lookup::<i32>("timeout").unwrap().is_some());
    }

    #[test]
    fn test_lookup_never_creates() {
        let registry = Registry::new();
        assert!(registry.lookup::<i32>("absent").unwrap().is_none());
        assert!(registry.lookup_base("absent").is_none());
        assert!(!registry.contains("absent"));
    }

    #[test]
    fn test_load_updates_and_notifies() {
        init_test_logging();
        let registry = Registry::new();
        let timeout = registry.lookup_or_create("timeout", 30i32, "").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        timeout.add_listener(move |old, new| sink.lock().push((*old, *new)));

        let report = registry.load_from_str("timeout: 45").unwrap();
        assert_eq!(report.updated, vec!["timeout"]);
        assert_eq!(timeout.get_value(), 45);

        let report = registry.load_from_str("timeout: 45").unwrap();
        assert_eq!(report.unchanged, vec!["timeout"]);
        assert_eq!(*seen.lock(), vec![(30, 45)]);
    }

    #[test]
    fn test_load_does_not_register_unknown_names() {
        let registry = Registry::new();
        let report = registry.load_from_str("unregistered:\n  key: 1\n").unwrap();
        assert_eq!(report.unmatched, vec!["unregistered.key"]);
        assert!(registry.is_empty());
        assert!(registry.lookup_base("unregistered.key").is_none());
    }

    #[test]
    fn test_load_failure_is_per_leaf() {
        let registry = Registry::new();
        let port = registry.lookup_or_create("server.port", 8080u16, "").unwrap();
        let host = registry.lookup_or_create("server.host", "localhost".to_string(), "").unwrap();

        let report = registry
            .load_from_str("server:\n  port: not_a_port\n  host: example.org\n")
            .unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "server.port");
        assert_eq!(port.get_value(), 8080);
        assert_eq!(host.get_value(), "example.org");
    }

    #[test]
    fn test_load_containers_and_subtrees() {
        let registry = Registry::new();
        let ports = registry.lookup_or_create("ports", BTreeSet::<u16>::new(), "").unwrap();
        let limits = registry
            .lookup_or_create("limits", BTreeMap::<String, u32>::new(), "")
            .unwrap();

        registry
            .load_from_str("ports: [443, 80, 443]\nlimits:\n  cpu: 2\n  mem: 512\n")
            .unwrap();
        assert_eq!(ports.get_value().into_iter().collect::<Vec<_>>(), vec![80, 443]);
        assert_eq!(limits.get_value()["mem"], 512);
    }

    #[test]
    fn test_visit_and_snapshot() {
        let registry = Registry::new();
        registry.lookup_or_create("b", 2i32, "").unwrap();
        registry.lookup_or_create("a", vec![1i32, 2], "").unwrap();

        let mut visited = Vec::new();
        registry.visit(|entry| visited.push(entry.name().to_string()));
        assert_eq!(visited, vec!["a", "b"]);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot["b"], "2");
        assert_eq!(snapshot["a"], "- 1\n- 2");
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_visit_callback_may_register() {
        let registry = Registry::new();
        registry.lookup_or_create("a", 1i32, "").unwrap();
        registry.visit(|_| {
            registry.lookup_or_create("z", 0i32, "").unwrap();
        });
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_listener_may_call_back_into_registry() {
        let registry = Arc::new(Registry::new());
        let level = registry.lookup_or_create("log.level", "info".to_string(), "").unwrap();
        let mirror = registry.lookup_or_create("log.previous", String::new(), "").unwrap();

        let handle = Arc::clone(&registry);
        level.add_listener(move |old, _| {
            let previous = handle.lookup::<String>("log.previous").unwrap().unwrap();
            previous.set_value(old.clone());
        });

        registry.load_from_str("log:\n  level: debug\n").unwrap();
        assert_eq!(level.get_value(), "debug");
        assert_eq!(mirror.get_value(), "info");
    }

    #[test]
    fn test_load_from_directory_skips_unchanged() {
        let dir = create_temp_dir();
        let registry = Registry::new();
        let timeout = registry.lookup_or_create("timeout", 30i32, "").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        timeout.add_listener(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let path = write_config(dir.path(), "app.yml", "timeout: 45\n");
        let report = registry.load_from_directory(dir.path(), false).unwrap();
        assert_eq!(report.loaded.len(), 1);
        assert!(report.is_clean());
        assert!(registry.source_stamp(&path).is_some());

        let report = registry.load_from_directory(dir.path(), false).unwrap();
        assert!(report.loaded.is_empty());
        assert_eq!(report.skipped, vec![path.clone()]);

        let report = registry.load_from_directory(dir.path(), true).unwrap();
        assert_eq!(report.loaded.len(), 1);

        write_config(dir.path(), "app.yml", "timeout: 60\n");
        let report = registry.load_from_directory(dir.path(), false).unwrap();
        assert_eq!(report.updated().collect::<Vec<_>>(), vec!["timeout"]);
        assert_eq!(timeout.get_value(), 60);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_load_from_directory_forgets_deleted_files() {
        let dir = create_temp_dir();
        let other = create_temp_dir();
        let registry = Registry::new();
        registry.lookup_or_create("timeout", 30i32, "").unwrap();

        let kept = write_config(dir.path(), "kept.yml", "timeout: 40\n");
        let removed = write_config(dir.path(), "nested/removed.yml", "timeout: 50\n");
        let elsewhere = write_config(other.path(), "other.yml", "timeout: 60\n");
        registry.load_from_directory(dir.path(), false).unwrap();
        registry.load_from_directory(other.path(), false).unwrap();
        assert!(registry.source_stamp(&removed).is_some());

        fs::remove_file(&removed).unwrap();
        registry.load_from_directory(dir.path(), false).unwrap();
        assert!(registry.source_stamp(&removed).is_none());
        assert!(registry.source_stamp(&kept).is_some());
        assert!(registry.source_stamp(&elsewhere).is_some());
    }

    #[test]
    fn test_load_from_directory_reports_bad_files() {
        let dir = create_temp_dir();
        let registry = Registry::new();
        let name = registry.lookup_or_create("name", String::new(), "").unwrap();

        write_config(dir.path(), "a_broken.yml", "name: [unclosed\n");
        write_config(dir.path(), "b_good.yml", "name: service\n");

        let report = registry.load_from_directory(dir.path(), false).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, ConfVarError::Parse { .. }));
        assert_eq!(report.loaded.len(), 1);
        assert_eq!(name.get_value(), "service");
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = create_temp_dir();
        let registry = Registry::new();
        let err = registry.load_from_file(dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, ConfVarError::Io { .. }));
        assert!(registry.load_from_directory(dir.path().join("absent"), false).is_err());
    }

    #[test]
    fn test_concurrent_lookup_or_create() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.lookup_or_create("shared.counter", i, "").unwrap())
            })
            .collect();

        let variables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for variable in &variables[1..] {
            assert!(Arc::ptr_eq(&variables[0], variable));
        }
        assert_eq!(registry.len(), 1);
    }
}
