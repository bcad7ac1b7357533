//! Configuration file discovery, parsing, and load reports.

use crate::settings::LoaderOptions;
use chrono::{DateTime, Utc};
use confvar_common::{ConfVarError, Result};
use serde_yaml::Value;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Outcome of applying one configuration document.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Variables whose value changed.
    pub updated: Vec<String>,
    /// Variables matched but already holding the loaded value.
    pub unchanged: Vec<String>,
    /// Leaf names with no declared variable.
    pub unmatched: Vec<String>,
    /// Variables whose text failed to convert; they keep their old value.
    pub failures: Vec<(String, ConfVarError)>,
}

impl LoadReport {
    /// Whether every matched variable was applied.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of loading a configuration directory.
#[derive(Debug, Default)]
pub struct DirectoryReport {
    /// Files that were parsed and applied, in load order.
    pub loaded: Vec<(PathBuf, LoadReport)>,
    /// Files skipped because their content had not changed.
    pub skipped: Vec<PathBuf>,
    /// Files that could not be read or parsed.
    pub failed: Vec<(PathBuf, ConfVarError)>,
}

impl DirectoryReport {
    /// Whether no file failed and no variable rejected its value.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.loaded.iter().all(|(_, report)| report.is_clean())
    }

    /// Names updated across all loaded files.
    pub fn updated(&self) -> impl Iterator<Item = &str> {
        self.loaded
            .iter()
            .flat_map(|(_, report)| report.updated.iter().map(String::as_str))
    }
}

/// What was last loaded from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStamp {
    /// Hash of the file content.
    pub hash: u64,
    /// When the content was applied.
    pub loaded_at: DateTime<Utc>,
}

/// List configuration files under `dir`, sorted by path.
///
/// Subdirectories are searched when `options.recursive` is set. Symbolic
/// links to directories are not followed.
pub fn discover(dir: &Path, options: &LoaderOptions) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect(dir, options, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect(dir: &Path, options: &LoaderOptions, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| ConfVarError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ConfVarError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| ConfVarError::io(&path, e))?;
        if file_type.is_dir() {
            if options.recursive {
                collect(&path, options, files)?;
            }
        } else if options.matches(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Parse a YAML document. Blank documents are null.
pub fn parse_document(origin: &str, text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(text).map_err(|e| ConfVarError::parse(origin, e))
}

/// Read and parse one configuration file.
pub fn read_document(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|e| ConfVarError::io(path, e))?;
    parse_document(&path.display().to_string(), &text)
}

/// Content hash used to detect unchanged files.
pub fn content_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
