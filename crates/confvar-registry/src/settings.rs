//! Options controlling how configuration directories are discovered.

use confvar_common::{ConfVarError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Directory discovery options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// File extensions treated as configuration files, without the dot.
    pub extensions: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            extensions: vec!["yml".to_string(), "yaml".to_string()],
        }
    }
}

impl LoaderOptions {
    /// Environment variable overriding [`LoaderOptions::recursive`].
    pub const RECURSIVE_ENV: &'static str = "CONFVAR_RECURSIVE";
    /// Environment variable overriding [`LoaderOptions::extensions`], comma separated.
    pub const EXTENSIONS_ENV: &'static str = "CONFVAR_EXTENSIONS";

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();
        options.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(options)
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(recursive) = lookup(Self::RECURSIVE_ENV) {
            self.recursive = recursive
                .trim()
                .parse()
                .map_err(|e: std::str::ParseBoolError| {
                    ConfVarError::env_parse(Self::RECURSIVE_ENV, e.to_string())
                })?;
        }

        if let Some(extensions) = lookup(Self::EXTENSIONS_ENV) {
            let extensions: Vec<String> = extensions
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            if extensions.is_empty() {
                return Err(ConfVarError::env_parse(
                    Self::EXTENSIONS_ENV,
                    "no extensions listed",
                ));
            }
            self.extensions = extensions;
        }

        Ok(())
    }

    /// Whether `path` has one of the configured extensions (case-insensitive).
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = LoaderOptions::default();
        assert!(options.recursive);
        assert!(options.matches(Path::new("conf/app.yml")));
        assert!(options.matches(Path::new("conf/app.YAML")));
        assert!(!options.matches(Path::new("conf/app.toml")));
        assert!(!options.matches(Path::new("conf/yml")));
    }

    #[test]
    fn test_overrides() {
        let mut options = LoaderOptions::default();
        options
            .apply_overrides(lookup(&[
                ("CONFVAR_RECURSIVE", "false"),
                ("CONFVAR_EXTENSIONS", ".conf, YML"),
            ]))
            .unwrap();
        assert!(!options.recursive);
        assert_eq!(options.extensions, vec!["conf", "yml"]);
    }

    #[test]
    fn test_bad_overrides() {
        let mut options = LoaderOptions::default();
        let err = options
            .apply_overrides(lookup(&[("CONFVAR_RECURSIVE", "sometimes")]))
            .unwrap_err();
        assert!(matches!(err, ConfVarError::EnvParse { ref var, .. } if var == "CONFVAR_RECURSIVE"));

        let err = options
            .apply_overrides(lookup(&[("CONFVAR_EXTENSIONS", " , ")]))
            .unwrap_err();
        assert!(matches!(err, ConfVarError::EnvParse { .. }));
        assert_eq!(options, LoaderOptions::default());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let options: LoaderOptions = serde_yaml::from_str("recursive: false").unwrap();
        assert!(!options.recursive);
        assert_eq!(options.extensions, LoaderOptions::default().extensions);
    }
}
