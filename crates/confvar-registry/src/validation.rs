//! Variable name validation

use confvar_common::{ConfVarError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Pattern every variable name must match: lowercase ASCII letters,
/// digits, underscore and dot, at least one character.
pub static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-z_.]+$").expect("Invalid variable name regex pattern"));

/// Whether `name` is usable as a variable name
pub fn is_valid_name(name: &str) -> bool {
    NAME_REGEX.is_match(name)
}

/// Validate a variable name, failing with `InvalidName`
pub fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(ConfVarError::invalid_name(name))
    }
}
