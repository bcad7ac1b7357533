//! Error types for confvar operations

use crate::types::ListenerId;
use std::path::Path;
use thiserror::Error;

/// Result type alias for confvar operations
pub type Result<T> = std::result::Result<T, ConfVarError>;

/// Failure converting between a native value and its text form.
///
/// Element and entry failures nest, so a bad item deep inside a
/// sequence of maps reports its whole path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// The text is not valid structured text
    #[error("malformed text: {0}")]
    Syntax(String),

    /// The node has the wrong shape or scalar kind
    #[error("expected {expected}, found {found}")]
    Mismatch {
        /// What the converter needed
        expected: &'static str,
        /// What the text actually contained
        found: String,
    },

    /// A numeric value does not fit the target type
    #[error("value {value} out of range for {target}")]
    OutOfRange {
        /// Target type name
        target: &'static str,
        /// Offending value, rendered
        value: String,
    },

    /// An element of a sequence or set failed to convert
    #[error("element {index}: {source}")]
    Element {
        /// Zero-based position in the source sequence
        index: usize,
        /// Underlying failure
        source: Box<ConvertError>,
    },

    /// A map entry failed to convert
    #[error("entry '{key}': {source}")]
    Entry {
        /// Map key of the failing entry
        key: String,
        /// Underlying failure
        source: Box<ConvertError>,
    },

    /// The native value could not be rendered to text
    #[error("failed to render value: {0}")]
    Render(String),
}

impl ConvertError {
    /// Create a mismatch error
    pub fn mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        Self::Mismatch {
            expected,
            found: found.into(),
        }
    }

    /// Wrap a failure at position `index` of a sequence
    pub fn element(index: usize, source: Self) -> Self {
        Self::Element {
            index,
            source: Box::new(source),
        }
    }

    /// Wrap a failure at map key `key`
    pub fn entry(key: impl Into<String>, source: Self) -> Self {
        Self::Entry {
            key: key.into(),
            source: Box::new(source),
        }
    }
}

/// Main error type for registry operations
#[derive(Error, Debug)]
pub enum ConfVarError {
    /// Name contains characters outside `[0-9a-z_.]`
    #[error("invalid variable name '{name}': only [0-9a-z_.] is allowed")]
    InvalidName {
        /// The rejected name
        name: String,
    },

    /// An existing variable has a different value type than requested
    #[error("variable '{name}' holds {found}, requested as {expected}")]
    TypeMismatch {
        /// Variable name
        name: String,
        /// Requested value type
        expected: &'static str,
        /// Stored value type
        found: &'static str,
    },

    /// Text could not be converted into the variable's value type
    #[error("cannot convert value for '{name}': {source}")]
    Conversion {
        /// Variable name
        name: String,
        /// Underlying conversion failure
        #[source]
        source: ConvertError,
    },

    /// A change listener panicked
    #[error("listener {listener} on '{name}' failed: {message}")]
    ListenerFailure {
        /// Variable name
        name: String,
        /// Failing listener
        listener: ListenerId,
        /// Panic payload, if it was a string
        message: String,
    },

    /// I/O failure while reading configuration sources
    #[error("I/O error on {origin}: {source}")]
    Io {
        /// Path being read
        origin: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration document is not valid YAML
    #[error("failed to parse {origin}: {source}")]
    Parse {
        /// Path or description of the document
        origin: String,
        /// Underlying parser error
        #[source]
        source: serde_yaml::Error,
    },

    /// Environment variable override could not be parsed
    #[error("failed to parse environment variable '{var}': {message}")]
    EnvParse {
        /// Environment variable name
        var: String,
        /// Parser message
        message: String,
    },

    /// File watcher could not be set up
    #[error("file watcher error: {message}")]
    Watch {
        /// Watcher backend message
        message: String,
    },

    /// Logging subscriber could not be installed
    #[error("logging setup failed: {message}")]
    Logging {
        /// Subscriber message
        message: String,
    },
}

impl ConfVarError {
    /// Create an invalid-name error
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }

    /// Create a type-mismatch error
    pub fn type_mismatch(
        name: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected,
            found,
        }
    }

    /// Create a conversion error for variable `name`
    pub fn conversion(name: impl Into<String>, source: ConvertError) -> Self {
        Self::Conversion {
            name: name.into(),
            source,
        }
    }

    /// Create an I/O error for `path`
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            origin: path.display().to_string(),
            source,
        }
    }

    /// Create a YAML parse error for `origin`
    pub fn parse(origin: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Parse {
            origin: origin.into(),
            source,
        }
    }

    /// Create an environment parse error
    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvParse {
            var: var.into(),
            message: message.into(),
        }
    }

    /// Whether this is a type mismatch
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    /// Whether this is a name validation failure
    pub fn is_invalid_name(&self) -> bool {
        matches!(self, Self::InvalidName { .. })
    }
}
