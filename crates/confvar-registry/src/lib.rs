//! # confvar registry
//!
//! Typed, name-addressed configuration variables.
//!
//! Code declares the variables it needs through a [`Registry`], each with a
//! default and a description. Configuration files then override those
//! defaults by name, and listeners attached to a variable hear about every
//! change. Directories can be reloaded incrementally or watched for edits.
//!
//! ```
//! use confvar_registry::Registry;
//!
//! let registry = Registry::new();
//! let workers = registry.lookup_or_create("pool.workers", 4usize, "worker threads").unwrap();
//! workers.add_listener(|old, new| println!("workers: {old} -> {new}"));
//!
//! let report = registry.load_from_str("pool:\n  workers: 8\n").unwrap();
//! assert_eq!(report.updated, vec!["pool.workers"]);
//! assert_eq!(workers.get_value(), 8);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod convert;
pub mod loader;
pub mod registry;
pub mod settings;
pub mod tree;
pub mod validation;
pub mod variable;
pub mod watcher;

pub use confvar_common::{ConfVarError, ConvertError, ListenerId, Result};
pub use convert::{Convert, Structured, ValueKind};
pub use loader::{DirectoryReport, LoadReport, SourceStamp};
pub use registry::Registry;
pub use settings::LoaderOptions;
pub use validation::{is_valid_name, validate_name};
pub use variable::{ChangeListener, Variable, VariableBase, VariableValue};
pub use watcher::ConfigWatcher;
