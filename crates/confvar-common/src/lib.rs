//! # confvar common
//!
//! Shared types, errors, and logging setup for the confvar workspace.
//!
//! This crate provides the foundational pieces used by the registry crate:
//! the error taxonomy, listener identifiers, and the tracing bootstrap.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod logging;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use error::{ConfVarError, ConvertError, Result};
pub use logging::{init_logging, LoggingConfig};
pub use types::*;
