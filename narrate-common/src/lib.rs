//! # narrate common library
//!
//! Shared code for the narrate workspace:
//! - Error type used for configuration and filesystem failures
//! - Layered configuration loading (TOML file, value parsing helpers)
//! - Logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
