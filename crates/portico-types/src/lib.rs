//! Foundation types for Portico.
//!
//! This crate holds the pieces shared by every other Portico crate: the
//! error enum and the TOML-backed configuration.

pub mod config;
pub mod error;

pub use config::PorticoConfig;
pub use error::{PorticoError, Result};
