//! Error types for Portico.

use std::io;

/// Errors produced by the Portico crates.
#[derive(Debug, thiserror::Error)]
pub enum PorticoError {
    /// Missing token, missing home path, or an invalid configuration value.
    #[error("config error: {0}")]
    Config(String),

    /// The request failed before a response was received.
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived with a non-2xx status.
    #[error("HTTP {code} {reason}")]
    Status { code: u16, reason: String },

    /// The response could not be parsed as HTTP.
    #[error("HTTP protocol error: {0}")]
    Http(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PorticoError>;
