// src/errors.rs

//! Crate-wide error type and `Result` alias.
//!
//! The variants follow the job manager's error taxonomy: validation failures
//! are raised before any side effect, not-found and invalid-state errors come
//! from registry lookups, process errors from spawning, and persistence errors
//! from the `JobStore`. Once shutdown has begun, new work is refused with
//! `ShuttingDown`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulsarError {
    #[error("Validation error on `{field}`: {message}")]
    Validation { field: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job {id} is {status}; cannot {action}")]
    InvalidState {
        id: String,
        status: String,
        action: &'static str,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Manager is shutting down; cannot {0}")]
    ShuttingDown(&'static str),
}

impl PulsarError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PulsarError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for the error kind `create_job` raises before touching anything.
    pub fn is_validation(&self) -> bool {
        matches!(self, PulsarError::Validation { .. })
    }
}

pub type Result<T> = std::result::Result<T, PulsarError>;
