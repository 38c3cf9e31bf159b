//! # Error Types
//!
//! Custom error types for vpad-mapper using `thiserror`.
//!
//! The variants follow the failure classes of the mapping core: validation
//! failures are detected before any mutation, conflicts abort a whole binding
//! or registration, cycles abort a whole build. None of them are retried
//! internally.

use thiserror::Error;

/// Main error type for vpad-mapper
#[derive(Debug, Error)]
pub enum MapperError {
    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Two requests collide (offsets, instances, names)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown blueprint, mapper, template or element
    #[error("Not found: {0}")]
    NotFound(String),

    /// Template self-reference or template cycle
    #[error("Template cycle detected: {0}")]
    Cycle(String),

    /// Operation not supported for the addressed target
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Physical device errors
    #[error("Device error: {0}")]
    Device(String),

    /// No usable physical gamepad found
    #[error("No gamepad found")]
    DeviceNotFound,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for vpad-mapper
pub type Result<T> = std::result::Result<T, MapperError>;
