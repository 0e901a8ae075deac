//! Error types for the tiered-authorization core
//!
//! Misconfiguration (missing or malformed backing documents) never shows up
//! here: those cases are logged and degrade to "source absent" so that
//! authorization keeps working. This enum covers the seams where a failure
//! is a value the caller (or an injected callback) must produce explicitly.

use thiserror::Error;

/// Authorization core errors
#[derive(Debug, Error)]
pub enum Error {
    /// A tier label or number could not be parsed
    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    /// An injected tier-resolution callback failed
    #[error("Tier resolution failed: {0}")]
    TierResolution(String),

    /// An injected consent validator failed
    #[error("Consent validation failed: {0}")]
    Validation(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, Error>;
