//! Error types for the presence crate.

use thiserror::Error;

/// Errors produced by presence operations
#[derive(Debug, Error)]
pub enum PresenceError {
    /// Invalid configuration (timing relations violated, empty identity)
    #[error("configuration error: {0}")]
    Config(String),

    /// Presence bus subscribe/track/unsubscribe failure
    #[error("presence bus error: {0}")]
    Bus(String),

    /// Durable status store read/write failure
    #[error("status store error: {0}")]
    Store(String),
}

/// Result alias for presence operations
pub type Result<T> = std::result::Result<T, PresenceError>;
