//! Error types for the infrastructure crate.

use thiserror::Error;

/// Errors produced by infrastructure components
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// The owning component has already been torn down
    #[error("component terminated: {0}")]
    Terminated(String),
}

/// Result alias for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;
