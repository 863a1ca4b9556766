//! Error types for the signaling crate.

use thiserror::Error;

/// Errors produced by call-signaling operations
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Invalid configuration (timing relations violated, empty identity)
    #[error("configuration error: {0}")]
    Config(String),

    /// An accept/decline was requested with no call ringing
    #[error("no active incoming call")]
    NoActiveCall,

    /// Notification API failure
    #[error("notification error: {0}")]
    Notification(String),

    /// Call record API failure
    #[error("call record error: {0}")]
    CallRecord(String),

    /// Token/signaling service failure
    #[error("token service error: {0}")]
    Token(String),
}

/// Result alias for signaling operations
pub type Result<T> = std::result::Result<T, SignalingError>;
