//! Presence management for the parley coordination core.
//!
//! This crate owns the local session's rich status and a live roster of
//! everyone else's, reconciled from three independently-unreliable sources:
//! the ephemeral presence bus (join/leave/sync), the durable-store change
//! feed (other sessions and devices), and time (heartbeats and staleness
//! eviction). The durable store is advisory: it only matters on cold start
//! and for observers that missed the live events.

pub mod config;
pub mod error;
pub mod ports;
pub mod service;
pub mod testing;
pub mod types;

pub use config::PresenceConfig;
pub use error::{PresenceError, Result};
pub use ports::{BusHandle, PresenceBus, PresenceEvent, StatusStore};
pub use service::PresenceService;
pub use types::{PersistedStatus, PresenceRecord, StatusRow, UserStatus};
