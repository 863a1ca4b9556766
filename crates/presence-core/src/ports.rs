//! External interface ports consumed by the presence service.
//!
//! The durable store and the presence bus are external collaborators; this
//! crate only specifies their boundary. Host applications provide the real
//! implementations, [`crate::testing`] provides in-memory doubles.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{PersistedStatus, PresenceRecord};

/// Durable status store: one row per user.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Read a user's persisted status, `None` if no row exists
    async fn get(&self, user_id: &str) -> Result<Option<PersistedStatus>>;

    /// Write a user's persisted status
    async fn set(&self, user_id: &str, status: PersistedStatus) -> Result<()>;
}

/// Handle to one bus channel subscription.
///
/// Channels are created with a unique name per session start; tearing down
/// the handle is what prevents duplicate presence entries from a previous
/// session identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusHandle {
    pub channel_key: String,
}

/// Events delivered by a presence bus subscription.
#[derive(Debug, Clone)]
pub enum PresenceEvent {
    /// The subscription is live; the session should publish its record
    Subscribed,
    /// Bulk roster snapshot delivered on (re)join
    Sync { roster: Vec<PresenceRecord> },
    /// New members joined the channel
    Join { entries: Vec<PresenceRecord> },
    /// Members disconnected from the channel
    Leave { user_ids: Vec<String> },
}

/// Ephemeral publish/subscribe channel with presence semantics.
///
/// Not durable: state exists only while members are connected. Delivery
/// order across members is not guaranteed.
#[async_trait]
pub trait PresenceBus: Send + Sync {
    /// Join a presence channel; events arrive on the returned receiver
    async fn subscribe(
        &self,
        channel_key: &str,
    ) -> Result<(BusHandle, mpsc::Receiver<PresenceEvent>)>;

    /// Publish this session's presence record on the channel
    async fn track(&self, handle: &BusHandle, record: PresenceRecord) -> Result<()>;

    /// Leave the channel and drop its server-side state
    async fn unsubscribe(&self, handle: &BusHandle) -> Result<()>;
}
