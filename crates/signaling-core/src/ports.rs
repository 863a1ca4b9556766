//! External interface ports consumed by the call signaling handler.

use std::sync::Arc;

use async_trait::async_trait;

use parley_infra_common::ChangeFeed;

use crate::call::{CallId, CallKind, CallNotification, CallRecord, CallRecordStatus};
use crate::error::Result;
use crate::ringtone::RingtonePlayer;

/// Notification table access. Another actor owns inserts; this core only
/// reads and marks-read.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Most recent unread call-type notification for the recipient
    async fn latest_unread_call(&self, recipient_id: &str) -> Result<Option<CallNotification>>;

    /// Mark one notification read
    async fn mark_read(&self, notification_id: uuid::Uuid) -> Result<()>;

    /// Mark read by recipient and call id, for paths where only the call
    /// is known (e.g. clearing other devices after an observed termination)
    async fn mark_read_for_call(&self, recipient_id: &str, call_id: CallId) -> Result<()>;
}

/// Call record table access. This core only ever writes `Accepted`.
#[async_trait]
pub trait CallRecordApi: Send + Sync {
    async fn update_status(&self, call_id: CallId, status: CallRecordStatus) -> Result<()>;
}

/// Parameters attached to a navigation intent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavParams {
    /// Join the call immediately on arrival
    pub auto_join: bool,
    pub call_id: Option<CallId>,
    pub call_kind: Option<CallKind>,
}

/// Navigation intents. Fire-and-forget: no return value is consumed.
pub trait Navigator: Send + Sync {
    fn request_navigation(&self, path: &str, params: NavParams);
}

/// Short-lived credential for joining the media session. The media layer
/// itself is opaque to this core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGrant {
    pub token: String,
    pub endpoint: String,
    pub room_id: String,
}

/// External token/signaling service for the excluded media layer
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn join_grant(&self, room_id: &str, user_id: &str) -> Result<JoinGrant>;
}

/// Everything the handler needs from the outside world, bundled so the
/// start signature stays readable.
pub struct SignalingPorts {
    pub notifications: Arc<dyn NotificationApi>,
    pub call_records: Arc<dyn CallRecordApi>,
    pub navigator: Arc<dyn Navigator>,
    pub tokens: Arc<dyn TokenService>,
    pub ringtone: Arc<dyn RingtonePlayer>,
    pub notification_feed: Arc<dyn ChangeFeed<CallNotification>>,
    pub call_record_feed: Arc<dyn ChangeFeed<CallRecord>>,
}
