//! Call model: notifications, records, lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a call, assigned by the initiating session
pub type CallId = Uuid;

/// Whether the call carries audio only or audio + video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Audio,
    Video,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// Payload of a call-type notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContent {
    pub sender_name: String,
    pub call_kind: CallKind,
    pub call_id: CallId,
    pub room_id: String,
}

/// A call-type notification row.
///
/// Created by the caller's session; this core only reads it and marks it
/// read on accept/decline/expiry. Deletion by another actor clears the
/// local banner reactively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallNotification {
    pub id: Uuid,
    pub recipient_id: String,
    pub content: CallContent,
    pub related_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl CallNotification {
    /// Time elapsed since the caller created this notification
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// Lifecycle status of a call record.
///
/// Owned by the call-initiation flow; this core writes `Accepted` on local
/// accept and observes every other transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallRecordStatus {
    Ringing,
    Accepted,
    Declined,
    Missed,
    Ended,
}

impl CallRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ringing => "ringing",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Missed => "missed",
            Self::Ended => "ended",
        }
    }

    /// Everything but `Ringing` tears the banner down
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Ringing)
    }
}

/// A call record row as carried on the change feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: CallId,
    pub room_id: String,
    pub receiver_id: Option<String>,
    pub status: CallRecordStatus,
}

/// Banner state the UI renders. At most one call rings at a time;
/// first-seen wins until cleared.
#[derive(Debug, Clone, PartialEq)]
pub enum CallUiState {
    Idle,
    Ringing(CallNotification),
}

impl CallUiState {
    pub fn is_ringing(&self) -> bool {
        matches!(self, Self::Ringing(_))
    }
}

/// Why the incoming-call UI was cleared. Logging/classification only;
/// every reason runs the identical cleanup path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    Accepted,
    Declined,
    DeclinedWithMessage,
    AcceptedElsewhere,
    Missed,
    Ended,
    Cancelled,
    ReadElsewhere,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_status_but_ringing_is_terminal() {
        assert!(!CallRecordStatus::Ringing.is_terminal());
        assert!(CallRecordStatus::Accepted.is_terminal());
        assert!(CallRecordStatus::Declined.is_terminal());
        assert!(CallRecordStatus::Missed.is_terminal());
        assert!(CallRecordStatus::Ended.is_terminal());
    }

    #[test]
    fn statuses_use_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&CallRecordStatus::Accepted).unwrap(),
            "\"accepted\""
        );
        assert_eq!(serde_json::to_string(&CallKind::Video).unwrap(), "\"video\"");
    }
}
