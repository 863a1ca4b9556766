//! In-memory port doubles for signaling tests.
//!
//! The doubles optionally share an operation journal so tests can assert
//! cross-port ordering (the accept flow's record-update-before-navigation
//! guarantee, for one).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::call::{CallContent, CallId, CallKind, CallNotification, CallRecordStatus};
use crate::error::Result;
use crate::ports::{CallRecordApi, JoinGrant, NavParams, Navigator, NotificationApi, TokenService};
use crate::ringtone::{PlaybackRejected, RingtonePlayer};

/// Shared, ordered log of port operations
pub type OpJournal = Arc<Mutex<Vec<String>>>;

pub fn new_journal() -> OpJournal {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(journal: &Option<OpJournal>, entry: String) {
    if let Some(journal) = journal {
        journal.lock().push(entry);
    }
}

/// Build a call notification for tests
pub fn call_notification(
    recipient_id: &str,
    room_id: &str,
    created_at: DateTime<Utc>,
) -> CallNotification {
    CallNotification {
        id: Uuid::new_v4(),
        recipient_id: recipient_id.to_string(),
        content: CallContent {
            sender_name: "caller".to_string(),
            call_kind: CallKind::Video,
            call_id: Uuid::new_v4(),
            room_id: room_id.to_string(),
        },
        related_id: None,
        created_at,
        is_read: false,
    }
}

/// Notification store double: unread rows plus a record of mark-read calls
#[derive(Default)]
pub struct InMemoryNotificationApi {
    unread: Mutex<Vec<CallNotification>>,
    read_ids: Mutex<Vec<Uuid>>,
    journal: Option<OpJournal>,
}

impl InMemoryNotificationApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_journal(journal: OpJournal) -> Arc<Self> {
        Arc::new(InMemoryNotificationApi {
            journal: Some(journal),
            ..Default::default()
        })
    }

    /// Seed an unread notification for the scan/poll paths to find
    pub fn push_unread(&self, notification: CallNotification) {
        self.unread.lock().push(notification);
    }

    pub fn read_ids(&self) -> Vec<Uuid> {
        self.read_ids.lock().clone()
    }
}

#[async_trait]
impl NotificationApi for InMemoryNotificationApi {
    async fn latest_unread_call(&self, recipient_id: &str) -> Result<Option<CallNotification>> {
        Ok(self
            .unread
            .lock()
            .iter()
            .filter(|n| !n.is_read && n.recipient_id == recipient_id)
            .max_by_key(|n| n.created_at)
            .cloned())
    }

    async fn mark_read(&self, notification_id: Uuid) -> Result<()> {
        for n in self.unread.lock().iter_mut() {
            if n.id == notification_id {
                n.is_read = true;
            }
        }
        self.read_ids.lock().push(notification_id);
        record(&self.journal, format!("mark-read:{}", notification_id));
        Ok(())
    }

    async fn mark_read_for_call(&self, recipient_id: &str, call_id: CallId) -> Result<()> {
        let mut marked = Vec::new();
        for n in self.unread.lock().iter_mut() {
            if n.recipient_id == recipient_id && n.content.call_id == call_id {
                n.is_read = true;
                marked.push(n.id);
            }
        }
        self.read_ids.lock().extend(marked);
        record(
            &self.journal,
            format!("mark-read-for-call:{}", call_id),
        );
        Ok(())
    }
}

/// Call record API double recording every status update
#[derive(Default)]
pub struct RecordingCallRecordApi {
    updates: Mutex<Vec<(CallId, CallRecordStatus)>>,
    journal: Option<OpJournal>,
}

impl RecordingCallRecordApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_journal(journal: OpJournal) -> Arc<Self> {
        Arc::new(RecordingCallRecordApi {
            journal: Some(journal),
            ..Default::default()
        })
    }

    pub fn updates(&self) -> Vec<(CallId, CallRecordStatus)> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl CallRecordApi for RecordingCallRecordApi {
    async fn update_status(&self, call_id: CallId, status: CallRecordStatus) -> Result<()> {
        self.updates.lock().push((call_id, status));
        record(
            &self.journal,
            format!("record-update:{}", status.as_str()),
        );
        Ok(())
    }
}

/// Navigator double recording every navigation intent
#[derive(Default)]
pub struct RecordingNavigator {
    requests: Mutex<Vec<(String, NavParams)>>,
    journal: Option<OpJournal>,
}

impl RecordingNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_journal(journal: OpJournal) -> Arc<Self> {
        Arc::new(RecordingNavigator {
            journal: Some(journal),
            ..Default::default()
        })
    }

    pub fn requests(&self) -> Vec<(String, NavParams)> {
        self.requests.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn request_navigation(&self, path: &str, params: NavParams) {
        self.requests.lock().push((path.to_string(), params));
        record(&self.journal, format!("navigate:{}", path));
    }
}

/// Token service double issuing deterministic grants
pub struct StaticTokenService;

impl StaticTokenService {
    pub fn new() -> Arc<Self> {
        Arc::new(StaticTokenService)
    }
}

#[async_trait]
impl TokenService for StaticTokenService {
    async fn join_grant(&self, room_id: &str, _user_id: &str) -> Result<JoinGrant> {
        Ok(JoinGrant {
            token: format!("grant-{}", room_id),
            endpoint: "wss://media.test".to_string(),
            room_id: room_id.to_string(),
        })
    }
}

/// Ringtone double; optionally rejects playback until unblocked, modeling
/// the platform autoplay policy
pub struct FakeRingtone {
    blocked: AtomicBool,
    playing: AtomicBool,
    plays: AtomicUsize,
}

impl FakeRingtone {
    pub fn new() -> Arc<Self> {
        Self::with_blocked(false)
    }

    pub fn with_blocked(blocked: bool) -> Arc<Self> {
        Arc::new(FakeRingtone {
            blocked: AtomicBool::new(blocked),
            playing: AtomicBool::new(false),
            plays: AtomicUsize::new(0),
        })
    }

    /// Simulate the platform unlocking audio after a user gesture
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl RingtonePlayer for FakeRingtone {
    fn play(&self) -> std::result::Result<(), PlaybackRejected> {
        if self.blocked.load(Ordering::SeqCst) {
            return Err(PlaybackRejected("autoplay policy".to_string()));
        }
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn rewind(&self) {}
}
