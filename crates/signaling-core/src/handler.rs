//! The call signaling handler.
//!
//! Several event sources (an initial scan, a push change feed, a polling
//! fallback, and per-call plus receiver-wide call-record subscriptions)
//! all funnel into one mutation entry point, `handle_candidate`. Dedup,
//! staleness, and suppression are checked there once, not per source: any
//! single source can silently fail, and any pair can race, so the handler
//! is built around idempotency rather than ordering.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use parley_infra_common::{best_effort, ChangeEvent, FeedFilter, TaskSet};

use crate::call::{
    CallId, CallNotification, CallRecord, CallRecordStatus, CallUiState, ClearReason,
};
use crate::config::SignalingConfig;
use crate::error::{Result, SignalingError};
use crate::ports::{JoinGrant, NavParams, SignalingPorts};
use crate::ringtone::RingtoneControl;
use crate::room::RoomLocationContext;

/// Which source surfaced a candidate notification.
///
/// Scan-style sources (initial scan, polling) re-surface old rows, so only
/// they go through the staleness filter; push inserts are fresh by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    InitialScan,
    Push,
    Poll,
}

impl CandidateSource {
    fn is_scan(&self) -> bool {
        matches!(self, Self::InitialScan | Self::Poll)
    }
}

struct HandlerState {
    user_id: String,
    config: SignalingConfig,
    ports: SignalingPorts,
    ringtone: RingtoneControl,
    room_location: RoomLocationContext,
    /// Notification ids already handled by any source
    processed: Mutex<HashSet<Uuid>>,
    /// Calls whose terminal transition has been processed
    handled_terminals: Mutex<HashSet<CallId>>,
    ui_state: Mutex<CallUiState>,
    /// Weak so running tasks (which hold the state) cannot keep the task
    /// set, and therefore themselves, alive after the handler is dropped
    tasks: Weak<TaskSet>,
}

impl HandlerState {
    fn is_active_notification(&self, id: Uuid) -> bool {
        match &*self.ui_state.lock() {
            CallUiState::Ringing(n) => n.id == id,
            CallUiState::Idle => false,
        }
    }

    fn current_call(&self) -> Option<CallNotification> {
        match &*self.ui_state.lock() {
            CallUiState::Ringing(n) => Some(n.clone()),
            CallUiState::Idle => None,
        }
    }

    /// Every termination path funnels through here so cleanup semantics
    /// are identical: stop and rewind the ringtone, hide the banner,
    /// return to idle. The reason is for logging/classification only.
    fn clear_incoming_call(&self, reason: ClearReason) {
        self.ringtone.stop();
        {
            let mut ui = self.ui_state.lock();
            if !ui.is_ringing() {
                return;
            }
            *ui = CallUiState::Idle;
        }
        if reason == ClearReason::Cancelled {
            info!("incoming call cancelled by the caller");
        }
        debug!(?reason, "incoming call UI cleared");
    }

    /// Terminal call-record transitions observed from any subscription.
    fn handle_record_event(&self, event: ChangeEvent<CallRecord>) {
        let record = match event {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new, .. } => new,
            ChangeEvent::Delete { .. } => return,
        };
        if !record.status.is_terminal() {
            return;
        }

        let active = {
            let ui = self.ui_state.lock();
            match &*ui {
                CallUiState::Ringing(n) if n.content.call_id == record.call_id => n.clone(),
                _ => {
                    trace!(call = %record.call_id, "terminal record for inactive call ignored");
                    return;
                }
            }
        };

        if !self.handled_terminals.lock().insert(record.call_id) {
            trace!(call = %record.call_id, "terminal transition already processed");
            return;
        }

        let reason = match record.status {
            CallRecordStatus::Accepted => ClearReason::AcceptedElsewhere,
            CallRecordStatus::Declined => ClearReason::Declined,
            CallRecordStatus::Missed => ClearReason::Missed,
            CallRecordStatus::Ended => ClearReason::Ended,
            CallRecordStatus::Ringing => return,
        };
        self.clear_incoming_call(reason);

        // Mark read server-side, by call id, so the recipient's other
        // devices clear too
        let notifications = self.ports.notifications.clone();
        let recipient = active.recipient_id.clone();
        best_effort("terminal mark-read", async move {
            notifications
                .mark_read_for_call(&recipient, record.call_id)
                .await
        });
    }
}

/// The single mutation entry point for incoming-call candidates.
fn handle_candidate(
    state: &Arc<HandlerState>,
    notification: CallNotification,
    source: CandidateSource,
) {
    // Dedup before any side effect: two sources racing on the same id
    // must produce exactly one banner and one ring.
    if !state.processed.lock().insert(notification.id) {
        trace!(id = %notification.id, ?source, "duplicate call notification ignored");
        return;
    }

    if source.is_scan() {
        let age = notification.age().to_std().unwrap_or_default();
        if age > state.config.stale_call_after {
            debug!(
                id = %notification.id,
                age_secs = age.as_secs(),
                "stale call notification, not ringing"
            );
            return;
        }
    }

    // The room-local UI owns the read/accept/decline flow when the
    // recipient is already viewing the room; marking the notification
    // read here would race its display.
    if state.room_location.is_in_room(&notification.content.room_id) {
        debug!(
            room = %notification.content.room_id,
            "recipient already in the call's room, suppressing global banner"
        );
        return;
    }

    {
        let mut ui = state.ui_state.lock();
        if ui.is_ringing() {
            debug!(id = %notification.id, "a call is already ringing, first-seen wins");
            return;
        }
        *ui = CallUiState::Ringing(notification.clone());
    }

    info!(
        call = %notification.content.call_id,
        kind = notification.content.call_kind.as_str(),
        from = %notification.content.sender_name,
        "incoming call"
    );
    state.ringtone.start();
    watch_call_record(state, notification.content.call_id);
}

/// Attach the per-call record subscription once a call rings. The generic
/// receiver-filtered subscription can miss updates (a null receiver id,
/// for one); this one cannot.
fn watch_call_record(state: &Arc<HandlerState>, call_id: CallId) {
    let tasks = match state.tasks.upgrade() {
        Some(tasks) => tasks,
        None => return,
    };
    let watcher = state.clone();
    tasks.spawn(format!("call-record-watch:{}", call_id), async move {
        let mut rx = watcher
            .ports
            .call_record_feed
            .subscribe(FeedFilter::eq("call_id", call_id.to_string()))
            .await;
        while let Some(event) = rx.recv().await {
            watcher.handle_record_event(event);
        }
    });
}

/// Notification rows changing under us: inserts are new candidates; an
/// external mark-read or deletion (the caller cancelled) clears the banner.
fn handle_notification_change(state: &Arc<HandlerState>, event: ChangeEvent<CallNotification>) {
    match event {
        ChangeEvent::Insert { new } => handle_candidate(state, new, CandidateSource::Push),
        ChangeEvent::Update { new, .. } => {
            if new.is_read && state.is_active_notification(new.id) {
                state.clear_incoming_call(ClearReason::ReadElsewhere);
            }
        }
        ChangeEvent::Delete { old } => {
            if state.is_active_notification(old.id) {
                state.clear_incoming_call(ClearReason::Cancelled);
            }
        }
    }
}

/// Call signaling handler for one authenticated session.
///
/// Owns the processed-id set, the banner state, and the ringtone; tears
/// down every subscription and timer in one call on shutdown.
pub struct CallSignalingHandler {
    state: Arc<HandlerState>,
    tasks: Arc<TaskSet>,
}

impl CallSignalingHandler {
    /// Start the handler for an authenticated user: run the initial unread
    /// scan, subscribe to notification and call-record feeds, and start
    /// the polling fallback.
    pub async fn start(
        user_id: impl Into<String>,
        config: SignalingConfig,
        ports: SignalingPorts,
        room_location: RoomLocationContext,
    ) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.is_empty() {
            return Err(SignalingError::Config(
                "call signaling requires an authenticated user".to_string(),
            ));
        }
        config.validate()?;

        // Subscribe before any task runs so no early event can slip past
        let mut notification_rx = ports
            .notification_feed
            .subscribe(FeedFilter::eq("recipient_id", user_id.clone()))
            .await;
        let mut record_rx = ports
            .call_record_feed
            .subscribe(FeedFilter::eq("receiver_id", user_id.clone()))
            .await;

        let tasks = Arc::new(TaskSet::new("call-signaling"));
        let ringtone = RingtoneControl::new(ports.ringtone.clone());
        let state = Arc::new(HandlerState {
            user_id,
            config,
            ports,
            ringtone,
            room_location,
            processed: Mutex::new(HashSet::new()),
            handled_terminals: Mutex::new(HashSet::new()),
            ui_state: Mutex::new(CallUiState::Idle),
            tasks: Arc::downgrade(&tasks),
        });

        // Source 1: most recent unread call at mount
        let scan = state.clone();
        tasks.spawn("initial-scan", async move {
            match scan.ports.notifications.latest_unread_call(&scan.user_id).await {
                Ok(Some(n)) => handle_candidate(&scan, n, CandidateSource::InitialScan),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "initial call scan failed"),
            }
        });

        // Sources 2 and 6: inserts ring, updates/deletes clear
        let push = state.clone();
        tasks.spawn("notification-feed", async move {
            while let Some(event) = notification_rx.recv().await {
                handle_notification_change(&push, event);
            }
        });

        // Source 3: polling fallback, the backstop when push delivery
        // is delayed or dropped
        let poll = state.clone();
        tasks.spawn("unread-call-poll", async move {
            let mut ticker = interval(poll.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match poll.ports.notifications.latest_unread_call(&poll.user_id).await {
                    Ok(Some(n)) => handle_candidate(&poll, n, CandidateSource::Poll),
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "unread call poll failed"),
                }
            }
        });

        // Source 5: any call record addressed to this user, catching
        // termination before the per-call subscription attaches
        let records = state.clone();
        tasks.spawn("receiver-record-feed", async move {
            while let Some(event) = record_rx.recv().await {
                records.handle_record_event(event);
            }
        });

        // Source 4 (the per-call record subscription) attaches in
        // watch_call_record once a call rings.

        Ok(CallSignalingHandler { state, tasks })
    }

    /// Accept the ringing call.
    ///
    /// The call-record update is issued and awaited before the navigation
    /// request; the receiving room depends on it to know the call is
    /// live. Mark-read is fire-and-forget, and the banner clears
    /// immediately without waiting on either write.
    pub async fn accept(&self) -> Result<()> {
        let notification = self
            .state
            .current_call()
            .ok_or(SignalingError::NoActiveCall)?;
        let call_id = notification.content.call_id;

        // Our own terminal transition; the feed echo must not re-process it
        self.state.handled_terminals.lock().insert(call_id);

        if let Err(e) = self
            .state
            .ports
            .call_records
            .update_status(call_id, CallRecordStatus::Accepted)
            .await
        {
            warn!(call = %call_id, error = %e, "accept status update failed");
        }

        let notifications = self.state.ports.notifications.clone();
        let id = notification.id;
        best_effort("accept mark-read", async move {
            notifications.mark_read(id).await
        });

        self.state.ports.navigator.request_navigation(
            &format!("/rooms/{}", notification.content.room_id),
            NavParams {
                auto_join: true,
                call_id: Some(call_id),
                call_kind: Some(notification.content.call_kind),
            },
        );

        self.state.clear_incoming_call(ClearReason::Accepted);
        Ok(())
    }

    /// Decline the ringing call. The call record is not touched here;
    /// its transition is observed reactively when the caller's side
    /// updates it.
    pub fn decline(&self) -> Result<()> {
        self.decline_inner(false)
    }

    /// Decline and navigate to the room (without auto-join) so the user
    /// can compose a text reply.
    pub fn decline_with_message(&self) -> Result<()> {
        self.decline_inner(true)
    }

    fn decline_inner(&self, with_message: bool) -> Result<()> {
        let notification = self
            .state
            .current_call()
            .ok_or(SignalingError::NoActiveCall)?;

        let notifications = self.state.ports.notifications.clone();
        let id = notification.id;
        best_effort("decline mark-read", async move {
            notifications.mark_read(id).await
        });

        if with_message {
            self.state.ports.navigator.request_navigation(
                &format!("/rooms/{}", notification.content.room_id),
                NavParams {
                    auto_join: false,
                    call_id: Some(notification.content.call_id),
                    call_kind: Some(notification.content.call_kind),
                },
            );
        }

        self.state.clear_incoming_call(if with_message {
            ClearReason::DeclinedWithMessage
        } else {
            ClearReason::Declined
        });
        Ok(())
    }

    /// First user interaction: unlock audio and start a pending ring
    pub fn user_gesture(&self) {
        self.state.ringtone.user_gesture();
    }

    /// Fetch a media join credential for a room. The media layer itself
    /// stays opaque to this core.
    pub async fn join_grant(&self, room_id: &str) -> Result<JoinGrant> {
        self.state
            .ports
            .tokens
            .join_grant(room_id, &self.state.user_id)
            .await
    }

    pub fn ui_state(&self) -> CallUiState {
        self.state.ui_state.lock().clone()
    }

    pub fn current_call(&self) -> Option<CallNotification> {
        self.state.current_call()
    }

    pub fn is_ringing(&self) -> bool {
        self.state.ui_state.lock().is_ringing()
    }

    /// Whether a ring is parked waiting for a user-gesture unlock
    pub fn ringtone_pending(&self) -> bool {
        self.state.ringtone.is_pending()
    }

    /// Tear down every subscription and timer and clear any active banner
    pub fn shutdown(&self) {
        self.state.clear_incoming_call(ClearReason::Shutdown);
        self.tasks.teardown();
    }
}
