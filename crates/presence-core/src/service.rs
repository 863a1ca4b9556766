//! The presence service: local status, live roster, liveness bookkeeping.
//!
//! One `PresenceService` exists per authenticated session. It owns the
//! roster map exclusively (every mutation happens on a task it supervises)
//! and consumers only ever receive cloned snapshots. Teardown aborts all of
//! its timers and subscription pumps in one call; leaking them across an
//! identity change would double-fire presence events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_infra_common::{best_effort, CancellationToken, ChangeEvent, ChangeFeed, FeedFilter, TaskSet};

use crate::config::PresenceConfig;
use crate::error::{PresenceError, Result};
use crate::ports::{BusHandle, PresenceBus, PresenceEvent, StatusStore};
use crate::types::{PersistedStatus, PresenceRecord, StatusRow, UserStatus};

/// Shared state mutated only by the service and its supervised tasks.
struct PresenceState {
    user_id: String,
    config: PresenceConfig,
    store: Arc<dyn StatusStore>,
    bus: Arc<dyn PresenceBus>,
    handle: BusHandle,
    local_status: RwLock<UserStatus>,
    roster: DashMap<String, PresenceRecord>,
    /// Liveness timestamps, fed only by bus events. Entries here are
    /// candidates for staleness eviction; change-feed merges do not count
    /// as liveness.
    last_seen: DashMap<String, Instant>,
}

impl PresenceState {
    fn record_now(&self) -> PresenceRecord {
        PresenceRecord::now(self.user_id.clone(), *self.local_status.read())
    }

    async fn publish_current(&self) {
        if let Err(e) = self.bus.track(&self.handle, self.record_now()).await {
            warn!(user = %self.user_id, error = %e, "presence publish failed");
        }
    }

    /// Set the local rich status and fan it out: roster entry, immediate
    /// bus publish, async persist of the collapsed value. Persistence
    /// failure never rolls the local state back.
    fn set_local_status(&self, new: UserStatus) {
        *self.local_status.write() = new;
        let record = self.record_now();
        self.roster.insert(self.user_id.clone(), record.clone());

        let bus = self.bus.clone();
        let handle = self.handle.clone();
        best_effort("presence track", async move { bus.track(&handle, record).await });

        let store = self.store.clone();
        let user_id = self.user_id.clone();
        best_effort("status persist", async move {
            store.set(&user_id, new.collapse()).await
        });
    }

    /// Bulk snapshot on (re)join: replace the roster wholesale.
    fn apply_sync(&self, roster: Vec<PresenceRecord>) {
        let now = Instant::now();
        self.roster.clear();
        self.last_seen.clear();
        for record in roster {
            self.last_seen.insert(record.user_id.clone(), now);
            self.roster.insert(record.user_id.clone(), record);
        }
        // A snapshot that raced ahead of our first track must not hide us
        self.roster
            .entry(self.user_id.clone())
            .or_insert_with(|| self.record_now());
    }

    fn apply_join(&self, entries: Vec<PresenceRecord>) {
        let now = Instant::now();
        for record in entries {
            self.last_seen.insert(record.user_id.clone(), now);
            self.roster.insert(record.user_id.clone(), record);
        }
    }

    /// A member disconnected: flip them offline locally and persist it in
    /// the background. The local update never waits on the write.
    fn apply_leave(&self, user_ids: Vec<String>) {
        for user_id in user_ids {
            self.last_seen.remove(&user_id);
            self.roster.insert(
                user_id.clone(),
                PresenceRecord::now(user_id.clone(), UserStatus::Offline),
            );

            let store = self.store.clone();
            best_effort("leave offline persist", async move {
                store.set(&user_id, PersistedStatus::Offline).await
            });
        }
    }

    /// Durable-store row changed out of band (another device or session):
    /// merge the expanded value. This is not a liveness signal.
    fn apply_status_row(&self, row: StatusRow) {
        let status = row.status.expand();
        debug!(user = %row.user_id, %status, "status row merged from change feed");
        self.roster
            .insert(row.user_id.clone(), PresenceRecord::now(row.user_id, status));
    }

    /// Evict peers whose liveness signal went quiet. Leave events are not
    /// guaranteed (crashed tab, partition), so this sweep is the fallback.
    fn sweep_stale(&self) {
        let now = Instant::now();
        let stale: Vec<String> = self
            .last_seen
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) > self.config.stale_after)
            .map(|entry| entry.key().clone())
            .collect();

        for user_id in stale {
            self.last_seen.remove(&user_id);
            if user_id == self.user_id {
                // our own liveness is self-evident
                continue;
            }
            let already_offline = self
                .roster
                .get(&user_id)
                .map(|r| r.status.is_offline())
                .unwrap_or(false);
            if already_offline {
                continue;
            }
            debug!(user = %user_id, "evicting stale presence entry");
            self.roster.insert(
                user_id.clone(),
                PresenceRecord::now(user_id.clone(), UserStatus::Offline),
            );

            let store = self.store.clone();
            best_effort("stale offline persist", async move {
                store.set(&user_id, PersistedStatus::Offline).await
            });
        }
    }

    async fn apply_bus_event(&self, event: PresenceEvent) {
        match event {
            PresenceEvent::Subscribed => self.publish_current().await,
            PresenceEvent::Sync { roster } => self.apply_sync(roster),
            PresenceEvent::Join { entries } => self.apply_join(entries),
            PresenceEvent::Leave { user_ids } => self.apply_leave(user_ids),
        }
    }
}

/// Presence service for one authenticated session.
pub struct PresenceService {
    state: Arc<PresenceState>,
    tasks: TaskSet,
    hidden_timer: Mutex<Option<CancellationToken>>,
}

impl PresenceService {
    /// Start the service for an authenticated user.
    ///
    /// Reads the persisted status (absent or `offline` cold-starts as
    /// `online` and persists that), joins the presence bus on a unique
    /// per-session channel, subscribes to the status change feed, and
    /// spawns the heartbeat and staleness sweep.
    pub async fn start(
        user_id: impl Into<String>,
        config: PresenceConfig,
        store: Arc<dyn StatusStore>,
        bus: Arc<dyn PresenceBus>,
        status_feed: Arc<dyn ChangeFeed<StatusRow>>,
    ) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.is_empty() {
            return Err(PresenceError::Config(
                "presence requires an authenticated user".to_string(),
            ));
        }
        config.validate()?;

        // Cold start must not show the user as offline to others.
        let initial = match store.get(&user_id).await {
            Ok(Some(persisted)) if persisted != PersistedStatus::Offline => persisted.expand(),
            Ok(_) => {
                if let Err(e) = store.set(&user_id, PersistedStatus::Online).await {
                    warn!(user = %user_id, error = %e, "cold-start status persist failed");
                }
                UserStatus::Online
            }
            Err(e) => {
                warn!(user = %user_id, error = %e, "persisted status unreadable, assuming online");
                UserStatus::Online
            }
        };

        // Unique per session start; a stale channel from a previous
        // identity would produce duplicate presence entries.
        let channel_key = format!("presence:{}:{}", user_id, Uuid::new_v4());
        let (handle, mut bus_rx) = bus.subscribe(&channel_key).await?;
        let mut feed_rx = status_feed.subscribe(FeedFilter::All).await;

        info!(user = %user_id, channel = %channel_key, %initial, "presence service started");

        let state = Arc::new(PresenceState {
            user_id,
            config: config.clone(),
            store,
            bus,
            handle,
            local_status: RwLock::new(initial),
            roster: DashMap::new(),
            last_seen: DashMap::new(),
        });
        state
            .roster
            .insert(state.user_id.clone(), state.record_now());

        let tasks = TaskSet::new("presence");

        let pump = state.clone();
        tasks.spawn("bus-events", async move {
            while let Some(event) = bus_rx.recv().await {
                pump.apply_bus_event(event).await;
            }
        });

        let pump = state.clone();
        tasks.spawn("status-feed", async move {
            while let Some(event) = feed_rx.recv().await {
                if let ChangeEvent::Insert { new } | ChangeEvent::Update { new, .. } = event {
                    pump.apply_status_row(new);
                }
            }
        });

        let beat = state.clone();
        tasks.spawn("heartbeat", async move {
            let mut ticker = interval(beat.config.heartbeat);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // the initial publish rides on Subscribed
            loop {
                ticker.tick().await;
                beat.publish_current().await;
            }
        });

        let sweep = state.clone();
        tasks.spawn("staleness-sweep", async move {
            let mut ticker = interval(sweep.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweep.sweep_stale();
            }
        });

        Ok(PresenceService {
            state,
            tasks,
            hidden_timer: Mutex::new(None),
        })
    }

    /// The local session's rich status
    pub fn status(&self) -> UserStatus {
        *self.state.local_status.read()
    }

    /// Rich status of any user, `Offline` when unknown
    pub fn status_of(&self, user_id: &str) -> UserStatus {
        self.state
            .roster
            .get(user_id)
            .map(|r| r.status)
            .unwrap_or(UserStatus::Offline)
    }

    /// Cloned snapshot of the live roster
    pub fn roster(&self) -> HashMap<String, UserStatus> {
        self.state
            .roster
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status))
            .collect()
    }

    /// Set the local status: synchronous local effect, immediate bus
    /// publish, background persist of the collapsed value.
    pub fn update_status(&self, new: UserStatus) {
        self.state.set_local_status(new);
    }

    /// Report a document/tab visibility change.
    ///
    /// Hidden for the configured threshold flips the session offline;
    /// returning to the foreground cancels a pending timer and, if the
    /// session went offline, brings it back online.
    pub fn visibility_changed(&self, visible: bool) {
        if visible {
            if let Some(token) = self.hidden_timer.lock().take() {
                token.cancel();
            }
            if self.status().is_offline() {
                self.state.set_local_status(UserStatus::Online);
            }
            return;
        }

        let mut pending = self.hidden_timer.lock();
        if pending.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *pending = Some(token.clone());
        drop(pending);

        let state = self.state.clone();
        let delay = self.state.config.hidden_offline_after;
        self.tasks.spawn("hidden-offline-timer", async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(delay) => {
                    debug!(user = %state.user_id, "hidden threshold reached, going offline");
                    state.set_local_status(UserStatus::Offline);
                }
            }
        });
    }

    /// Best-effort teardown on session end: persist `offline`, leave the
    /// bus channel, cancel every timer and subscription pump.
    pub async fn shutdown(&self) {
        let state = self.state.clone();
        best_effort("unload offline persist", async move {
            state
                .store
                .set(&state.user_id, PersistedStatus::Offline)
                .await
        });

        if let Err(e) = self.state.bus.unsubscribe(&self.state.handle).await {
            warn!(user = %self.state.user_id, error = %e, "bus unsubscribe failed");
        }
        self.tasks.teardown();
    }
}
