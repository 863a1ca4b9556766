//! In-memory port doubles for presence tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{PresenceError, Result};
use crate::ports::{BusHandle, PresenceBus, PresenceEvent, StatusStore};
use crate::types::{PersistedStatus, PresenceRecord};

/// Status store backed by a hash map, recording every write.
#[derive(Default)]
pub struct InMemoryStatusStore {
    rows: Mutex<HashMap<String, PersistedStatus>>,
    writes: Mutex<Vec<(String, PersistedStatus)>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_row(user_id: impl Into<String>, status: PersistedStatus) -> Arc<Self> {
        let store = Self::default();
        store.rows.lock().insert(user_id.into(), status);
        Arc::new(store)
    }

    /// Every `set` call in order
    pub fn writes(&self) -> Vec<(String, PersistedStatus)> {
        self.writes.lock().clone()
    }

    /// Writes recorded for one user, in order
    pub fn writes_for(&self, user_id: &str) -> Vec<PersistedStatus> {
        self.writes
            .lock()
            .iter()
            .filter(|(u, _)| u == user_id)
            .map(|(_, s)| *s)
            .collect()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn get(&self, user_id: &str) -> Result<Option<PersistedStatus>> {
        Ok(self.rows.lock().get(user_id).copied())
    }

    async fn set(&self, user_id: &str, status: PersistedStatus) -> Result<()> {
        self.rows.lock().insert(user_id.to_string(), status);
        self.writes.lock().push((user_id.to_string(), status));
        Ok(())
    }
}

/// Presence bus double: confirms subscriptions immediately, records every
/// tracked record, and lets the test emit events to all subscribers.
#[derive(Default)]
pub struct ChannelPresenceBus {
    subscribers: Mutex<HashMap<String, mpsc::Sender<PresenceEvent>>>,
    published: Mutex<Vec<PresenceRecord>>,
}

impl ChannelPresenceBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every record passed to `track`, in order
    pub fn published(&self) -> Vec<PresenceRecord> {
        self.published.lock().clone()
    }

    /// Deliver an event to every live subscriber
    pub async fn emit(&self, event: PresenceEvent) {
        let senders: Vec<_> = self.subscribers.lock().values().cloned().collect();
        for sender in senders {
            let _ = sender.send(event.clone()).await;
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[async_trait]
impl PresenceBus for ChannelPresenceBus {
    async fn subscribe(
        &self,
        channel_key: &str,
    ) -> Result<(BusHandle, mpsc::Receiver<PresenceEvent>)> {
        let (tx, rx) = mpsc::channel(64);
        tx.try_send(PresenceEvent::Subscribed)
            .map_err(|e| PresenceError::Bus(e.to_string()))?;
        self.subscribers
            .lock()
            .insert(channel_key.to_string(), tx);
        Ok((
            BusHandle {
                channel_key: channel_key.to_string(),
            },
            rx,
        ))
    }

    async fn track(&self, _handle: &BusHandle, record: PresenceRecord) -> Result<()> {
        self.published.lock().push(record);
        Ok(())
    }

    async fn unsubscribe(&self, handle: &BusHandle) -> Result<()> {
        self.subscribers.lock().remove(&handle.channel_key);
        Ok(())
    }
}
