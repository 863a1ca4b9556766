//! Test doubles for infrastructure ports, shared by downstream crates.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::feed::{ChangeEvent, ChangeFeed, FeedFilter};

/// A change feed driven by the test: every emitted delta fans out to every
/// live subscription. Server-side filters are ignored: consumers under
/// test re-check ids anyway, which is exactly what the dedup logic must
/// survive.
#[derive(Default)]
pub struct FanoutFeed<T> {
    subscribers: Mutex<Vec<mpsc::Sender<ChangeEvent<T>>>>,
}

impl<T: Clone + Send + 'static> FanoutFeed<T> {
    pub fn new() -> Self {
        FanoutFeed {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Deliver a delta to every live subscription
    pub async fn emit(&self, event: ChangeEvent<T>) {
        let senders: Vec<_> = self
            .subscribers
            .lock()
            .expect("feed lock poisoned")
            .iter()
            .cloned()
            .collect();
        for sender in senders {
            let _ = sender.send(event.clone()).await;
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("feed lock poisoned").len()
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> ChangeFeed<T> for FanoutFeed<T> {
    async fn subscribe(&self, _filter: FeedFilter) -> mpsc::Receiver<ChangeEvent<T>> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers
            .lock()
            .expect("feed lock poisoned")
            .push(tx);
        rx
    }
}
