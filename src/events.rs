//! In-process change feed.
//!
//! Writers publish "collection X changed"; subscribers re-fetch. A
//! notification carries no row data, so a lagging subscriber that misses
//! some still ends up consistent after its next re-fetch.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::fetch::Collection;

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub id: Option<u64>,
    pub at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
    active: Arc<AtomicUsize>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        ChangeFeed {
            sender,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, collection: Collection, kind: ChangeKind, id: Option<u64>) {
        let event = ChangeEvent {
            collection,
            kind,
            id,
            at: Utc::now(),
        };
        // Err only means nobody is listening
        if self.sender.send(event).is_ok() {
            debug!(collection = %collection, ?kind, id, "Published change");
        }
    }

    /// Subscribes to changes of one collection. Dropping the handle unsubscribes.
    pub fn subscribe(&self, collection: Collection) -> Subscription {
        self.active.fetch_add(1, Ordering::SeqCst);
        Subscription {
            collection,
            receiver: self.sender.subscribe(),
            active: self.active.clone(),
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

pub struct Subscription {
    collection: Collection,
    receiver: broadcast::Receiver<ChangeEvent>,
    active: Arc<AtomicUsize>,
}

impl Subscription {
    /// Waits for the next change to this subscription's collection.
    /// Returns `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.collection == self.collection => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(collection = %self.collection, skipped, "Subscriber lagged behind");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!(collection = %self.collection, "Subscription dropped");
    }
}
