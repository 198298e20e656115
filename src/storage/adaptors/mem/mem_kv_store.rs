use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use crate::constants::CHANGE_CHANNEL_CAPACITY;
use crate::ChangeReceiver;
use crate::KvStore;
use crate::Result;

/// In-memory host store.
///
/// Like a file watcher, it notifies subscribers of every `set`/`remove`, including the
/// ones the engine issues itself. An optional delay postpones each notification to
/// model watcher latency.
#[derive(Debug, Default)]
pub struct MemKvStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
    watchers: DashMap<String, broadcast::Sender<()>>,
    notify_delay: Option<Duration>,
    set_calls: AtomicU64,
    remove_calls: AtomicU64,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every change notification by `delay` (runs on the tokio clock).
    pub fn with_notify_delay(delay: Duration) -> Self {
        Self {
            notify_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Current value without going through the async API.
    pub fn peek(
        &self,
        key: &str,
    ) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Number of `set` calls served so far.
    pub fn set_calls(&self) -> u64 {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> u64 {
        self.remove_calls.load(Ordering::SeqCst)
    }

    /// Emits a change notification for `key` without touching the data.
    pub fn notify(
        &self,
        key: &str,
    ) {
        let Some(sender) = self.watchers.get(key).map(|s| s.clone()) else {
            trace!(key, "no watcher registered");
            return;
        };

        match self.notify_delay {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = sender.send(());
                });
            }
            None => {
                let _ = sender.send(());
            }
        }
    }
}

#[async_trait]
impl KvStore for MemKvStore {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self.peek(key))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Result<()> {
        trace!(key, bytes = value.len(), "MemKvStore set");
        self.data.write().insert(key.to_string(), value);
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.notify(key);
        Ok(())
    }

    async fn remove(
        &self,
        key: &str,
    ) -> Result<()> {
        trace!(key, "MemKvStore remove");
        self.data.write().remove(key);
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.notify(key);
        Ok(())
    }

    fn subscribe(
        &self,
        key: &str,
    ) -> ChangeReceiver {
        self.watchers
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_CHANNEL_CAPACITY).0)
            .subscribe()
    }
}
