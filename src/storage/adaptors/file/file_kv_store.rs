use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::constants::CHANGE_CHANNEL_CAPACITY;
use crate::constants::RECORD_FILE_EXTENSION;
use crate::ChangeReceiver;
use crate::KvStore;
use crate::PersistenceError;
use crate::Result;

const TEMP_FILE_SUFFIX: &str = "tmp";

/// (modified, len) of a record file; `None` when the file does not exist
type Fingerprint = Option<(SystemTime, u64)>;

/// File-backed host store: one `<data_dir>/<key>.json` file per key.
///
/// Writes go to a temporary file that is renamed over the record, so readers never see a
/// half-written record from this process. Change notifications come from a polling
/// watcher started with [`FileKvStore::spawn_watcher`]; it also reports this store's own
/// writes, as a host file watcher would.
#[derive(Debug)]
pub struct FileKvStore {
    data_dir: PathBuf,
    watchers: DashMap<String, broadcast::Sender<()>>,
}

impl FileKvStore {
    /// Creates the data directory if needed.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|source| PersistenceError::PathError {
            path: data_dir.clone(),
            source,
        })?;
        info!("FileKvStore opened at {:?}", data_dir);

        Ok(Self {
            data_dir,
            watchers: DashMap::new(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Maps a key onto its record file. Keys must be plain file stems.
    pub fn record_path(
        &self,
        key: &str,
    ) -> Result<PathBuf> {
        let invalid = key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\', '\0'])
            || key.contains("..");
        if invalid {
            return Err(PersistenceError::InvalidKey(key.to_string()).into());
        }
        Ok(self.data_dir.join(format!("{key}.{RECORD_FILE_EXTENSION}")))
    }

    /// Polls every subscribed key each `poll_interval` and notifies its subscribers when
    /// the record's modification time or length changes (including creation and removal).
    pub fn spawn_watcher(
        self: &Arc<Self>,
        poll_interval: Duration,
        mut shutdown_signal: watch::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut last_seen: HashMap<String, Fingerprint> = HashMap::new();
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_signal.changed() => {
                        debug!("FileKvStore watcher stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        store.poll_once(&mut last_seen).await;
                    }
                }
            }
        })
    }

    async fn poll_once(
        &self,
        last_seen: &mut HashMap<String, Fingerprint>,
    ) {
        let keys: Vec<String> = self.watchers.iter().map(|w| w.key().clone()).collect();
        for key in keys {
            let Ok(path) = self.record_path(&key) else {
                continue;
            };
            let current = fingerprint(&path).await;
            match last_seen.insert(key.clone(), current) {
                // First observation is the baseline.
                None => trace!(key, "watcher baseline recorded"),
                Some(previous) if previous != current => {
                    debug!(key, "record changed on disk");
                    if let Some(sender) = self.watchers.get(&key) {
                        let _ = sender.send(());
                    }
                }
                Some(_) => {}
            }
        }
    }
}

async fn fingerprint(path: &Path) -> Fingerprint {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Some((meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), meta.len())),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!("stat {:?} failed: {:?}", path, e);
            }
            None
        }
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<Vec<u8>>> {
        let path = self.record_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::PathError { path, source }.into()),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Result<()> {
        let path = self.record_path(key)?;
        let tmp_path = path.with_extension(format!("{RECORD_FILE_EXTENSION}.{TEMP_FILE_SUFFIX}"));
        trace!(key, bytes = value.len(), "FileKvStore set");

        tokio::fs::write(&tmp_path, &value)
            .await
            .map_err(|source| PersistenceError::PathError {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| PersistenceError::PathError { path, source })?;
        Ok(())
    }

    async fn remove(
        &self,
        key: &str,
    ) -> Result<()> {
        let path = self.record_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::PathError { path, source }.into()),
        }
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
