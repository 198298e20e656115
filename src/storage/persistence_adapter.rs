use std::sync::Arc;

use tracing::debug;

use crate::decode_document;
use crate::encode_document;
use crate::ChangeReceiver;
use crate::DecodeContext;
use crate::Decoded;
use crate::Document;
use crate::IdGenerator;
use crate::KvStore;
use crate::Result;
use crate::WallClock;

/// Serialization boundary between the engine and the host store. Holds no state of its
/// own beyond what decoding needs to repair untrusted data.
pub struct PersistenceAdapter<S: KvStore> {
    store: Arc<S>,
    default_retention_ms: u64,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn WallClock>,
}

impl<S: KvStore> PersistenceAdapter<S> {
    pub fn new(
        store: Arc<S>,
        default_retention_ms: u64,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        Self {
            store,
            default_retention_ms,
            ids,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn encode(
        &self,
        document: &Document,
    ) -> Result<Vec<u8>> {
        encode_document(document)
    }

    /// Reads and decodes the document under `key`; `Ok(None)` when the key is absent.
    pub async fn load(
        &self,
        key: &str,
    ) -> Result<Option<Decoded>> {
        let Some(bytes) = self.store.get(key).await? else {
            debug!(key, "no persisted document");
            return Ok(None);
        };
        let ctx = DecodeContext {
            now_ms: self.clock.now_ms(),
            default_retention_ms: self.default_retention_ms,
            ids: self.ids.as_ref(),
        };
        decode_document(&bytes, &ctx).map(Some)
    }

    pub async fn write(
        &self,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        self.store.set(key, bytes).await
    }

    pub async fn remove(
        &self,
        key: &str,
    ) -> Result<()> {
        self.store.remove(key).await
    }

    pub fn subscribe(
        &self,
        key: &str,
    ) -> ChangeReceiver {
        self.store.subscribe(key)
    }
}
