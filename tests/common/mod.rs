use std::sync::Arc;

use docsync::EngineBuilder;
use docsync::KvStore;
use docsync::ManualClock;
use docsync::SequentialIdGenerator;
use docsync::SyncConfig;
use docsync::SyncEngine;
use serde_json::json;

pub const KEY: &str = "window-store";

/// 2024-01-01T00:00:00Z
pub const NOW_MS: u64 = 1_704_067_200_000;

pub fn sync_config(
    debounce_ms: u64,
    suppression_ms: u64,
) -> SyncConfig {
    SyncConfig {
        debounce_ms,
        suppression_ms,
        ..Default::default()
    }
}

/// Engine with a fixed wall clock and ids `<prefix>1`, `<prefix>2`, ...
pub async fn start_engine<S: KvStore>(
    kv: Arc<S>,
    config: SyncConfig,
    id_prefix: &str,
) -> SyncEngine<S> {
    EngineBuilder::new(kv, config)
        .with_clock(Arc::new(ManualClock::new(NOW_MS)))
        .with_id_generator(Arc::new(SequentialIdGenerator::new(id_prefix)))
        .build()
        .await
        .expect("engine starts")
}

/// Persisted envelope with one entry per `(id, title)`, all updated at `NOW_MS`; the
/// first one is active and pruning is disabled.
pub fn blob(entries: &[(&str, &str)]) -> Vec<u8> {
    let requests: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(id, title)| {
            (
                id.to_string(),
                json!({ "id": id, "title": title, "updatedAt": NOW_MS }),
            )
        })
        .collect();
    let order: Vec<&str> = entries.iter().map(|(id, _)| *id).collect();
    let value = json!({
        "state": {
            "requests": requests,
            "sortOrder": order,
            "activeRequestId": order[0],
            "deleteRequestAfterMs": 0
        },
        "version": 0
    });
    serde_json::to_vec(&value).expect("fixture encodes")
}

pub fn stored_json<S: AsRef<[u8]>>(bytes: S) -> serde_json::Value {
    serde_json::from_slice(bytes.as_ref()).expect("stored document is JSON")
}
