//! End-to-end timing scenarios against the in-memory host store, on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use docsync::EntryId;
use docsync::EntryPatch;
use docsync::KvStore;
use docsync::MemKvStore;
use docsync::MutationStatus;
use docsync::SyncConfig;
use tokio::time::sleep;

use crate::common::blob;
use crate::common::start_engine;
use crate::common::stored_json;
use crate::common::sync_config;
use crate::common::KEY;

#[tokio::test(start_paused = true)]
async fn test_rapid_body_edits_persist_once_with_latest_value() {
    let kv = Arc::new(MemKvStore::new());
    kv.set(KEY, blob(&[("seed", "Seed")])).await.unwrap();
    let engine = start_engine(kv.clone(), SyncConfig::default(), "a").await;
    let writes_before = kv.set_calls();
    let store = engine.store();

    let a1 = store.create_entry();
    assert_eq!(a1, EntryId::from("a1"));
    store.update_entry(&a1, EntryPatch::default().request("{\"first\": true}"));
    sleep(Duration::from_millis(200)).await;
    store.update_entry(&a1, EntryPatch::default().request("{\"second\": true}"));
    sleep(Duration::from_millis(1200)).await;

    assert_eq!(kv.set_calls() - writes_before, 1);
    let stored = stored_json(kv.peek(KEY).unwrap());
    assert_eq!(stored["state"]["requests"]["a1"]["request"], "{\"second\": true}");
    assert_eq!(stored["state"]["activeRequestId"], "a1");
}

#[tokio::test(start_paused = true)]
async fn test_deleting_active_of_two_entries_activates_the_other() {
    let kv = Arc::new(MemKvStore::new());
    kv.set(KEY, blob(&[("one", "One"), ("two", "Two")])).await.unwrap();
    let engine = start_engine(kv.clone(), SyncConfig::default(), "n").await;
    let store = engine.store();
    assert_eq!(store.read(|doc| doc.active_id().clone()), EntryId::from("one"));

    assert_eq!(store.delete_entry(&EntryId::from("one")), MutationStatus::Applied);
    assert_eq!(store.read(|doc| doc.active_id().clone()), EntryId::from("two"));

    // the survivor cannot be deleted
    assert!(store.delete_entry(&EntryId::from("two")).is_rejected());
    engine.shutdown().await.unwrap();

    let stored = stored_json(kv.peek(KEY).unwrap());
    assert_eq!(stored["state"]["sortOrder"], serde_json::json!(["two"]));
    assert_eq!(stored["state"]["activeRequestId"], "two");
}

#[tokio::test(start_paused = true)]
async fn test_notification_inside_suppression_window_is_ignored() {
    // the host reports our own write 500ms after it lands
    let kv = Arc::new(MemKvStore::with_notify_delay(Duration::from_millis(500)));
    let engine = start_engine(kv.clone(), SyncConfig::default(), "e").await;
    let store = engine.store();

    store.update_active_entry(EntryPatch::default().title("local"));
    sleep(Duration::from_millis(1100)).await;
    let revision = store.revision();

    // an edit made between the write and its echo must survive the echo
    store.update_active_entry(EntryPatch::default().response("pending"));
    sleep(Duration::from_millis(600)).await;

    assert_eq!(store.revision(), revision + 1);
    let active = store.read(|doc| doc.active_entry().cloned()).unwrap();
    assert_eq!(active.title, "local");
    assert_eq!(active.response, "pending");
}

#[tokio::test(start_paused = true)]
async fn test_notification_after_suppression_window_reloads() {
    let kv = Arc::new(MemKvStore::with_notify_delay(Duration::from_millis(2500)));
    let engine = start_engine(kv.clone(), SyncConfig::default(), "e").await;
    let store = engine.store();

    store.update_active_entry(EntryPatch::default().title("local"));
    sleep(Duration::from_millis(1100)).await;
    let revision = store.revision();

    sleep(Duration::from_millis(2600)).await;

    // reloaded our own write: same content, new revision
    assert_eq!(store.revision(), revision + 1);
    let active = store.read(|doc| doc.active_entry().cloned()).unwrap();
    assert_eq!(active.title, "local");
}

#[tokio::test(start_paused = true)]
async fn test_external_write_replaces_unsaved_local_edits() {
    let kv = Arc::new(MemKvStore::new());
    let engine = start_engine(kv.clone(), sync_config(1000, 2000), "e").await;
    let store = engine.store();
    let local = store.create_entry();

    sleep(Duration::from_millis(300)).await;
    kv.set(KEY, blob(&[("ext", "External")])).await.unwrap();
    sleep(Duration::from_millis(10)).await;

    assert!(store.read(|doc| doc.entry(&local).is_none()));
    // the stale pending snapshot never reaches the host store
    sleep(Duration::from_millis(3000)).await;
    let stored = stored_json(kv.peek(KEY).unwrap());
    assert_eq!(stored["state"]["activeRequestId"], "ext");
    assert_eq!(kv.set_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_external_write_keeps_live_document() {
    let kv = Arc::new(MemKvStore::new());
    let engine = start_engine(kv.clone(), SyncConfig::default(), "e").await;
    let mut faults = engine.subscribe_faults();
    let store = engine.store();

    kv.set(KEY, b"{ truncated".to_vec()).await.unwrap();
    sleep(Duration::from_millis(10)).await;

    let fault = faults.try_recv().unwrap();
    assert!(fault.malformed);
    assert_eq!(store.read(|doc| doc.len()), 1);
    assert!(store.create_entry().as_str().starts_with('e'));
}
