//! The engine over the file-backed host store, on real time.

use std::sync::Arc;
use std::time::Duration;

use docsync::BootOutcome;
use docsync::EntryId;
use docsync::EntryPatch;
use docsync::FileKvStore;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::common::blob;
use crate::common::start_engine;
use crate::common::stored_json;
use crate::common::sync_config;
use crate::common::KEY;

const POLL: Duration = Duration::from_millis(20);

#[tokio::test]
async fn test_document_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let kv = Arc::new(FileKvStore::new(dir.path()).unwrap());
    let engine = start_engine(kv, sync_config(50, 300), "r").await;
    let created = engine.store().create_entry();
    engine
        .store()
        .update_entry(&created, EntryPatch::default().title("Persisted"));
    engine.shutdown().await.unwrap();

    let record = std::fs::read(dir.path().join(format!("{KEY}.json"))).unwrap();
    assert_eq!(stored_json(&record)["state"]["activeRequestId"], created.as_str());

    let kv = Arc::new(FileKvStore::new(dir.path()).unwrap());
    let engine = start_engine(kv, sync_config(50, 300), "r").await;
    assert!(matches!(engine.boot_outcome(), BootOutcome::Restored { .. }));
    let title = engine.store().read(|doc| doc.entry(&created).map(|e| e.title.clone()));
    assert_eq!(title.as_deref(), Some("Persisted"));
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_external_file_edit_is_rehydrated() {
    let dir = tempfile::tempdir().unwrap();
    let kv = Arc::new(FileKvStore::new(dir.path()).unwrap());
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let watcher = kv.spawn_watcher(POLL, shutdown_rx);
    let engine = start_engine(kv, sync_config(50, 300), "f").await;
    let mut changes = engine.store().subscribe_changes();

    // let the watcher record its baseline
    sleep(POLL * 3).await;
    std::fs::write(
        dir.path().join(format!("{KEY}.json")),
        blob(&[("edited", "Edited by hand")]),
    )
    .unwrap();

    timeout(Duration::from_secs(5), changes.changed())
        .await
        .expect("rehydration within timeout")
        .unwrap();
    assert_eq!(
        engine.store().read(|doc| doc.active_id().clone()),
        EntryId::from("edited")
    );

    engine.shutdown().await.unwrap();
    shutdown_tx.send(()).unwrap();
    watcher.await.unwrap();
}

#[tokio::test]
async fn test_own_file_write_is_not_rehydrated() {
    let dir = tempfile::tempdir().unwrap();
    let kv = Arc::new(FileKvStore::new(dir.path()).unwrap());
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let watcher = kv.spawn_watcher(POLL, shutdown_rx);
    let engine = start_engine(kv, sync_config(50, 1000), "o").await;

    engine.store().create_entry();
    let revision = engine.store().revision();
    engine.flush().await.unwrap();
    // several polls, all inside the suppression window
    sleep(POLL * 10).await;

    assert_eq!(engine.store().revision(), revision);
    assert!(dir.path().join(format!("{KEY}.json")).exists());

    engine.shutdown().await.unwrap();
    shutdown_tx.send(()).unwrap();
    watcher.await.unwrap();
}
