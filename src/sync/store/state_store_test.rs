use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::*;
use crate::decode_document;
use crate::CoalescerWorker;
use crate::CustomHeader;
use crate::DecodeContext;
use crate::Document;
use crate::DocumentSettings;
use crate::EntryId;
use crate::EntryPatch;
use crate::FaultReporter;
use crate::InvariantViolation;
use crate::KvStore;
use crate::ManualClock;
use crate::MemKvStore;
use crate::MutationStatus;
use crate::PersistenceAdapter;
use crate::SelfWriteGuard;
use crate::SequentialIdGenerator;
use crate::SettingsPatch;
use crate::WriteCoalescer;

const KEY: &str = "window-store";

struct TestContext {
    store: StateStore,
    kv: Arc<MemKvStore>,
    clock: Arc<ManualClock>,
    coalescer: WriteCoalescer,
    _shutdown_tx: watch::Sender<()>,
}

fn id(s: &str) -> EntryId {
    EntryId::from(s)
}

/// Store over a single-entry document `a`, with a running coalescer.
fn setup() -> TestContext {
    let kv = Arc::new(MemKvStore::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let ids = Arc::new(SequentialIdGenerator::new("e"));
    let adapter = Arc::new(PersistenceAdapter::new(kv.clone(), 0, ids.clone(), clock.clone()));
    let faults = FaultReporter::new(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let (coalescer, worker) = CoalescerWorker::new(
        Duration::from_millis(1000),
        adapter,
        Arc::new(SelfWriteGuard::new(Duration::from_millis(2000))),
        faults.clone(),
        shutdown_rx,
    );
    tokio::spawn(worker.run());

    let document = Document::with_default_entry(id("a"), 0, DocumentSettings::with_retention(0));
    let store = StateStore::new(KEY, document, coalescer.clone(), faults, clock.clone(), ids);
    TestContext {
        store,
        kv,
        clock,
        coalescer,
        _shutdown_tx: shutdown_tx,
    }
}

fn persisted(kv: &MemKvStore) -> Option<Document> {
    let bytes = kv.peek(KEY)?;
    let ids = SequentialIdGenerator::new("unused");
    let ctx = DecodeContext {
        now_ms: 0,
        default_retention_ms: 0,
        ids: &ids,
    };
    Some(decode_document(&bytes, &ctx).unwrap().document)
}

#[tokio::test(start_paused = true)]
async fn test_create_entry_is_visible_immediately_and_persisted_later() {
    let ctx = setup();

    let created = ctx.store.create_entry();

    assert_eq!(created, id("e1"));
    let doc = ctx.store.snapshot();
    assert_eq!(doc.order(), &[id("e1"), id("a")]);
    assert_eq!(doc.active_id(), &id("e1"));
    assert_eq!(doc.session().editing_title_of, Some(id("e1")));
    assert_eq!(doc.entry(&created).unwrap().updated_at(), 1_000);
    assert_eq!(ctx.store.revision(), 1);
    assert_eq!(ctx.kv.set_calls(), 0);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(persisted(&ctx.kv), Some(doc.persisted()));
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_mutations_persists_once_with_final_state() {
    let ctx = setup();

    for body in ["{", "{\"a\"", "{\"a\": 1}"] {
        ctx.store.update_active_entry(EntryPatch::default().request(body));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(ctx.kv.set_calls(), 1);
    let stored = persisted(&ctx.kv).unwrap();
    assert_eq!(stored.entry(&id("a")).unwrap().request, "{\"a\": 1}");
}

#[tokio::test(start_paused = true)]
async fn test_deleting_last_entry_is_rejected_without_write() {
    let ctx = setup();

    let status = ctx.store.delete_entry(&id("a"));
    ctx.coalescer.flush().await.unwrap();

    assert_eq!(status, MutationStatus::Rejected(InvariantViolation::LastEntry));
    assert_eq!(ctx.store.read(|doc| doc.len()), 1);
    assert_eq!(ctx.store.revision(), 0);
    assert_eq!(ctx.kv.set_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deleting_active_of_two_activates_the_other() {
    let ctx = setup();
    let b = ctx.store.create_entry();
    assert_eq!(ctx.store.read(|doc| doc.active_id().clone()), b);

    let status = ctx.store.delete_entry(&b);

    assert!(status.is_applied());
    assert_eq!(ctx.store.read(|doc| doc.active_id().clone()), id("a"));
    assert_eq!(ctx.store.read(|doc| doc.order().to_vec()), vec![id("a")]);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_unknown_entry_returns_none() {
    let ctx = setup();

    assert_eq!(ctx.store.duplicate_entry(&id("missing")), None);
    ctx.coalescer.flush().await.unwrap();

    assert_eq!(ctx.kv.set_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_keeps_active_selection() {
    let ctx = setup();
    ctx.store.update_entry(&id("a"), EntryPatch::default().title("Ping"));

    let copy = ctx.store.duplicate_entry(&id("a")).unwrap();

    ctx.store.read(|doc| {
        assert_eq!(doc.order(), &[id("a"), copy.clone()]);
        assert_eq!(doc.active_id(), &id("a"));
        assert_eq!(doc.entry(&copy).unwrap().title, "Copy of Ping");
    });
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_mutations_do_not_schedule_writes() {
    let ctx = setup();

    assert_eq!(ctx.store.move_entry(&id("a"), &id("a")), MutationStatus::Unchanged);
    assert_eq!(ctx.store.set_active(&id("a")), MutationStatus::Unchanged);
    assert_eq!(
        ctx.store.update_settings(SettingsPatch::default()),
        MutationStatus::Unchanged
    );
    ctx.coalescer.flush().await.unwrap();

    assert_eq!(ctx.kv.set_calls(), 0);
    assert_eq!(ctx.store.revision(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_updated_at_comes_from_the_store_clock() {
    let ctx = setup();
    ctx.clock.set(42_000);

    ctx.store.update_entry(&id("a"), EntryPatch::default().address("localhost:50051"));

    let entry = ctx.store.read(|doc| doc.entry(&id("a")).cloned()).unwrap();
    assert_eq!(entry.updated_at(), 42_000);
    assert_eq!(entry.address, "localhost:50051");
}

#[tokio::test(start_paused = true)]
async fn test_session_mutations_are_not_persisted() {
    let ctx = setup();
    let mut changes = ctx.store.subscribe_changes();

    let status = ctx.store.set_custom_headers(vec![CustomHeader {
        key: "x-request-id".into(),
        value: "1".into(),
    }]);
    ctx.store.set_editing_title_of(Some(id("a")));
    ctx.coalescer.flush().await.unwrap();

    assert!(status.is_applied());
    assert!(changes.has_changed().unwrap());
    assert_eq!(ctx.store.revision(), 2);
    assert_eq!(ctx.kv.set_calls(), 0);
    assert!(ctx.store.set_editing_title_of(Some(id("zz"))).is_rejected());
}

#[tokio::test(start_paused = true)]
async fn test_settings_and_proto_lists_are_persisted() {
    let ctx = setup();

    ctx.store.update_settings(SettingsPatch {
        theme: Some("dark".into()),
        ..Default::default()
    });
    ctx.store.add_proto_paths(&["/b".into(), "/a".into()]);
    ctx.store.remove_proto_paths(&["/b".into()]);
    ctx.store.add_proto_files(&["svc.proto".into()]);
    assert_eq!(
        ctx.store.remove_proto_files(&["other.proto".into()]),
        MutationStatus::Unchanged
    );
    ctx.coalescer.flush().await.unwrap();

    let stored = persisted(&ctx.kv).unwrap();
    assert_eq!(stored.settings().theme, "dark");
    assert_eq!(stored.settings().proto_paths, vec!["/a".to_string()]);
    assert_eq!(stored.settings().proto_files, vec!["svc.proto".to_string()]);
    assert_eq!(ctx.kv.set_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_replace_persisted_drops_pending_write() {
    let ctx = setup();
    ctx.store.set_custom_headers(vec![CustomHeader::default()]);
    ctx.store.update_entry(&id("a"), EntryPatch::default().title("local"));
    let before = ctx.store.revision();

    let incoming = Document::with_default_entry(id("x"), 5, DocumentSettings::default());
    ctx.store.replace_persisted(incoming.clone());
    ctx.coalescer.flush().await.unwrap();

    assert_eq!(ctx.kv.set_calls(), 0);
    let doc = ctx.store.snapshot();
    assert_eq!(doc.entries(), incoming.entries());
    assert_eq!(doc.session().custom_headers.len(), 1);
    assert_eq!(ctx.store.revision(), before + 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_persisted_removes_key() {
    let ctx = setup();
    ctx.kv.set(KEY, b"{}".to_vec()).await.unwrap();

    ctx.store.clear_persisted();
    ctx.coalescer.flush().await.unwrap();

    assert_eq!(ctx.kv.peek(KEY), None);
    assert_eq!(ctx.store.read(|doc| doc.len()), 1);
}

#[tokio::test(start_paused = true)]
async fn test_persist_current_writes_unchanged_document() {
    let ctx = setup();

    ctx.store.persist_current();
    ctx.coalescer.flush().await.unwrap();

    assert_eq!(persisted(&ctx.kv), Some(ctx.store.snapshot().persisted()));
    assert_eq!(ctx.store.revision(), 0);
}
