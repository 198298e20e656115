//! Structural invariants hold after every operation of any mutation sequence.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use docsync::CoalescerWorker;
use docsync::Document;
use docsync::DocumentSettings;
use docsync::EntryId;
use docsync::EntryPatch;
use docsync::FaultReporter;
use docsync::ManualClock;
use docsync::MemKvStore;
use docsync::MutationStatus;
use docsync::PersistenceAdapter;
use docsync::SelfWriteGuard;
use docsync::SequentialIdGenerator;
use docsync::StateStore;
use proptest::prelude::*;
use tokio::sync::watch;

#[derive(Debug, Clone)]
enum Op {
    Create,
    Duplicate(usize),
    Delete(usize),
    Move(usize, usize),
    SetActive(usize),
    Update(usize, String),
    UpdateActive(String),
    DeleteUnknown,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        1 => any::<usize>().prop_map(Op::Duplicate),
        3 => any::<usize>().prop_map(Op::Delete),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Move(a, b)),
        2 => any::<usize>().prop_map(Op::SetActive),
        1 => (any::<usize>(), "[a-z]{0,8}").prop_map(|(i, s)| Op::Update(i, s)),
        1 => "[a-z]{0,8}".prop_map(Op::UpdateActive),
        1 => Just(Op::DeleteUnknown),
    ]
}

/// A store whose coalescer worker is never run; scheduled writes just queue up.
fn store() -> (StateStore, CoalescerWorker<MemKvStore>) {
    let ids = Arc::new(SequentialIdGenerator::new("p"));
    let clock = Arc::new(ManualClock::new(1));
    let adapter = Arc::new(PersistenceAdapter::new(
        Arc::new(MemKvStore::new()),
        0,
        ids.clone(),
        clock.clone(),
    ));
    let faults = FaultReporter::new(1);
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let (coalescer, worker) = CoalescerWorker::new(
        Duration::from_millis(1000),
        adapter,
        Arc::new(SelfWriteGuard::new(Duration::from_millis(2000))),
        faults.clone(),
        shutdown_rx,
    );
    let document = Document::with_default_entry(EntryId::from("p0"), 0, DocumentSettings::default());
    (
        StateStore::new("window-store", document, coalescer, faults, clock, ids),
        worker,
    )
}

fn pick(
    doc: &Document,
    i: usize,
) -> EntryId {
    doc.order()[i % doc.order().len()].clone()
}

fn assert_structurally_valid(doc: &Document) {
    doc.check_invariants().unwrap();
    let keys: BTreeSet<&EntryId> = doc.entries().keys().collect();
    let order: BTreeSet<&EntryId> = doc.order().iter().collect();
    assert_eq!(keys, order);
    assert!(!doc.is_empty());
    assert!(doc.entry(doc.active_id()).is_some());
}

proptest! {
    #[test]
    fn invariants_hold_for_any_mutation_sequence(ops in prop::collection::vec(op_strategy(), 1..60)) {
        // the worker holds the command channel open for the whole run
        let (store, _worker) = store();

        for op in ops {
            let before = store.snapshot();
            match op {
                Op::Create => {
                    let id = store.create_entry();
                    prop_assert_eq!(store.read(|d| d.order()[0].clone()), id.clone());
                    prop_assert_eq!(store.read(|d| d.active_id().clone()), id);
                }
                Op::Duplicate(i) => {
                    let source = pick(&before, i);
                    prop_assert!(store.duplicate_entry(&source).is_some());
                    prop_assert_eq!(store.read(|d| d.active_id().clone()), before.active_id().clone());
                }
                Op::Delete(i) => {
                    let target = pick(&before, i);
                    let status = store.delete_entry(&target);
                    if before.len() == 1 {
                        prop_assert!(status.is_rejected());
                        prop_assert_eq!(store.snapshot(), before.clone());
                    } else {
                        prop_assert_eq!(status, MutationStatus::Applied);
                        if before.active_id() == &target {
                            let index = before.order().iter().position(|id| id == &target).unwrap();
                            let expected = if index + 1 < before.order().len() {
                                before.order()[index + 1].clone()
                            } else {
                                before.order()[index - 1].clone()
                            };
                            prop_assert_eq!(store.read(|d| d.active_id().clone()), expected);
                        }
                    }
                }
                Op::Move(a, b) => {
                    let from = pick(&before, a);
                    let to = pick(&before, b);
                    prop_assert!(!store.move_entry(&from, &to).is_rejected());
                }
                Op::SetActive(i) => {
                    let target = pick(&before, i);
                    prop_assert!(!store.set_active(&target).is_rejected());
                    prop_assert_eq!(store.read(|d| d.active_id().clone()), target);
                }
                Op::Update(i, text) => {
                    let target = pick(&before, i);
                    prop_assert!(store.update_entry(&target, EntryPatch::default().request(text)).is_applied());
                }
                Op::UpdateActive(text) => {
                    prop_assert!(store.update_active_entry(EntryPatch::default().title(text)).is_applied());
                }
                Op::DeleteUnknown => {
                    prop_assert!(store.delete_entry(&EntryId::from("missing")).is_rejected());
                    prop_assert_eq!(store.snapshot(), before.clone());
                }
            }
            store.read(assert_structurally_valid);
        }
    }
}
