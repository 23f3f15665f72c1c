//! Crate-level scenarios wiring the real components together over the
//! in-memory store backend.

use crate::api::AdminApi;
use crate::cycle::{CycleOutcome, IngestionCycle};
use crate::dedup::DuplicateIndex;
use crate::ledger::OrderLedger;
use crate::snapshot::SnapshotHandle;
use crate::source::TraceFileSource;
use crate::store::memory::MemoryStore;
use crate::store::KvStore;
use std::sync::Arc;
use tempfile::TempDir;

struct Rig {
    watch: TempDir,
    #[allow(dead_code)]
    processed: TempDir,
    store: Arc<MemoryStore>,
    cycle: IngestionCycle,
    api: AdminApi,
}

fn rig() -> Rig {
    let watch = TempDir::new().unwrap();
    let processed = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let ledger = OrderLedger::new(store.clone());
    let snapshot = SnapshotHandle::new();
    let cycle = IngestionCycle::new(
        TraceFileSource::new(watch.path(), processed.path(), ".txt"),
        ledger.clone(),
        DuplicateIndex::new(store.clone()),
        snapshot.clone(),
    );
    let api = AdminApi::new(ledger, snapshot);
    Rig {
        watch,
        processed,
        store,
        cycle,
        api,
    }
}

impl Rig {
    fn drop_file(&self, name: &str, content: &str) {
        std::fs::write(self.watch.path().join(name), content).unwrap();
    }
}

#[tokio::test]
async fn production_shift_scenario() {
    let r = rig();

    // Two boards of order 1234567, one of order 7654321
    r.drop_file(
        "b1.txt",
        ";AB12345678BOARDAAAA;1234567-1234567;M01\nx;y;PAT001;",
    );
    r.drop_file(
        "b2.txt",
        ";AB12345678BOARDBBBB;1234567-1234567;M01\nx;y;PAT002;",
    );
    r.drop_file(
        "b3.txt",
        ";CD98765432BOARDCCCC;7654321-7654329;M02\nx;y;PAT003;",
    );

    let mut recorded = 0;
    for _ in 0..4 {
        match r.cycle.run_cycle().await {
            CycleOutcome::Recorded { .. } => recorded += 1,
            CycleOutcome::Idle => break,
            CycleOutcome::Skipped => panic!("nothing should be skipped"),
        }
    }
    assert_eq!(recorded, 3);

    // Distinct boards and patterns: no notices yet
    assert!(r.api.snapshot().await.notices.is_empty());

    let orders = r.api.list_orders().await.unwrap();
    assert_eq!(orders.len(), 2);
    let by_key = |key: &str| {
        orders
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, e)| e.clone())
            .unwrap()
    };
    assert_eq!(by_key("1234567").counter, 2);
    assert_eq!(by_key("7654321").counter, 1);
    assert_eq!(by_key("7654321").part_code, "7654329");

    // Operator corrects a miscount, then retires the finished order
    let edited = r.api.admin_set_counter("1234567", 180).await.unwrap();
    assert_eq!(edited.counter, 180);
    assert!(edited.modified_at > 0);

    assert!(r.api.expire_order("7654321", 3600).await.unwrap());
    assert_eq!(r.store.ttl_of("7654321"), Some(3600));
}

#[tokio::test]
async fn rare_format_board_dedups_under_canonical_key() {
    let r = rig();

    // 47-char rare-format serial: month stamp right after the 00 prefix,
    // embedded 5-digit group starting with 9
    let serial = format!("002608{}91234", "A".repeat(36));
    assert_eq!(serial.len(), 47);
    let content = format!(";{};1234567-1234567;M01\nx;y;PAT009;", serial);

    r.drop_file("first.txt", &content);
    assert_eq!(
        r.cycle.run_cycle().await,
        CycleOutcome::Recorded { duplicates: 0 }
    );

    // Index key is the canonical (marker-prefixed, truncated) form
    let keys = r.store.keys_matching("VR*2608*").await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].len(), 42);

    r.drop_file("second.txt", &content);
    assert_eq!(
        r.cycle.run_cycle().await,
        CycleOutcome::Recorded { duplicates: 2 }
    );

    let notices = r.api.snapshot().await.notices;
    assert_eq!(notices.len(), 2);
    // Notices carry the full board code, not the canonical key
    assert_eq!(notices[0].title, serial);

    r.api.flush_notices().await;
    assert!(r.api.snapshot().await.notices.is_empty());
}
