//! Shared dashboard state.
//!
//! One snapshot per process, overwritten by each successful ingestion cycle
//! and read by the dashboard collaborator through `SnapshotHandle::get`. The
//! notice list is append-only until the operator flushes it. Only the cycle
//! writes here (plus the admin flush/edit paths), so last-writer-wins is
//! sufficient under the single-flight rule.

use crate::ledger::OrderEntry;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, serde::Serialize)]
pub struct DuplicateNotice {
    /// Full board code of the offending record.
    pub title: String,
    pub board_duplicate: bool,
    pub pattern_duplicate: bool,
    pub detected_at: i64,
}

impl DuplicateNotice {
    pub fn board(title: &str) -> Self {
        Self {
            title: title.to_string(),
            board_duplicate: true,
            pattern_duplicate: false,
            detected_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn pattern(title: &str) -> Self {
        Self {
            title: title.to_string(),
            board_duplicate: false,
            pattern_duplicate: true,
            detected_at: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DashboardSnapshot {
    pub order_number: String,
    pub part_code: String,
    pub counter: u64,
    pub created_at: i64,
    pub updated_at: i64,
    pub notices: Vec<DuplicateNotice>,
}

/// Cloneable handle to the process-wide snapshot. Constructed once at startup
/// and passed by reference; there is no ambient global.
#[derive(Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<DashboardSnapshot>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view for the dashboard collaborator.
    pub async fn get(&self) -> DashboardSnapshot {
        self.inner.read().await.clone()
    }

    /// Overwrite the latest-order fields from a ledger entry.
    pub async fn publish_order(&self, order_number: &str, entry: &OrderEntry) {
        let mut snapshot = self.inner.write().await;
        snapshot.order_number = order_number.to_string();
        snapshot.part_code = entry.part_code.clone();
        snapshot.counter = entry.counter;
        snapshot.created_at = entry.created_at;
        snapshot.updated_at = entry.updated_at;
    }

    pub async fn push_notice(&self, notice: DuplicateNotice) {
        self.inner.write().await.notices.push(notice);
    }

    pub async fn flush_notices(&self) {
        self.inner.write().await.notices.clear();
    }
}
