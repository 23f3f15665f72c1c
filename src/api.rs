//! Surface exposed to the dashboard/admin collaborator.
//!
//! The web layer lives outside this crate; what it needs from the core is a
//! read accessor for the snapshot and a handful of store mutations, each a
//! thin delegation to the ledger or the snapshot holder.

use crate::ledger::{OrderEntry, OrderLedger};
use crate::snapshot::{DashboardSnapshot, SnapshotHandle};
use crate::store::StoreError;

#[derive(Clone)]
pub struct AdminApi {
    ledger: OrderLedger,
    snapshot: SnapshotHandle,
}

impl AdminApi {
    pub fn new(ledger: OrderLedger, snapshot: SnapshotHandle) -> Self {
        Self { ledger, snapshot }
    }

    /// Latest ingestion state for rendering.
    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.get().await
    }

    /// Drop all accumulated duplicate notices.
    pub async fn flush_notices(&self) {
        self.snapshot.flush_notices().await;
    }

    /// Overwrite an order's counter and republish it to the dashboard.
    pub async fn admin_set_counter(
        &self,
        order_number: &str,
        value: u64,
    ) -> Result<OrderEntry, StoreError> {
        let entry = self.ledger.admin_set(order_number, value).await?;
        self.snapshot.publish_order(order_number, &entry).await;
        Ok(entry)
    }

    /// Schedule an order's removal through the store's expiration.
    pub async fn expire_order(
        &self,
        order_number: &str,
        seconds: i64,
    ) -> Result<bool, StoreError> {
        let expired = self.ledger.expire_after(order_number, seconds).await?;
        if expired {
            log::info!("Order {} expires in {} seconds", order_number, seconds);
        }
        Ok(expired)
    }

    /// Predefine an order before the machine has marked its first board.
    pub async fn create_order(
        &self,
        order_number: &str,
        part_code: &str,
    ) -> Result<OrderEntry, StoreError> {
        self.ledger.create(order_number, part_code).await
    }

    /// All ledger entries for the dashboard's order grid, newest first.
    pub async fn list_orders(&self) -> Result<Vec<(String, OrderEntry)>, StoreError> {
        self.ledger.list_orders().await
    }
}
