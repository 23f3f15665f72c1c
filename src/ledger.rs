//! Per-order board counter over the store's hash primitive.
//!
//! One hash per manufacturing order number, fields `counter`, `smacode`,
//! `createdAt`, `updatedAt`, `modifiedAt` (unix milliseconds; `modifiedAt` is
//! 0 until an operator edits the counter by hand).

use crate::store::{KvStore, StoreError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

const FIELD_COUNTER: &str = "counter";
const FIELD_PART_CODE: &str = "smacode";
const FIELD_CREATED_AT: &str = "createdAt";
const FIELD_UPDATED_AT: &str = "updatedAt";
const FIELD_MODIFIED_AT: &str = "modifiedAt";

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OrderEntry {
    pub counter: u64,
    pub part_code: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub modified_at: i64,
}

impl OrderEntry {
    fn from_fields(fields: &HashMap<String, String>) -> Self {
        let num = |name: &str| {
            fields
                .get(name)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0)
        };
        Self {
            counter: num(FIELD_COUNTER).max(0) as u64,
            part_code: fields.get(FIELD_PART_CODE).cloned().unwrap_or_default(),
            created_at: num(FIELD_CREATED_AT),
            updated_at: num(FIELD_UPDATED_AT),
            modified_at: num(FIELD_MODIFIED_AT),
        }
    }
}

#[derive(Clone)]
pub struct OrderLedger {
    store: Arc<dyn KvStore>,
}

impl OrderLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, order_number: &str) -> Result<Option<OrderEntry>, StoreError> {
        let fields = self.store.hash_get_all(order_number).await?;
        Ok(fields.as_ref().map(OrderEntry::from_fields))
    }

    /// Create a fresh entry with counter 1. Existence is the caller's job to
    /// check; under the single-flight cycle rule read-then-create is safe.
    pub async fn create(
        &self,
        order_number: &str,
        part_code: &str,
    ) -> Result<OrderEntry, StoreError> {
        let now = Utc::now().timestamp_millis();
        self.store
            .hash_set_fields(
                order_number,
                &[
                    (FIELD_COUNTER.to_string(), "1".to_string()),
                    (FIELD_PART_CODE.to_string(), part_code.to_string()),
                    (FIELD_CREATED_AT.to_string(), now.to_string()),
                    (FIELD_UPDATED_AT.to_string(), now.to_string()),
                    (FIELD_MODIFIED_AT.to_string(), "0".to_string()),
                ],
            )
            .await?;
        self.read_back(order_number).await
    }

    /// Add `amount` boards to the order and refresh `updatedAt`.
    pub async fn increment(
        &self,
        order_number: &str,
        amount: i64,
    ) -> Result<OrderEntry, StoreError> {
        let now = Utc::now().timestamp_millis();
        self.store
            .hash_set(order_number, FIELD_UPDATED_AT, &now.to_string())
            .await?;
        self.store
            .hash_increment(order_number, FIELD_COUNTER, amount)
            .await?;
        self.read_back(order_number).await
    }

    /// Operator override of the counter; refreshes `modifiedAt` only.
    pub async fn admin_set(
        &self,
        order_number: &str,
        counter_value: u64,
    ) -> Result<OrderEntry, StoreError> {
        let now = Utc::now().timestamp_millis();
        self.store
            .hash_set_fields(
                order_number,
                &[
                    (FIELD_MODIFIED_AT.to_string(), now.to_string()),
                    (FIELD_COUNTER.to_string(), counter_value.to_string()),
                ],
            )
            .await?;
        self.read_back(order_number).await
    }

    /// Set a TTL on the entry; returns false (no-op) when it does not exist.
    pub async fn expire_after(
        &self,
        order_number: &str,
        seconds: i64,
    ) -> Result<bool, StoreError> {
        if self.get(order_number).await?.is_none() {
            return Ok(false);
        }
        self.store.expire(order_number, seconds).await
    }

    /// All ledger entries, newest order number first. Order keys are purely
    /// numeric, which separates them from the marker-prefixed index keys.
    pub async fn list_orders(&self) -> Result<Vec<(String, OrderEntry)>, StoreError> {
        let mut keys = self.store.keys_matching("[0-9]*").await?;
        keys.sort_by(|a, b| {
            let a = a.parse::<u64>().unwrap_or(0);
            let b = b.parse::<u64>().unwrap_or(0);
            b.cmp(&a)
        });

        let mut orders = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.get(&key).await? {
                orders.push((key, entry));
            }
        }
        Ok(orders)
    }

    async fn read_back(&self, order_number: &str) -> Result<OrderEntry, StoreError> {
        match self.get(order_number).await? {
            Some(entry) => Ok(entry),
            None => Err(StoreError::Command(format!(
                "hash entry vanished after write: {}",
                order_number
            ))),
        }
    }
}
