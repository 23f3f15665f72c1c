//! Duplicate detection over the store's sorted-set primitive.
//!
//! One sorted set per canonical board code; members are full board codes or
//! pattern codes, scored by the numeric part code. ZADD returning 0 added
//! elements means the member was already there, which is the whole duplicate
//! check. The machine serial embeds a `yymm` stamp, so keys are implicitly
//! tagged by the calendar month they were created in and can be swept in bulk
//! by pattern once they age out of the rolling window.

use crate::parser::CANONICAL_MARKER;
use crate::store::{KvStore, StoreError};
use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct DuplicateIndex {
    store: Arc<dyn KvStore>,
}

impl DuplicateIndex {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Record `value` under the board's index key; true when it was already
    /// a member (a duplicate board or pattern).
    pub async fn check_and_record(
        &self,
        canonical_board_code: &str,
        part_code: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        let score = part_code.parse::<f64>().unwrap_or(0.0);
        let added = self
            .store
            .zset_add(canonical_board_code, score, value)
            .await?;
        Ok(added == 0)
    }

    /// Delete every index key whose embedded `yymm` stamp is `months_ago`
    /// calendar months before now. Run once at process start; the index is
    /// append-only and month-tagged, so one sweep per process lifetime keeps
    /// growth bounded.
    pub async fn sweep_expired(&self, months_ago: u32) -> Result<u64, StoreError> {
        let tag = month_tag(Utc::now(), months_ago);
        let pattern = format!("{}*{}*", CANONICAL_MARKER, tag);

        let keys = self.store.keys_matching(&pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        log::info!(
            "Sweeping {} index keys stamped {} ({} months old)",
            keys.len(),
            tag,
            months_ago
        );
        self.store.delete_keys(&keys).await
    }
}

/// Two-digit year + two-digit month, `months_ago` calendar months before
/// `now`, with year borrow across January.
fn month_tag(now: DateTime<Utc>, months_ago: u32) -> String {
    let total = now.year() * 12 + now.month() as i32 - 1 - months_ago as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) + 1;
    format!("{:02}{:02}", year.rem_euclid(100), month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;

    fn index() -> (Arc<MemoryStore>, DuplicateIndex) {
        let store = Arc::new(MemoryStore::new());
        let index = DuplicateIndex::new(store.clone());
        (store, index)
    }

    #[tokio::test]
    async fn second_identical_record_is_a_duplicate() {
        let (_store, index) = index();
        let key = "VR0A2508SERIAL00";

        assert!(!index.check_and_record(key, "1234567", "FULLCODE").await.unwrap());
        assert!(index.check_and_record(key, "1234567", "FULLCODE").await.unwrap());

        // Distinct value under the same key is not a duplicate
        assert!(!index.check_and_record(key, "1234567", "PAT001").await.unwrap());
    }

    #[test]
    fn month_tag_simple_and_year_borrow() {
        let aug = Utc.with_ymd_and_hms(2026, 8, 15, 12, 0, 0).unwrap();
        assert_eq!(month_tag(aug, 0), "2608");
        assert_eq!(month_tag(aug, 2), "2606");

        let jan = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(month_tag(jan, 1), "2512");
        assert_eq!(month_tag(jan, 2), "2511");
    }

    #[tokio::test]
    async fn sweep_deletes_only_the_target_month() {
        let (store, index) = index();
        let current = month_tag(Utc::now(), 0);
        let previous = month_tag(Utc::now(), 1);
        let stale = month_tag(Utc::now(), 2);

        let current_key = format!("VR0A{}AAAA0000", current);
        let previous_key = format!("VR0A{}BBBB0000", previous);
        let stale_key = format!("VR0A{}CCCC0000", stale);
        for key in [&current_key, &previous_key, &stale_key] {
            store.seed_zset_key(key);
        }

        let removed = index.sweep_expired(2).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.zset_key_count(), 2);
        assert_eq!(store.zset_member_count(&stale_key), 0);
        assert_eq!(
            store
                .keys_matching(&format!("VR*{}*", current))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn sweep_with_no_matching_keys_is_quiet() {
        let (_store, index) = index();
        assert_eq!(index.sweep_expired(2).await.unwrap(), 0);
    }
}
