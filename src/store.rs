//! Key-value store abstraction.
//!
//! The ledger and the duplicate index only consume two Redis primitives (a
//! hash map per order, a sorted set per canonical board code), so they go
//! through the `KvStore` trait instead of talking to the client directly.
//! `RedisStore` is the production backend; the tests use the in-memory
//! backend below.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

#[derive(Debug)]
pub enum StoreError {
    /// Failed to reach the store at all. Fatal when raised at startup.
    Connection(String),
    /// A command round-trip failed after the connection was established.
    Command(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "Store connection failed: {}", msg),
            StoreError::Command(msg) => write!(f, "Store command failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Command(err.to_string())
    }
}

/// The store primitives the core consumes. Score and TTL types follow the
/// Redis command signatures.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// All fields of a hash, or None when the key does not exist.
    async fn hash_get_all(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError>;

    async fn hash_set_fields(&self, key: &str, fields: &[(String, String)])
        -> Result<(), StoreError>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// HINCRBY; returns the field value after the increment.
    async fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, StoreError>;

    /// ZADD; returns the number of elements actually added (0 means the
    /// member was already present).
    async fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<u64, StoreError>;

    /// KEYS with a glob pattern.
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// DEL; returns the number of keys removed.
    async fn delete_keys(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// EXPIRE; returns whether a TTL was set (false when the key is absent).
    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, StoreError>;
}

/// Production backend over a multiplexed Redis connection with
/// auto-reconnect.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn hash_get_all(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        // HGETALL reports a missing key as an empty map
        Ok(if fields.is_empty() { None } else { Some(fields) })
    }

    async fn hash_set_fields(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.hset_multiple::<_, _, _, ()>(key, fields).await?;
        Ok(())
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(key, field, value).await?;
        Ok(())
    }

    async fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.hincr(key, field, by).await?)
    }

    async fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.zadd(key, member, score).await?)
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(pattern).await?)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        Ok(conn.del(keys).await?)
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.expire(key, seconds).await?)
    }
}
