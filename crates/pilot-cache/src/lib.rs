//! Redis cache layer (C6): key schema, cache-aside helper, and the
//! degrade-to-DB-read-on-error guarantee (spec §4.6).
//!
//! Key prefixes follow the builder-function pattern of the original
//! `internal/pkg/cache/keys.go`, narrowed to the exact three-key schema
//! SPEC_FULL.md documents (`product_data`, `price`, `ranking` — not the
//! original's larger, partially-redundant key set).

pub mod keys;

pub use keys::{price_key, product_data_key, ranking_key, user_tracked_key};

use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Default TTL for the `product_data` projection (spec §4.6: 30 min).
pub const PRODUCT_DATA_TTL: Duration = Duration::from_secs(30 * 60);
/// Latest-price/ranking projections are cheap to recompute; a shorter TTL
/// keeps them close to the DB without adding invalidation edge cases.
pub const PROJECTION_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct CacheLayer {
    conn: ConnectionManager,
}

impl CacheLayer {
    pub async fn connect(addr: &str, db: i64) -> Result<Self> {
        let url = format!("redis://{addr}/{db}");
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("failed to connect to redis")?;
        Ok(Self { conn })
    }

    /// Fetches and deserializes a JSON value. Returns `Ok(None)` on either a
    /// genuine cache miss or a Redis error — the caller falls back to a DB
    /// read either way, per the cache-aside invariant (spec §4.6 item 3).
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = match conn.get(key).await {
            Ok(v) => v,
            Err(err) => {
                warn!(%err, key, "cache get failed, degrading to db read");
                return None;
            }
        };
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    /// Serializes and stores a value with a TTL. Errors are logged and
    /// swallowed — a failed cache write never fails the caller's request.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let mut conn = self.conn.clone();
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(err) => {
                warn!(%err, key, "cache serialize failed, skipping write");
                return;
            }
        };
        if let Err(err) = conn
            .set_ex::<_, _, ()>(key, serialized, ttl.as_secs())
            .await
        {
            warn!(%err, key, "cache set failed");
        }
    }

    pub async fn del(&self, key: &str) {
        let mut conn = self.conn.clone();
        if let Err(err) = conn.del::<_, ()>(key).await {
            warn!(%err, key, "cache del failed");
        }
    }

    /// Invalidates all three per-product keys after a committed ingest
    /// (spec §4.6 invariant 1) or an untrack (invariant 2, `product_data`
    /// only — callers pass just that key in that path).
    pub async fn invalidate_product(&self, product_id: Uuid) {
        self.del(&product_data_key(product_id)).await;
        self.del(&price_key(product_id)).await;
        self.del(&ranking_key(product_id)).await;
    }

    /// Untrack invalidation (spec §4.6 invariant 2): only `product_data` and
    /// the tracking user's `user_tracked` list are stale, not the
    /// price/ranking projections — those still reflect the product's
    /// current state for any other user still tracking it.
    pub async fn invalidate_on_untrack(&self, product_id: Uuid, user_id: Uuid) {
        self.del(&product_data_key(product_id)).await;
        self.del(&user_tracked_key(user_id)).await;
    }

    /// Cache-aside read: try the cache, then fall back to `compute`, writing
    /// the result back with `ttl` before returning it. `compute`'s error, if
    /// any, propagates — only cache errors are swallowed.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get_json::<T>(key).await {
            return Ok(cached);
        }
        let value = compute().await?;
        self.set_json(key, &value, ttl).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_constants_match_spec() {
        assert_eq!(PRODUCT_DATA_TTL, Duration::from_secs(1800));
    }
}
