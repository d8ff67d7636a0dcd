//! Read-through caching for catalog queries.
//!
//! Values are cached as JSON so one store handles every payload shape.
//! The cache is strictly an optimization: any store failure is logged
//! and the caller falls through to the database, so a cache outage
//! degrades latency, never correctness.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::CacheConfig;

pub mod moka_store;

pub use moka_store::MokaStore;

/// The cache store could not serve the request.
#[derive(Debug, thiserror::Error)]
#[error("cache unavailable: {0}")]
pub struct CacheUnavailable(pub String);

/// What a key addresses, which also picks its TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyVariant {
    /// A single entity by id.
    Detail(i32),
    /// A listing query, identified by its canonical parameter string.
    Listing(String),
}

/// A cache key scoped to an entity kind.
///
/// Listing keys embed every query parameter in a fixed order so that two
/// requests for the same page share an entry and different filters never
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    entity: &'static str,
    variant: KeyVariant,
}

impl CacheKey {
    /// Key for a single entity.
    #[must_use]
    pub const fn detail(entity: &'static str, id: i32) -> Self {
        Self {
            entity,
            variant: KeyVariant::Detail(id),
        }
    }

    /// Key for a listing query. `params` must already be in canonical
    /// order; the producer of the parameter list owns that ordering.
    #[must_use]
    pub fn listing(entity: &'static str, params: &[(&'static str, String)]) -> Self {
        let canonical = params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        Self {
            entity,
            variant: KeyVariant::Listing(canonical),
        }
    }

    /// The entity kind this key belongs to.
    #[must_use]
    pub const fn entity(&self) -> &'static str {
        self.entity
    }

    /// Flat string form used by the backing store.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match &self.variant {
            KeyVariant::Detail(id) => format!("{}:detail:{id}", self.entity),
            KeyVariant::Listing(params) => format!("{}:listing:{params}", self.entity),
        }
    }

    const fn is_listing(&self) -> bool {
        matches!(self.variant, KeyVariant::Listing(_))
    }
}

/// Backing store for [`ReadThroughCache`].
pub trait CacheStore: Send + Sync {
    /// Look up a cached value.
    fn get(
        &self,
        key: &CacheKey,
    ) -> impl Future<Output = Result<Option<Value>, CacheUnavailable>> + Send;

    /// Store a value with a per-entry TTL.
    fn set(
        &self,
        key: &CacheKey,
        value: Value,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheUnavailable>> + Send;

    /// Drop a single entry.
    fn invalidate(&self, key: &CacheKey) -> impl Future<Output = Result<(), CacheUnavailable>> + Send;

    /// Drop every entry registered under `entity`, details and listings alike.
    fn invalidate_entity(
        &self,
        entity: &'static str,
    ) -> impl Future<Output = Result<(), CacheUnavailable>> + Send;
}

/// Read-through cache over a [`CacheStore`].
///
/// Listing entries live longer than detail entries; both TTLs come from
/// [`CacheConfig`].
#[derive(Debug, Clone)]
pub struct ReadThroughCache<S> {
    store: S,
    listing_ttl: Duration,
    detail_ttl: Duration,
}

impl<S: CacheStore> ReadThroughCache<S> {
    /// Wrap a store with the configured TTLs.
    pub fn new(store: S, config: &CacheConfig) -> Self {
        Self {
            store,
            listing_ttl: config.listing_ttl,
            detail_ttl: config.detail_ttl,
        }
    }

    fn ttl_for(&self, key: &CacheKey) -> Duration {
        if key.is_listing() {
            self.listing_ttl
        } else {
            self.detail_ttl
        }
    }

    /// Serve `key` from the cache, calling `load` on a miss and caching
    /// the result.
    ///
    /// Store failures and undeserializable entries are treated as misses.
    ///
    /// # Errors
    ///
    /// Only `load` errors propagate; the cache itself never fails a read.
    pub async fn get_or_load<T, F, Fut, E>(&self, key: &CacheKey, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.store.get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(cached) => return Ok(cached),
                Err(e) => {
                    tracing::warn!(key = %key.storage_key(), error = %e, "dropping undeserializable cache entry");
                    if let Err(e) = self.store.invalidate(key).await {
                        tracing::warn!(key = %key.storage_key(), error = %e, "cache invalidate failed");
                    }
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key.storage_key(), error = %e, "cache read failed, falling through");
            }
        }

        let loaded = load().await?;

        match serde_json::to_value(&loaded) {
            Ok(value) => {
                if let Err(e) = self.store.set(key, value, self.ttl_for(key)).await {
                    tracing::warn!(key = %key.storage_key(), error = %e, "cache write failed");
                }
            }
            Err(e) => {
                tracing::warn!(key = %key.storage_key(), error = %e, "value not cacheable");
            }
        }

        Ok(loaded)
    }

    /// Drop everything cached for `entity`. Called after any write to
    /// that entity so stale listings never outlive a change.
    pub async fn invalidate_entity(&self, entity: &'static str) {
        if let Err(e) = self.store.invalidate_entity(entity).await {
            tracing::warn!(entity, error = %e, "cache invalidation failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn test_config() -> CacheConfig {
        CacheConfig {
            capacity: 100,
            listing_ttl: Duration::from_secs(3600),
            detail_ttl: Duration::from_secs(300),
        }
    }

    /// Store that fails every operation, simulating an outage.
    struct DownStore;

    impl CacheStore for DownStore {
        async fn get(&self, _key: &CacheKey) -> Result<Option<Value>, CacheUnavailable> {
            Err(CacheUnavailable("down".to_string()))
        }

        async fn set(
            &self,
            _key: &CacheKey,
            _value: Value,
            _ttl: Duration,
        ) -> Result<(), CacheUnavailable> {
            Err(CacheUnavailable("down".to_string()))
        }

        async fn invalidate(&self, _key: &CacheKey) -> Result<(), CacheUnavailable> {
            Err(CacheUnavailable("down".to_string()))
        }

        async fn invalidate_entity(&self, _entity: &'static str) -> Result<(), CacheUnavailable> {
            Err(CacheUnavailable("down".to_string()))
        }
    }

    #[test]
    fn test_storage_keys() {
        let detail = CacheKey::detail("products", 42);
        assert_eq!(detail.storage_key(), "products:detail:42");

        let listing = CacheKey::listing(
            "products",
            &[("page", "1".to_string()), ("search", "mug".to_string())],
        );
        assert_eq!(listing.storage_key(), "products:listing:page=1&search=mug");
    }

    #[test]
    fn test_same_params_same_key() {
        let params = [("page", "2".to_string()), ("sort", "price".to_string())];
        let a = CacheKey::listing("products", &params);
        let b = CacheKey::listing("products", &params);
        assert_eq!(a, b);

        let c = CacheKey::listing("products", &[("page", "3".to_string())]);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_read_through_populates() {
        let cache = ReadThroughCache::new(MokaStore::new(100), &test_config());
        let key = CacheKey::detail("products", 1);
        let loads = AtomicU32::new(0);

        for _ in 0..3 {
            let value: i32 = cache
                .get_or_load(&key, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_entity_forces_reload() {
        let cache = ReadThroughCache::new(MokaStore::new(100), &test_config());
        let key = CacheKey::listing("products", &[("page", "1".to_string())]);
        let loads = AtomicU32::new(0);

        let load = || async {
            let n = loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::convert::Infallible>(n)
        };
        assert_eq!(cache.get_or_load(&key, load).await.unwrap(), 0);
        assert_eq!(cache.get_or_load(&key, load).await.unwrap(), 0);

        cache.invalidate_entity("products").await;
        assert_eq!(cache.get_or_load(&key, load).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalidation_is_scoped_to_entity() {
        let cache = ReadThroughCache::new(MokaStore::new(100), &test_config());
        let products = CacheKey::detail("products", 1);
        let categories = CacheKey::detail("categories", 1);
        let loads = AtomicU32::new(0);

        let load = || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::convert::Infallible>("x".to_string())
        };
        cache.get_or_load(&products, load).await.unwrap();
        cache.get_or_load(&categories, load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        cache.invalidate_entity("products").await;
        cache.get_or_load(&categories, load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        cache.get_or_load(&products, load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_down_store_falls_through() {
        let cache = ReadThroughCache::new(DownStore, &test_config());
        let key = CacheKey::detail("products", 1);
        let loads = AtomicU32::new(0);

        for _ in 0..2 {
            let value: i32 = cache
                .get_or_load(&key, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(9)
                })
                .await
                .unwrap();
            assert_eq!(value, 9);
        }

        // Every read hits the loader while the store is down.
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_loader_error_propagates() {
        let cache = ReadThroughCache::new(MokaStore::new(100), &test_config());
        let key = CacheKey::detail("products", 1);

        let result: Result<i32, &str> = cache.get_or_load(&key, || async { Err("boom") }).await;
        assert_eq!(result.unwrap_err(), "boom");
    }
}
