//! In-process cache store backed by moka.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;

use super::{CacheKey, CacheStore, CacheUnavailable};

#[derive(Clone)]
struct Entry {
    value: Value,
    ttl: Duration,
}

struct PerEntryExpiry;

impl Expiry<String, Entry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// [`CacheStore`] backed by an in-process moka cache.
///
/// Alongside the cache it keeps a registry of live keys per entity so
/// `invalidate_entity` can drop every listing and detail entry for that
/// entity without scanning the cache. An eviction listener deregisters
/// keys that moka drops on its own (TTL expiry, capacity), so the
/// registry only ever holds currently cached keys.
#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<String, Entry>,
    keys_by_entity: Arc<Mutex<HashMap<&'static str, HashSet<String>>>>,
}

impl std::fmt::Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MokaStore {
    /// Create a store holding up to `capacity` entries.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let keys_by_entity: Arc<Mutex<HashMap<&'static str, HashSet<String>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let registry = Arc::clone(&keys_by_entity);
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(PerEntryExpiry)
            .eviction_listener(move |key, _entry, _cause| {
                if let Ok(mut registry) = registry.lock() {
                    for keys in registry.values_mut() {
                        keys.remove(key.as_str());
                    }
                }
            })
            .build();
        Self {
            cache,
            keys_by_entity,
        }
    }

    fn register(&self, key: &CacheKey) {
        if let Ok(mut registry) = self.keys_by_entity.lock() {
            registry
                .entry(key.entity())
                .or_default()
                .insert(key.storage_key());
        }
    }

    fn deregister(&self, key: &CacheKey) {
        if let Ok(mut registry) = self.keys_by_entity.lock() {
            if let Some(keys) = registry.get_mut(key.entity()) {
                keys.remove(&key.storage_key());
            }
        }
    }

    fn drain_entity(&self, entity: &'static str) -> Vec<String> {
        self.keys_by_entity
            .lock()
            .map(|mut registry| {
                registry
                    .remove(entity)
                    .map(|keys| keys.into_iter().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

impl CacheStore for MokaStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheUnavailable> {
        Ok(self
            .cache
            .get(&key.storage_key())
            .await
            .map(|entry| entry.value))
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Value,
        ttl: Duration,
    ) -> Result<(), CacheUnavailable> {
        self.register(key);
        self.cache
            .insert(key.storage_key(), Entry { value, ttl })
            .await;
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheUnavailable> {
        self.deregister(key);
        self.cache.invalidate(&key.storage_key()).await;
        Ok(())
    }

    async fn invalidate_entity(&self, entity: &'static str) -> Result<(), CacheUnavailable> {
        for storage_key in self.drain_entity(entity) {
            self.cache.invalidate(&storage_key).await;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn registered(store: &MokaStore, entity: &str) -> usize {
        store
            .keys_by_entity
            .lock()
            .unwrap()
            .get(entity)
            .map_or(0, HashSet::len)
    }

    #[tokio::test]
    async fn test_set_get_invalidate() {
        let store = MokaStore::new(10);
        let key = CacheKey::detail("products", 1);

        assert!(store.get(&key).await.unwrap().is_none());

        store.set(&key, Value::from(5), TTL).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(Value::from(5)));

        store.invalidate(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_entity_drops_all_variants() {
        let store = MokaStore::new(10);
        let detail = CacheKey::detail("products", 1);
        let listing = CacheKey::listing("products", &[("page", "1".to_string())]);
        let other = CacheKey::detail("categories", 1);

        store.set(&detail, Value::from(1), TTL).await.unwrap();
        store.set(&listing, Value::from(2), TTL).await.unwrap();
        store.set(&other, Value::from(3), TTL).await.unwrap();

        store.invalidate_entity("products").await.unwrap();

        assert!(store.get(&detail).await.unwrap().is_none());
        assert!(store.get(&listing).await.unwrap().is_none());
        assert_eq!(store.get(&other).await.unwrap(), Some(Value::from(3)));
    }

    #[tokio::test]
    async fn test_expired_entries_leave_the_registry() {
        let store = MokaStore::new(10);
        for page in 0..5 {
            let key = CacheKey::listing("products", &[("page", page.to_string())]);
            store
                .set(&key, Value::from(page), Duration::from_millis(10))
                .await
                .unwrap();
        }
        assert_eq!(registered(&store, "products"), 5);

        // Moka's timer wheel ticks at ~1.07s, so expired entries are only
        // processed once the wheel has advanced past their bucket (~2 ticks).
        tokio::time::sleep(Duration::from_millis(2500)).await;
        store.cache.run_pending_tasks().await;

        assert_eq!(registered(&store, "products"), 0);
    }

    #[tokio::test]
    async fn test_invalidation_prunes_the_registry() {
        let store = MokaStore::new(10);
        let key = CacheKey::detail("products", 1);
        store.set(&key, Value::from(1), TTL).await.unwrap();
        assert_eq!(registered(&store, "products"), 1);

        store.invalidate(&key).await.unwrap();
        assert_eq!(registered(&store, "products"), 0);
    }
}
