//! Tenant-isolated read model storage.
//!
//! Read models are disposable projections of the event streams. Storage goes
//! through [`TenantStore`]; caching is an explicit decorator around a store
//! ([`CachedTenantStore`]) rather than a concern smeared through business
//! logic — mutating operations invalidate deterministic string keys, reads
//! fill the cache on miss.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use stockpile_core::TenantId;

/// Tenant-isolated key/value store abstraction for disposable read models.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Clear all read-model records for a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory tenant-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, key.clone())).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, key), value);
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((t, _k), v)| if *t == tenant_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _k), _v| *t != tenant_id);
        }
    }
}

/// String-keyed value cache with prefix invalidation.
///
/// Keys are deterministic strings derived from tenant and entity
/// identifiers; removing by prefix drops every entry of one tenant in a
/// single call.
pub trait ReadCache<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn set(&self, key: String, value: V);
    fn remove(&self, key: &str);
    fn remove_by_prefix(&self, prefix: &str);
}

impl<V, C> ReadCache<V> for Arc<C>
where
    C: ReadCache<V> + ?Sized,
{
    fn get(&self, key: &str) -> Option<V> {
        (**self).get(key)
    }

    fn set(&self, key: String, value: V) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }

    fn remove_by_prefix(&self, prefix: &str) {
        (**self).remove_by_prefix(prefix)
    }
}

/// In-memory cache for tests/dev. Unbounded; disposable by design.
#[derive(Debug)]
pub struct InMemoryReadCache<V> {
    inner: RwLock<HashMap<String, V>>,
}

impl<V> InMemoryReadCache<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Default for InMemoryReadCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ReadCache<V> for InMemoryReadCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(key).cloned()
    }

    fn set(&self, key: String, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(key, value);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(key);
        }
    }

    fn remove_by_prefix(&self, prefix: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|k, _| !k.starts_with(prefix));
        }
    }
}

/// Caching decorator around a [`TenantStore`].
///
/// `get` fills the cache on miss; `upsert` and `clear_tenant` write through
/// and invalidate. `list` bypasses the cache — enumeration stays an
/// underlying-store concern.
#[derive(Debug)]
pub struct CachedTenantStore<S, C> {
    store: S,
    cache: C,
}

impl<S, C> CachedTenantStore<S, C> {
    pub fn new(store: S, cache: C) -> Self {
        Self { store, cache }
    }

    fn entry_key<K: core::fmt::Display>(tenant_id: TenantId, key: &K) -> String {
        format!("{tenant_id}:{key}")
    }

    fn tenant_prefix(tenant_id: TenantId) -> String {
        format!("{tenant_id}:")
    }
}

impl<K, V, S, C> TenantStore<K, V> for CachedTenantStore<S, C>
where
    K: Clone + Eq + Hash + core::fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: TenantStore<K, V>,
    C: ReadCache<V>,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let cache_key = Self::entry_key(tenant_id, key);
        if let Some(hit) = self.cache.get(&cache_key) {
            return Some(hit);
        }

        let value = self.store.get(tenant_id, key)?;
        self.cache.set(cache_key, value.clone());
        Some(value)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        let cache_key = Self::entry_key(tenant_id, &key);
        self.store.upsert(tenant_id, key, value);
        self.cache.remove(&cache_key);
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        self.store.list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cache.remove_by_prefix(&Self::tenant_prefix(tenant_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Store = CachedTenantStore<Arc<InMemoryTenantStore<String, i64>>, Arc<InMemoryReadCache<i64>>>;

    fn setup() -> (Store, Arc<InMemoryTenantStore<String, i64>>, Arc<InMemoryReadCache<i64>>) {
        let inner: Arc<InMemoryTenantStore<String, i64>> = Arc::new(InMemoryTenantStore::new());
        let cache: Arc<InMemoryReadCache<i64>> = Arc::new(InMemoryReadCache::new());
        (CachedTenantStore::new(inner.clone(), cache.clone()), inner, cache)
    }

    #[test]
    fn get_fills_the_cache_on_miss() {
        let (store, inner, cache) = setup();
        let tenant = TenantId::new();
        inner.upsert(tenant, "a".to_string(), 7);

        assert_eq!(store.get(tenant, &"a".to_string()), Some(7));
        assert_eq!(cache.len(), 1);

        // Served from cache even if the underlying store moves on.
        inner.upsert(tenant, "a".to_string(), 8);
        assert_eq!(store.get(tenant, &"a".to_string()), Some(7));
    }

    #[test]
    fn upsert_writes_through_and_invalidates() {
        let (store, _inner, cache) = setup();
        let tenant = TenantId::new();

        store.upsert(tenant, "a".to_string(), 1);
        assert_eq!(store.get(tenant, &"a".to_string()), Some(1));
        assert_eq!(cache.len(), 1);

        store.upsert(tenant, "a".to_string(), 2);
        // Invalidation means the next read observes the new value.
        assert_eq!(store.get(tenant, &"a".to_string()), Some(2));
    }

    #[test]
    fn clear_tenant_drops_only_that_tenants_entries() {
        let (store, _inner, cache) = setup();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        store.upsert(tenant_a, "a".to_string(), 1);
        store.upsert(tenant_b, "b".to_string(), 2);
        store.get(tenant_a, &"a".to_string());
        store.get(tenant_b, &"b".to_string());
        assert_eq!(cache.len(), 2);

        store.clear_tenant(tenant_a);
        assert_eq!(store.get(tenant_a, &"a".to_string()), None);
        assert_eq!(store.get(tenant_b, &"b".to_string()), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_keys_are_not_cached() {
        let (store, _inner, cache) = setup();
        let tenant = TenantId::new();

        assert_eq!(store.get(tenant, &"nope".to_string()), None);
        assert!(cache.is_empty());
    }
}
