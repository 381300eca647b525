//! Explicit keyed factory registries.
//!
//! A [`KeyedFactoryRegistry`] maps a key (usually an enum naming a strategy)
//! to a factory producing one implementation of `T`. Registries are plain
//! values: build one at composition time and register it as a singleton
//! instead of keeping a process-wide table.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{DiError, DiResult};

type KeyedFactory<T> = Arc<dyn Fn() -> DiResult<Arc<T>> + Send + Sync>;

/// Keyed set of factories for one service type, with a per-key instance
/// cache.
///
/// # Examples
///
/// ```
/// use ferrous_host::{KeyedFactoryRegistry, ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum CacheKind { Memory, Redis }
///
/// trait Cache: Send + Sync { fn name(&self) -> &'static str; }
/// struct MemoryCache;
/// impl Cache for MemoryCache { fn name(&self) -> &'static str { "memory" } }
/// struct RedisCache;
/// impl Cache for RedisCache { fn name(&self) -> &'static str { "redis" } }
///
/// # fn main() -> DiResult<()> {
/// let mut caches = KeyedFactoryRegistry::<CacheKind, dyn Cache>::new();
/// caches
///     .register(CacheKind::Memory, || Ok(Arc::new(MemoryCache) as Arc<dyn Cache>))
///     .register(CacheKind::Redis, || Ok(Arc::new(RedisCache) as Arc<dyn Cache>));
///
/// let mut services = ServiceCollection::new();
/// services.add_instance(caches);
///
/// let provider = services.build();
/// let caches = provider.resolve_required::<KeyedFactoryRegistry<CacheKind, dyn Cache>>()?;
/// assert_eq!(caches.get_or_create(&CacheKind::Redis)?.name(), "redis");
/// # Ok(())
/// # }
/// ```
pub struct KeyedFactoryRegistry<K, T: ?Sized> {
    factories: HashMap<K, KeyedFactory<T>>,
    instances: Mutex<HashMap<K, Arc<T>>>,
}

impl<K, T> KeyedFactoryRegistry<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the factory for `key`, replacing any earlier one.
    pub fn register<F>(&mut self, key: K, factory: F) -> &mut Self
    where
        F: Fn() -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.factories.insert(key.clone(), Arc::new(factory));
        self.instances.get_mut().remove(&key);
        self
    }

    /// Builds a fresh instance for `key`.
    pub fn create(&self, key: &K) -> DiResult<Arc<T>> {
        let factory = self.factory(key)?;
        factory()
    }

    /// Returns the cached instance for `key`, building it on first use.
    pub fn get_or_create(&self, key: &K) -> DiResult<Arc<T>> {
        if let Some(existing) = self.instances.lock().get(key) {
            return Ok(existing.clone());
        }
        let factory = self.factory(key)?;
        let built = factory()?;
        trace!(registry = std::any::type_name::<T>(), key = ?key, "keyed instance built");
        // Another caller may have won the race; keep the first.
        let mut instances = self.instances.lock();
        Ok(instances.entry(key.clone()).or_insert(built).clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.factories.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.factories.keys()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn factory(&self, key: &K) -> DiResult<KeyedFactory<T>> {
        self.factories
            .get(key)
            .cloned()
            .ok_or_else(|| DiError::UnknownKey {
                registry: std::any::type_name::<T>(),
                key: format!("{:?}", key),
            })
    }
}

impl<K, T> Default for KeyedFactoryRegistry<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Format {
        Csv,
        Json,
    }

    trait Exporter: Send + Sync {
        fn extension(&self) -> &'static str;
    }

    struct Csv;
    impl Exporter for Csv {
        fn extension(&self) -> &'static str {
            "csv"
        }
    }

    #[test]
    fn unknown_key_is_an_error() {
        let registry = KeyedFactoryRegistry::<Format, dyn Exporter>::new();
        match registry.create(&Format::Json) {
            Err(DiError::UnknownKey { key, .. }) => assert_eq!(key, "Json"),
            other => panic!("expected unknown key, got ok={}", other.is_ok()),
        }
    }

    #[test]
    fn create_builds_fresh_and_get_or_create_caches() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut registry = KeyedFactoryRegistry::<Format, dyn Exporter>::new();
        registry.register(Format::Csv, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Csv) as Arc<dyn Exporter>)
        });

        let a = registry.create(&Format::Csv).unwrap();
        let b = registry.create(&Format::Csv).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        let c = registry.get_or_create(&Format::Csv).unwrap();
        let d = registry.get_or_create(&Format::Csv).unwrap();
        assert!(Arc::ptr_eq(&c, &d));
        assert_eq!(c.extension(), "csv");
        assert_eq!(built.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn reports_registered_keys() {
        let mut registry = KeyedFactoryRegistry::<Format, dyn Exporter>::new();
        assert!(registry.is_empty());
        registry.register(Format::Csv, || Ok(Arc::new(Csv) as Arc<dyn Exporter>));
        assert!(registry.contains(&Format::Csv));
        assert!(!registry.contains(&Format::Json));
        assert_eq!(registry.keys().copied().collect::<Vec<_>>(), vec![Format::Csv]);
    }
}
