//! Get-or-add instance cache shared by the singleton and scoped lifetimes.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::DiResult;
use crate::key::ServiceKey;
use crate::registration::AnyArc;

/// Map of per-key cells. The map lock only guards cell lookup; construction
/// runs inside the cell's own initialization, so concurrent first resolution
/// of one key builds exactly one instance while other keys proceed freely.
#[derive(Default)]
pub(crate) struct InstanceCache {
    cells: Mutex<HashMap<ServiceKey, Arc<OnceCell<AnyArc>>>>,
}

impl InstanceCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn cell(&self, key: ServiceKey) -> Arc<OnceCell<AnyArc>> {
        self.cells.lock().entry(key).or_default().clone()
    }

    /// Returns the cached value for `key`, building it with `init` if absent.
    /// A failed `init` leaves the cell empty so a later call can retry.
    pub(crate) fn get_or_try_init<F>(&self, key: ServiceKey, init: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        let cell = self.cell(key);
        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }
        cell.get_or_try_init(init).cloned()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: &ServiceKey) -> Option<AnyArc> {
        self.cells.lock().get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of built instances.
    pub(crate) fn len(&self) -> usize {
        self.cells.lock().values().filter(|cell| cell.get().is_some()).count()
    }

    pub(crate) fn clear(&self) {
        let drained: Vec<_> = self.cells.lock().drain().collect();
        // Instances drop outside the lock.
        drop(drained);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn failed_init_can_be_retried() {
        let cache = InstanceCache::new();
        let key = ServiceKey::of::<u32>().at(0);

        let first = cache.get_or_try_init(key, || Err(DiError::TypeMismatch("u32")));
        assert!(first.is_err());
        assert!(cache.get(&key).is_none());

        let second = cache.get_or_try_init(key, || Ok(Arc::new(Arc::new(7u32)) as AnyArc));
        assert!(second.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_init_runs_once() {
        let cache = Arc::new(InstanceCache::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let key = ServiceKey::of::<String>().at(0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let builds = builds.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_try_init(key, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Ok(Arc::new(Arc::new(String::from("once"))) as AnyArc)
                        })
                        .unwrap()
                })
            })
            .collect();

        let values: Vec<AnyArc> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
