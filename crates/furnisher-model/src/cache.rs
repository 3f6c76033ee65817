//! Per-path model cache with single-flight loading.
//!
//! Each key owns its own slot. Loading holds only that slot's lock, so
//! concurrent first requests for one key build the value once while other
//! keys proceed independently.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

type Slot<T> = Arc<Mutex<Option<Arc<T>>>>;

#[derive(Debug)]
pub struct ModelCache<T> {
    slots: Mutex<HashMap<PathBuf, Slot<T>>>,
}

impl<T> Default for ModelCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> ModelCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &Path) -> Slot<T> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.to_path_buf()).or_default())
    }

    /// Returns the cached value for `key`, running `load` if there is none.
    ///
    /// A failed load leaves the slot empty, so the next call retries.
    pub fn get_or_try_load<E, F>(&self, key: &Path, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let slot = self.slot(key);
        let mut value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = &*value {
            return Ok(Arc::clone(value));
        }
        let loaded = Arc::new(load()?);
        *value = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    #[must_use]
    pub fn get(&self, key: &Path) -> Option<Arc<T>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get(key)?;
        slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drops the entry for `key`; returns whether a loaded value was removed.
    pub fn invalidate(&self, key: &Path) -> bool {
        let removed = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        removed.is_some_and(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of loaded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    use super::*;

    #[test]
    fn test_loads_once_per_key() {
        let cache = ModelCache::new();
        let loads = AtomicUsize::new(0);
        let load = |v| {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(v)
        };

        assert_eq!(*cache.get_or_try_load(Path::new("a"), || load(1)).unwrap(), 1);
        assert_eq!(*cache.get_or_try_load(Path::new("a"), || load(2)).unwrap(), 1);
        assert_eq!(*cache.get_or_try_load(Path::new("b"), || load(3)).unwrap(), 3);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = ModelCache::<u32>::new();
        assert_eq!(cache.get_or_try_load(Path::new("a"), || Err("boom")), Err("boom"));
        assert!(cache.is_empty());
        assert_eq!(*cache.get_or_try_load(Path::new("a"), || Ok::<_, &str>(7)).unwrap(), 7);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = ModelCache::new();
        cache.get_or_try_load(Path::new("a"), || Ok::<_, ()>(1)).unwrap();
        cache.get_or_try_load(Path::new("b"), || Ok::<_, ()>(2)).unwrap();

        assert!(cache.invalidate(Path::new("a")));
        assert!(!cache.invalidate(Path::new("a")));
        assert!(cache.get(Path::new("a")).is_none());
        assert_eq!(cache.get(Path::new("b")).as_deref(), Some(&2));

        assert_eq!(*cache.get_or_try_load(Path::new("a"), || Ok::<_, ()>(10)).unwrap(), 10);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let cache = ModelCache::new();
        let loads = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let value = cache
                        .get_or_try_load(Path::new("shared"), || {
                            loads.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok::<_, ()>(42)
                        })
                        .unwrap();
                    assert_eq!(*value, 42);
                });
            }
        });
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
