//! Keyed get-or-insert stores shared by the contract and table-metadata caches.
//!
//! Each key owns a slot that is created atomically through the map's entry API and
//! initialised at most once. Hits read an initialised slot without taking any lock
//! besides the map shard's read guard. A miss only waits on other callers for the
//! same key. A derivation that fails leaves the slot empty, so the next caller
//! retries from scratch.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use dashmap::DashMap;
use tokio::sync::OnceCell;

struct Slot<V> {
    value: OnceLock<Arc<V>>,
    init: Mutex<()>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }
}

/// Synchronous single-flight store.
pub struct KeyedStore<K, V> {
    slots: DashMap<K, Arc<Slot<V>>>,
    derivations: AtomicUsize,
}

impl<K, V> Default for KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
            derivations: AtomicUsize::new(0),
        }
    }
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value for `key`, running `derive` if no caller has produced it yet.
    ///
    /// # Errors
    /// Returns whatever `derive` returns; the failure is not remembered.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        derive: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(value) = self.slots.get(key).and_then(|s| s.value.get().cloned()) {
            return Ok(value);
        }
        let slot = Arc::clone(self.slots.entry(key.clone()).or_default().value());

        let _init = slot.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.value.get() {
            return Ok(Arc::clone(value));
        }
        self.derivations.fetch_add(1, Ordering::Relaxed);
        match derive() {
            Ok(value) => Ok(Arc::clone(slot.value.get_or_init(|| Arc::new(value)))),
            Err(err) => {
                self.slots
                    .remove_if(key, |_, s| Arc::ptr_eq(s, &slot) && s.value.get().is_none());
                Err(err)
            }
        }
    }

    /// The cached value, if one has been derived.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.slots.get(key).and_then(|s| s.value.get().cloned())
    }

    /// Number of keys holding a derived value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.value().value.get().is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many derivations have been started, successful or not.
    #[must_use]
    pub fn derivations(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

/// Asynchronous single-flight store. The map guard is released before the
/// derivation future is awaited.
pub struct AsyncKeyedStore<K, V> {
    slots: DashMap<K, Arc<OnceCell<Arc<V>>>>,
    derivations: AtomicUsize,
}

impl<K, V> Default for AsyncKeyedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
            derivations: AtomicUsize::new(0),
        }
    }
}

impl<K, V> AsyncKeyedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value for `key`, awaiting `derive` if no caller has produced it yet.
    /// Concurrent callers for the same key wait for the first derivation.
    ///
    /// # Errors
    /// Returns whatever `derive` returns; the failure is not remembered.
    pub async fn get_or_try_insert_with<E, F, Fut>(&self, key: &K, derive: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let existing = self.slots.get(key).map(|c| Arc::clone(c.value()));
        if let Some(value) = existing.as_ref().and_then(|c| c.get()) {
            return Ok(Arc::clone(value));
        }
        let cell = match existing {
            Some(cell) => cell,
            None => Arc::clone(self.slots.entry(key.clone()).or_default().value()),
        };

        let result = cell
            .get_or_try_init(move || async move {
                self.derivations.fetch_add(1, Ordering::Relaxed);
                derive().await.map(Arc::new)
            })
            .await
            .cloned();

        if result.is_err() {
            self.slots
                .remove_if(key, |_, c| Arc::ptr_eq(c, &cell) && !c.initialized());
        }
        result
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.slots.get(key).and_then(|c| c.get().cloned())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|c| c.value().initialized()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn derivations(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }

    pub fn remove(&self, key: &K) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn concurrent_misses_derive_once() {
        let store: KeyedStore<&str, String> = KeyedStore::new();
        let barrier = Barrier::new(8);
        let values: Vec<Arc<String>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        store
                            .get_or_try_insert_with(&"k", || {
                                std::thread::sleep(Duration::from_millis(20));
                                Ok::<_, ()>("v".to_string())
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(store.derivations(), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let store: KeyedStore<u32, u32> = KeyedStore::new();
        assert!(store.get_or_try_insert_with(&1, || Err("boom")).is_err());
        assert!(store.is_empty());
        assert!(store.get(&1).is_none());
        let v = store.get_or_try_insert_with(&1, || Ok::<_, &str>(7)).unwrap();
        assert_eq!(*v, 7);
        assert_eq!(store.derivations(), 2);
    }

    #[test]
    fn distinct_keys_derive_separately() {
        let store: KeyedStore<u32, u32> = KeyedStore::new();
        for k in 0..3 {
            store.get_or_try_insert_with(&k, || Ok::<_, ()>(k * 10)).unwrap();
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(&2).as_deref(), Some(&20));
        store.clear();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn async_hits_only_take_the_read_guard() {
        let store: Arc<AsyncKeyedStore<u32, u32>> = Arc::new(AsyncKeyedStore::new());
        store
            .get_or_try_insert_with(&1, || async { Ok::<_, ()>(5) })
            .await
            .unwrap();

        // another reader holds the shard; a hit must not need the write lock
        let guard = store.slots.get(&1);
        let (tx, rx) = std::sync::mpsc::channel();
        let reader = Arc::clone(&store);
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let hit = rt.block_on(reader.get_or_try_insert_with(&1, || async { Ok::<_, ()>(0) }));
            let _ = tx.send(hit.map(|v| *v));
        });
        let hit = rx.recv_timeout(Duration::from_secs(5)).expect("hit blocked on the shard lock");
        drop(guard);
        assert_eq!(hit, Ok(5));
        assert_eq!(store.derivations(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn async_concurrent_misses_derive_once() {
        let store: Arc<AsyncKeyedStore<String, u64>> = Arc::new(AsyncKeyedStore::new());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .get_or_try_insert_with(&"people".to_string(), || async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, ()>(42)
                    })
                    .await
                    .unwrap()
            }));
        }
        let mut values = Vec::new();
        for task in tasks {
            values.push(task.await.unwrap());
        }
        assert_eq!(store.derivations(), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }

    #[tokio::test]
    async fn async_failure_leaves_no_entry() {
        let store: AsyncKeyedStore<u8, u8> = AsyncKeyedStore::new();
        let err = store
            .get_or_try_insert_with(&1, || async { Err::<u8, _>("down") })
            .await;
        assert!(err.is_err());
        assert!(store.is_empty());
        let ok = store
            .get_or_try_insert_with(&1, || async { Ok::<_, &str>(5) })
            .await
            .unwrap();
        assert_eq!(*ok, 5);
        assert!(store.remove(&1));
        assert!(store.get(&1).is_none());
    }
}
