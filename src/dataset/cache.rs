//! Lazily populated item cache shared by every clone of a dataset.

use std::sync::{Arc, OnceLock};

/// One write-once slot per dataset index.
///
/// Clones share the same slots, so worker threads holding their own dataset
/// handle populate and observe a single cache. A slot is only ever set with a
/// fully loaded item; concurrent first accesses may both load, but only the
/// first store wins and every caller returns the stored item.
#[derive(Debug)]
pub struct ItemCache<T> {
    slots: Arc<[OnceLock<Arc<T>>]>,
}

impl<T> Clone for ItemCache<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> ItemCache<T> {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of populated slots.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// Return the cached item at `index`, loading and storing it on first use.
    pub fn get_or_load<E>(
        &self,
        index: usize,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        let slot = &self.slots[index];
        if let Some(item) = slot.get() {
            return Ok(Arc::clone(item));
        }
        let loaded = Arc::new(load()?);
        Ok(Arc::clone(slot.get_or_init(|| loaded)))
    }
}

#[cfg(test)]
mod tests {
    use super::ItemCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn second_access_returns_same_item() {
        let cache = ItemCache::<Vec<f32>>::new(2);
        let loads = AtomicUsize::new(0);
        let load = || -> Result<Vec<f32>, ()> {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 2.0])
        };

        let first = cache.get_or_load(0, load).expect("load");
        let second = cache.get_or_load(0, load).expect("load");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.filled(), 1);
    }

    #[test]
    fn failed_load_leaves_slot_empty() {
        let cache = ItemCache::<u32>::new(1);
        let err = cache.get_or_load(0, || Err::<u32, _>("boom")).unwrap_err();
        assert_eq!(err, "boom");
        assert_eq!(cache.filled(), 0);
        let value = cache.get_or_load(0, || Ok::<_, &str>(7)).expect("load");
        assert_eq!(*value, 7);
    }

    #[test]
    fn clones_share_slots_across_threads() {
        let cache = ItemCache::<usize>::new(4);
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let cache = cache.clone();
                scope.spawn(move || {
                    for index in 0..4 {
                        let _ = cache.get_or_load(index, || Ok::<_, ()>(index * 10 + worker));
                    }
                });
            }
        });
        assert_eq!(cache.filled(), 4);
        let seen: Vec<usize> = (0..4)
            .map(|i| *cache.get_or_load(i, || Ok::<_, ()>(usize::MAX)).unwrap())
            .collect();
        for (index, value) in seen.iter().enumerate() {
            assert_eq!(value / 10, index);
        }
    }
}
