//! LRU read-through cache in front of any `PageStore`.
//!
//! Page navigation tends to revisit the same few pages; this keeps them out
//! of the backing store. Writes go through and refresh the cached copy.
//!
//! The cache lock is held across every inner call that can change what the
//! cache should hold, so a `put` racing an `erase_all` cannot leave a page in
//! the cache that the backing store no longer has.

use std::{
    num::NonZeroUsize,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crossbeam::channel::Receiver;
use lru::LruCache;

use super::{PageStore, StoreEvent};
use crate::{error::StoreError, page::PageNumber};

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicUsize,
    pub misses: AtomicUsize,
}

pub struct CachedPageStore<S: PageStore> {
    inner: S,
    cache: Mutex<LruCache<PageNumber, String>>,
    stats: CacheStats,
}

impl<S: PageStore> CachedPageStore<S> {
    /// `capacity` is in pages; zero is treated as one.
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            stats: CacheStats::default(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn cache(&self) -> Result<std::sync::MutexGuard<'_, LruCache<PageNumber, String>>, StoreError> {
        self.cache.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl<S: PageStore> PageStore for CachedPageStore<S> {
    fn put(&self, page: PageNumber, text: &str) -> Result<(), StoreError> {
        let mut cache = self.cache()?;
        // write first; a failed put must not leave a cached page the store lacks
        self.inner.put(page, text)?;
        cache.put(page, text.to_owned());
        Ok(())
    }

    fn get(&self, page: PageNumber) -> Result<Option<String>, StoreError> {
        let mut cache = self.cache()?;
        if let Some(text) = cache.get(&page) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(text.clone()));
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let text = self.inner.get(page)?;
        if let Some(text) = &text {
            cache.put(page, text.clone());
        }
        Ok(text)
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.inner.count()
    }

    fn erase_all(&self) -> Result<(), StoreError> {
        let mut cache = self.cache()?;
        cache.clear();
        self.inner.erase_all()
    }

    fn page_numbers(&self) -> Result<Vec<PageNumber>, StoreError> {
        self.inner.page_numbers()
    }

    fn subscribe(&self) -> Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use crossbeam::channel::{Sender, bounded};

    use super::*;
    use crate::storage::MemoryPageStore;

    /// Signals once the inner write of `put` is done, then holds the call
    /// open until released.
    struct StallingStore {
        inner: MemoryPageStore,
        written: Sender<()>,
        release: Receiver<()>,
    }

    impl PageStore for StallingStore {
        fn put(&self, page: PageNumber, text: &str) -> Result<(), StoreError> {
            self.inner.put(page, text)?;
            let _ = self.written.send(());
            let _ = self.release.recv();
            Ok(())
        }

        fn get(&self, page: PageNumber) -> Result<Option<String>, StoreError> {
            self.inner.get(page)
        }

        fn count(&self) -> Result<usize, StoreError> {
            self.inner.count()
        }

        fn erase_all(&self) -> Result<(), StoreError> {
            self.inner.erase_all()
        }

        fn page_numbers(&self) -> Result<Vec<PageNumber>, StoreError> {
            self.inner.page_numbers()
        }

        fn subscribe(&self) -> Receiver<StoreEvent> {
            self.inner.subscribe()
        }
    }

    #[test]
    fn test_second_read_is_a_hit() {
        let store = CachedPageStore::new(MemoryPageStore::new(), 2);
        store.inner().put(1, "one").expect("put");
        assert_eq!(store.get(1).expect("get").as_deref(), Some("one"));
        assert_eq!(store.get(1).expect("get").as_deref(), Some("one"));
        assert_eq!(store.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(store.stats().misses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_put_refreshes_cached_copy() {
        let store = CachedPageStore::new(MemoryPageStore::new(), 2);
        store.put(1, "old").expect("put");
        store.put(1, "new").expect("put");
        assert_eq!(store.get(1).expect("get").as_deref(), Some("new"));
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn test_erase_drops_cached_pages() {
        let store = CachedPageStore::new(MemoryPageStore::new(), 4);
        store.put(1, "one").expect("put");
        store.erase_all().expect("erase");
        assert_eq!(store.get(1).expect("get"), None);
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn test_least_recently_used_page_is_evicted() {
        let store = CachedPageStore::new(MemoryPageStore::new(), 2);
        for page in 1..=3 {
            store.put(page, "x").expect("put");
        }
        // page 1 was evicted by page 3, so this read goes to the inner store
        store.get(1).expect("get");
        assert_eq!(store.stats().misses.load(Ordering::Relaxed), 1);
        store.get(3).expect("get");
        assert_eq!(store.stats().hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_erase_during_put_leaves_no_cached_page() {
        let (written_tx, written_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let store = Arc::new(CachedPageStore::new(
            StallingStore {
                inner: MemoryPageStore::new(),
                written: written_tx,
                release: release_rx,
            },
            4,
        ));

        let writer = {
            let store = store.clone();
            thread::spawn(move || store.put(1, "stale"))
        };
        written_rx.recv_timeout(Duration::from_secs(5)).expect("inner write");
        let eraser = {
            let store = store.clone();
            thread::spawn(move || store.erase_all())
        };
        // give the eraser a chance to run inside the put
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).expect("release");

        writer.join().expect("join writer").expect("put");
        eraser.join().expect("join eraser").expect("erase");
        assert_eq!(store.count().expect("count"), 0);
        assert_eq!(store.get(1).expect("get"), None);
    }
}
