//! Decoded-page cache for one log file.
//!
//! This module provides:
//! - `PageStore`: page number to decoded text, with point lookup, upsert, count and erase.
//! - `StoreEvent` / `StoreNotifier`: write notifications, so progress tracking need not poll.
//! - `MemoryPageStore`: an in-process implementation.
//!
//! Persistent storage lives in [`lmdb`], an LRU read-through wrapper in [`cache`].

pub mod cache;
pub mod lmdb;

use std::{
    collections::BTreeMap,
    sync::{Mutex, RwLock},
};

use crossbeam::channel::{Receiver, Sender, unbounded};

use crate::{error::StoreError, page::PageNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    PageWritten(PageNumber),
    Erased,
}

/// A page is either absent or fully present. Implementations must allow reads
/// concurrent with writes; pages are independent keys, so no cross-page
/// locking is required.
pub trait PageStore: Send + Sync {
    /// Upserts `text` under `page`.
    fn put(&self, page: PageNumber, text: &str) -> Result<(), StoreError>;

    fn get(&self, page: PageNumber) -> Result<Option<String>, StoreError>;

    /// Number of distinct pages stored.
    fn count(&self) -> Result<usize, StoreError>;

    /// Irreversibly removes every page.
    fn erase_all(&self) -> Result<(), StoreError>;

    /// Stored page numbers in ascending order.
    fn page_numbers(&self) -> Result<Vec<PageNumber>, StoreError>;

    /// Receives an event after every successful `put` and `erase_all`.
    fn subscribe(&self) -> Receiver<StoreEvent>;

    fn contains(&self, page: PageNumber) -> Result<bool, StoreError> {
        Ok(self.get(page)?.is_some())
    }
}

/// Fan-out of store events to any number of subscribers. Subscribers that
/// dropped their receiver are pruned on the next send.
#[derive(Debug, Default)]
pub struct StoreNotifier {
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
}

impl StoreNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = unbounded();
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    pub fn notify(&self, event: StoreEvent) {
        let mut subs = match self.subscribers.lock() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.retain(|tx| tx.send(event).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(subs) => subs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Pages held in a `BTreeMap` behind a `RwLock`; readers never block each
/// other.
#[derive(Debug, Default)]
pub struct MemoryPageStore {
    pages: RwLock<BTreeMap<PageNumber, String>>,
    notifier: StoreNotifier,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageStore for MemoryPageStore {
    fn put(&self, page: PageNumber, text: &str) -> Result<(), StoreError> {
        self.pages
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .insert(page, text.to_owned());
        self.notifier.notify(StoreEvent::PageWritten(page));
        Ok(())
    }

    fn get(&self, page: PageNumber) -> Result<Option<String>, StoreError> {
        Ok(self.pages.read().map_err(|_| StoreError::Poisoned)?.get(&page).cloned())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.pages.read().map_err(|_| StoreError::Poisoned)?.len())
    }

    fn erase_all(&self) -> Result<(), StoreError> {
        self.pages.write().map_err(|_| StoreError::Poisoned)?.clear();
        self.notifier.notify(StoreEvent::Erased);
        Ok(())
    }

    fn page_numbers(&self) -> Result<Vec<PageNumber>, StoreError> {
        Ok(self.pages.read().map_err(|_| StoreError::Poisoned)?.keys().copied().collect())
    }

    fn subscribe(&self) -> Receiver<StoreEvent> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tracks_distinct_keys() {
        let store = MemoryPageStore::new();
        for page in [3, 1, 3, 2, 1] {
            store.put(page, &format!("page {page}")).expect("put");
        }
        assert_eq!(store.count().expect("count"), 3);
        assert_eq!(store.page_numbers().expect("pages"), vec![1, 2, 3]);
        assert_eq!(store.get(2).expect("get").as_deref(), Some("page 2"));
        assert!(!store.contains(4).expect("contains"));
    }

    #[test]
    fn test_erase_all_empties_the_store() {
        let store = MemoryPageStore::new();
        store.put(1, "a").expect("put");
        store.put(2, "b").expect("put");
        store.erase_all().expect("erase");
        assert_eq!(store.count().expect("count"), 0);
        assert_eq!(store.get(1).expect("get"), None);
        assert_eq!(store.get(2).expect("get"), None);
    }

    #[test]
    fn test_subscribers_see_writes_and_erase() {
        let store = MemoryPageStore::new();
        let events = store.subscribe();
        store.put(7, "x").expect("put");
        store.erase_all().expect("erase");
        assert_eq!(events.try_recv().expect("event"), StoreEvent::PageWritten(7));
        assert_eq!(events.try_recv().expect("event"), StoreEvent::Erased);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let notifier = StoreNotifier::new();
        let kept = notifier.subscribe();
        drop(notifier.subscribe());
        notifier.notify(StoreEvent::PageWritten(1));
        assert_eq!(notifier.subscriber_count(), 1);
        assert_eq!(kept.try_recv().expect("event"), StoreEvent::PageWritten(1));
    }
}
