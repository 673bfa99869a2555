mod common;

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use anyhow::Result;
use common::{FlakyStore, MAP_FULL, encode_stream};
use irflux::{
    core::{DecodeWorker, WorkerPool},
    error::{ExportError, StoreError},
    export::ExportSession,
    page::{codec::PageCodec, index::StreamIndex},
    storage::{MemoryPageStore, PageStore, StoreEvent, cache::CachedPageStore, lmdb::LmdbPageStore},
};
use tempfile::tempdir;

const MAP_SIZE: usize = 32 << 20;

fn check_count_and_erase(store: &dyn PageStore) -> Result<()> {
    let puts = [9, 2, 9, 5, 1, 2, 2, 7];
    for (i, page) in puts.iter().enumerate() {
        store.put(*page, &format!("v{i}"))?;
    }
    assert_eq!(store.count()?, 5);
    assert_eq!(store.page_numbers()?, vec![1, 2, 5, 7, 9]);
    assert_eq!(store.get(2)?.as_deref(), Some("v6"));

    store.erase_all()?;
    assert_eq!(store.count()?, 0);
    for page in puts {
        assert_eq!(store.get(page)?, None);
    }
    Ok(())
}

#[test]
fn test_memory_store_count_and_erase() -> Result<()> {
    check_count_and_erase(&MemoryPageStore::new())
}

#[test]
fn test_lmdb_store_count_and_erase() -> Result<()> {
    let dir = tempdir()?;
    check_count_and_erase(&LmdbPageStore::open_for_file(dir.path(), "server.clp.zst", MAP_SIZE)?)
}

#[test]
fn test_cached_lmdb_store_count_and_erase() -> Result<()> {
    let dir = tempdir()?;
    let lmdb = LmdbPageStore::open_for_file(dir.path(), "server.clp.zst", MAP_SIZE)?;
    check_count_and_erase(&CachedPageStore::new(lmdb, 2))
}

#[test]
fn test_lmdb_store_notifies_subscribers() -> Result<()> {
    let dir = tempdir()?;
    let store = LmdbPageStore::open_for_file(dir.path(), "a.clp", MAP_SIZE)?;
    let events = store.subscribe();
    store.put(4, "four")?;
    store.erase_all()?;
    assert_eq!(events.recv_timeout(Duration::from_secs(1))?, StoreEvent::PageWritten(4));
    assert_eq!(events.recv_timeout(Duration::from_secs(1))?, StoreEvent::Erased);
    Ok(())
}

#[test]
fn test_export_through_lmdb_matches_whole_stream() -> Result<()> {
    let bytes = encode_stream(23)?;
    let index = StreamIndex::build(&bytes)?;
    let pages = index.paginate(&bytes, 4);
    let total = pages.len() as u32;
    assert_eq!(total, 6);

    let codec = PageCodec::new(true, 512);
    let whole = codec.decode(&index.paginate(&bytes, index.record_count()).remove(0))?;

    let dir = tempdir()?;
    let lmdb = LmdbPageStore::open_for_file(dir.path(), "export.clp", MAP_SIZE)?;
    let store = Arc::new(CachedPageStore::new(lmdb, 2));
    let mut pool = WorkerPool::new(3, Arc::new(DecodeWorker::new(store.clone(), codec)))?;
    let session = ExportSession::new(store.clone(), total, Duration::from_millis(20));

    let done = pool.completions();
    for page in pages.into_iter().rev() {
        pool.submit(page)?;
    }
    let mut progress = Vec::new();
    session.await_decoded(&done, |p| progress.push(p))?;
    pool.shutdown();
    assert!(progress.last().is_some_and(|p| p.done));

    let mut out = Vec::new();
    let written = session.write_to(&mut out, |_| {})?;
    assert_eq!(written, out.len() as u64);
    assert_eq!(String::from_utf8(out)?, whole.text);

    session.finish()?;
    assert_eq!(store.count()?, 0);
    Ok(())
}

#[test]
fn test_failed_write_reports_failure_and_page_can_be_resubmitted() -> Result<()> {
    let bytes = encode_stream(5)?;
    let index = StreamIndex::build(&bytes)?;
    let page = index.paginate(&bytes, 5).remove(0);

    let store = Arc::new(FlakyStore::default());
    store.fail_put.store(true, Ordering::SeqCst);
    let mut pool = WorkerPool::new(1, Arc::new(DecodeWorker::new(store.clone(), PageCodec::default())))?;
    let done = pool.completions();

    pool.submit(page.clone())?;
    let failed = done.recv_timeout(Duration::from_secs(10))?;
    assert_eq!(failed.page_number, 1);
    assert!(!failed.success);
    assert!(!failed.truncated);
    assert!(failed.error.as_deref().unwrap_or_default().contains(&format!("lmdb error {MAP_FULL}")));
    assert_eq!(store.count()?, 0);
    assert_eq!(store.get(1)?, None);
    assert_eq!(pool.stats().failed(), 1);

    store.fail_put.store(false, Ordering::SeqCst);
    pool.submit(page)?;
    let retried = done.recv_timeout(Duration::from_secs(10))?;
    assert!(retried.success);
    assert_eq!(store.count()?, 1);
    pool.shutdown();
    Ok(())
}

#[test]
fn test_store_failure_stops_export() -> Result<()> {
    let store = Arc::new(FlakyStore::default());
    store.put(1, "one")?;
    store.put(2, "two")?;
    let session = ExportSession::new(store.clone(), 3, Duration::from_millis(10));
    let (_tx, rx) = crossbeam::channel::unbounded();

    store.fail_count.store(true, Ordering::SeqCst);
    let err = session.await_decoded(&rx, |_| {}).expect_err("count fails");
    assert!(matches!(err, ExportError::Store(StoreError::Lmdb { code: MAP_FULL, .. })));

    store.fail_get.store(true, Ordering::SeqCst);
    let mut out = Vec::new();
    let err = session.write_to(&mut out, |_| {}).expect_err("get fails");
    assert!(matches!(err, ExportError::Store(StoreError::Lmdb { code: MAP_FULL, .. })));
    assert!(out.is_empty());

    session.cancel()?;
    assert_eq!(store.inner.count()?, 0);
    Ok(())
}
