// src/bin/irflux_export.rs
// Decodes a four-byte IR log file page by page and exports it as plain text.
//
// Run:   IR_FILE=app.clp OUT_FILE=app.log ./irflux_export
//
// Environment variables:
//   IR_FILE     - IR stream to decode (required)
//   OUT_FILE    - Output text file (default: <IR_FILE>.log)
//   PAGE_SIZE   - Records per page (default: export.page_size from config)
//   CACHE_DIR   - Directory for the page cache (default: store.cache_dir from config)
//   MAX_WORKERS - Concurrent decode workers (default: pool.max_workers from config)

use std::{
    env,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use irflux::{
    core::{DecodeWorker, WorkerPool},
    export::{ExportProgress, ExportSession},
    page::{PageNumber, index::StreamIndex},
    storage::{PageStore, cache::CachedPageStore, lmdb::LmdbPageStore},
};
use memmap2::Mmap;
use tracing::warn;

fn env_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(v) => v.trim().parse().with_context(|| format!("invalid {key}: {v:?}")),
        Err(_) => Ok(default),
    }
}

fn print_progress(p: ExportProgress) {
    print!("\r   Decoded:       {:>5.1}%", p.fraction * 100.0);
    if p.done {
        println!();
    }
    let _ = std::io::stdout().flush();
}

fn write_output(session: &ExportSession, out_file: &str) -> anyhow::Result<u64> {
    let mut out = BufWriter::new(File::create(out_file).with_context(|| format!("create {out_file}"))?);
    Ok(session.write_to(&mut out, |_| {})?)
}

fn main() -> anyhow::Result<()> {
    let conf = irflux::initialize();

    let ir_file = env::var("IR_FILE").context("IR_FILE is required")?;
    let out_file = env::var("OUT_FILE").unwrap_or_else(|_| format!("{ir_file}.log"));
    let page_size = env_or("PAGE_SIZE", conf.export.page_size)?;
    let cache_dir = env::var("CACHE_DIR").map(PathBuf::from).unwrap_or_else(|_| conf.store.cache_dir.clone());
    let max_workers = env_or("MAX_WORKERS", conf.pool.max_workers)?;

    let started = Instant::now();
    let file = File::open(&ir_file).with_context(|| format!("open {ir_file}"))?;
    // SAFETY: the file is only read, and is expected not to change while mapped.
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("map {ir_file}"))?;
    let index = StreamIndex::build(&mmap[..]).with_context(|| format!("index {ir_file}"))?;
    let pages = index.paginate(&mmap[..], page_size);
    let total = PageNumber::try_from(pages.len())?;

    println!("irflux export");
    println!("   Input:         {ir_file}");
    println!("   Output:        {out_file}");
    println!("   Records:       {}{}", index.record_count(), if index.is_truncated() { " (truncated stream)" } else { "" });
    println!("   Pages:         {total} x {page_size} records");
    println!("   Workers:       {max_workers}");

    let file_name = Path::new(&ir_file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ir_file.clone());
    let lmdb = LmdbPageStore::open_for_file(&cache_dir, &file_name, conf.store.map_size_bytes)?;
    let store = Arc::new(CachedPageStore::new(lmdb, conf.store.read_cache_pages));
    // start from a clean cache even if an earlier run was interrupted
    store.erase_all()?;

    let worker = DecodeWorker::from_config(store.clone(), &conf.decoder);
    let mut pool = WorkerPool::new(max_workers, Arc::new(worker))?;
    let session = ExportSession::new(
        store.clone(),
        total,
        Duration::from_millis(conf.export.progress_poll_interval_ms),
    );

    let completions = pool.completions();
    for page in pages {
        pool.submit(page)?;
    }
    if let Err(e) = session.await_decoded(&completions, print_progress) {
        println!();
        pool.shutdown();
        session.cancel()?;
        return Err(e.into());
    }
    pool.shutdown();

    let written = match write_output(&session, &out_file) {
        Ok(written) => {
            session.finish()?;
            written
        }
        Err(e) => {
            session.cancel()?;
            return Err(e);
        }
    };
    drop(pool);

    match Arc::try_unwrap(store) {
        Ok(store) => store.into_inner().destroy()?,
        Err(_) => warn!("page cache still in use, leaving it in {}", cache_dir.display()),
    }

    println!("   Written:       {written} bytes in {:.2?}", started.elapsed());
    Ok(())
}
