//! Bulk export of a fully decoded file.
//!
//! An `ExportSession` waits until every page of a file is in the store,
//! reporting progress as `count / total_pages`, then writes the pages out in
//! page order. The store is a scratch cache for the export and is erased
//! when the session finishes or is cancelled.

use std::{io::Write, sync::Arc, time::Duration};

use crossbeam::{
    channel::{Receiver, never},
    select,
};
use tracing::{debug, info, warn};

use crate::{
    core::DecodeComplete,
    error::ExportError,
    page::PageNumber,
    storage::{PageStore, StoreEvent},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    /// In `[0, 1]`.
    pub fraction: f64,
    pub done: bool,
}

pub struct ExportSession {
    store: Arc<dyn PageStore>,
    total_pages: PageNumber,
    poll_interval: Duration,
    events: Receiver<StoreEvent>,
}

impl ExportSession {
    /// Subscribes to `store` immediately, so pages written between now and
    /// `await_decoded` are not missed.
    pub fn new(store: Arc<dyn PageStore>, total_pages: PageNumber, poll_interval: Duration) -> Self {
        let events = store.subscribe();
        Self {
            store,
            total_pages,
            poll_interval,
            events,
        }
    }

    pub fn total_pages(&self) -> PageNumber {
        self.total_pages
    }

    pub fn progress(&self) -> Result<ExportProgress, ExportError> {
        Ok(self.progress_for(self.store.count()?))
    }

    fn progress_for(&self, count: usize) -> ExportProgress {
        let total = self.total_pages as usize;
        if total == 0 {
            return ExportProgress { fraction: 1.0, done: true };
        }
        ExportProgress {
            fraction: (count as f64 / total as f64).min(1.0),
            done: count >= total,
        }
    }

    /// Blocks until the store holds every page.
    ///
    /// Wakes on store writes and on pool completions, and re-checks the count
    /// every `poll_interval` for stores that do not notify. `on_progress` is
    /// called whenever the count changes. A failed page aborts the wait, as
    /// does the completion channel closing while pages are still missing.
    pub fn await_decoded(
        &self,
        completions: &Receiver<DecodeComplete>,
        mut on_progress: impl FnMut(ExportProgress),
    ) -> Result<(), ExportError> {
        let mut completions = completions.clone();
        let mut events = self.events.clone();
        let mut last_count = None;
        let mut completions_closed = false;
        let mut events_closed = false;

        loop {
            let count = self.store.count()?;
            if last_count != Some(count) {
                last_count = Some(count);
                let progress = self.progress_for(count);
                debug!("export progress {count}/{}", self.total_pages);
                on_progress(progress);
                if progress.done {
                    return Ok(());
                }
            }
            if completions_closed {
                return Err(ExportError::Disconnected);
            }

            select! {
                recv(completions) -> msg => match msg {
                    Ok(done) if !done.success => {
                        return Err(ExportError::PageFailed {
                            page: done.page_number,
                            reason: done.error.unwrap_or_default(),
                        });
                    }
                    Ok(done) => {
                        if done.truncated {
                            warn!("page {} exported truncated", done.page_number);
                        }
                    }
                    Err(_) => completions_closed = true,
                },
                recv(events) -> ev => events_closed = ev.is_err(),
                default(self.poll_interval) => {}
            }
            if completions_closed {
                completions = never();
            }
            if events_closed {
                events = never();
            }
        }
    }

    /// Writes pages `1..=total_pages` to `out` in order, one `\n` between
    /// pages. Returns the number of bytes written.
    pub fn write_to<W: Write>(&self, out: &mut W, mut on_progress: impl FnMut(ExportProgress)) -> Result<u64, ExportError> {
        let mut written = 0u64;
        for page in 1..=self.total_pages {
            let text = self.store.get(page)?.ok_or(ExportError::MissingPage(page))?;
            if page > 1 {
                out.write_all(b"\n")?;
                written += 1;
            }
            out.write_all(text.as_bytes())?;
            written += text.len() as u64;
            on_progress(self.progress_for(page as usize));
        }
        out.flush()?;
        info!("exported {} pages ({written} bytes)", self.total_pages);
        Ok(written)
    }

    /// Erases the scratch cache after a completed export.
    pub fn finish(self) -> Result<(), ExportError> {
        self.store.erase_all()?;
        Ok(())
    }

    /// Abandons the export; the partially filled cache is erased.
    pub fn cancel(self) -> Result<(), ExportError> {
        warn!("export cancelled");
        self.store.erase_all()?;
        Ok(())
    }
}
