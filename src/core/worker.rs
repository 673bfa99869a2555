//! What a pool worker does with a page job.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, warn};

use crate::{
    core::config::DecoderConfig,
    error::JobError,
    page::{Page, codec::PageCodec},
    storage::PageStore,
};

/// Per-job handle given to a worker. The cancel flag is raised when the pool
/// shuts down while the job is in flight.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub slot: usize,
    cancel: Arc<AtomicBool>,
}

impl JobContext {
    pub fn new(slot: usize, cancel: Arc<AtomicBool>) -> Self {
        Self { slot, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    pub truncated: bool,
    pub records: usize,
}

/// Runs one page job to completion. The job is moved in; nothing but the
/// returned report leaves the worker.
pub trait PageWorker: Send + Sync + 'static {
    fn run(&self, job: Page, ctx: &JobContext) -> Result<JobReport, JobError>;
}

impl<F> PageWorker for F
where
    F: Fn(Page, &JobContext) -> Result<JobReport, JobError> + Send + Sync + 'static,
{
    fn run(&self, job: Page, ctx: &JobContext) -> Result<JobReport, JobError> {
        self(job, ctx)
    }
}

/// Decodes the page with a fresh decoder and stores the text under the page
/// number. A page that fails to decode, or whose job was cancelled before the
/// write started, writes nothing. A failed write leaves the page absent, so it
/// can be submitted again.
pub struct DecodeWorker {
    store: Arc<dyn PageStore>,
    codec: PageCodec,
}

impl DecodeWorker {
    pub fn new(store: Arc<dyn PageStore>, codec: PageCodec) -> Self {
        Self { store, codec }
    }

    pub fn from_config(store: Arc<dyn PageStore>, conf: &DecoderConfig) -> Self {
        Self::new(store, PageCodec::new(conf.render_timestamps, conf.initial_buffer_capacity))
    }
}

impl PageWorker for DecodeWorker {
    fn run(&self, job: Page, ctx: &JobContext) -> Result<JobReport, JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let decoded = self.codec.decode(&job)?;
        if decoded.truncated {
            warn!(
                "page {} truncated: decoded {} of {} records",
                decoded.page_number,
                decoded.records.len(),
                job.record_count()
            );
        }
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        self.store.put(decoded.page_number, &decoded.text)?;
        debug!("worker {} stored page {}", ctx.slot, decoded.page_number);
        Ok(JobReport {
            truncated: decoded.truncated,
            records: decoded.records.len(),
        })
    }
}
