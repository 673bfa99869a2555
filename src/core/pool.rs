//! Bounded worker pool for page jobs.
//!
//! A single coordinator thread owns all scheduling state: the FIFO queue of
//! pending pages and the table of busy slots. Callers and workers talk to it
//! only through its command channel, so submissions and completions are
//! serialized without locks. Work runs on a `threadpool::ThreadPool` sized to
//! `max_workers`; each job gets a fresh decoder and nothing is shared between
//! jobs.

use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::JoinHandle,
};

use crossbeam::channel::{Receiver, Sender, unbounded};
use threadpool::ThreadPool;
use tracing::{debug, error, info, warn};

use super::{
    config::PoolConfig,
    worker::{JobContext, JobReport, PageWorker},
};
use crate::{
    error::{JobError, PoolError},
    page::{Page, PageNumber},
};

/// Completion signal for one page job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeComplete {
    pub page_number: PageNumber,
    pub success: bool,
    pub truncated: bool,
    pub error: Option<String>,
}

/// Live counters, updated by the coordinator.
#[derive(Debug, Default)]
pub struct PoolStats {
    active: AtomicUsize,
    queued: AtomicUsize,
    peak_active: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl PoolStats {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    /// Jobs that reported back, successfully or not.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

enum Command {
    Submit(Page),
    Finished {
        slot: usize,
        page_number: PageNumber,
        outcome: Result<JobReport, JobError>,
    },
    Shutdown,
}

struct ActiveJob {
    page_number: PageNumber,
    cancel: Arc<AtomicBool>,
}

pub struct WorkerPool {
    commands: Sender<Command>,
    completions: Receiver<DecodeComplete>,
    stats: Arc<PoolStats>,
    shut_down: AtomicBool,
    coordinator: Option<JoinHandle<()>>,
    max_workers: usize,
}

impl WorkerPool {
    /// Starts the coordinator. `max_workers` is clamped to at least one.
    #[tracing::instrument(skip(worker))]
    pub fn new(max_workers: usize, worker: Arc<dyn PageWorker>) -> Result<Self, PoolError> {
        let max_workers = max_workers.max(1);
        let (cmd_tx, cmd_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        let stats = Arc::new(PoolStats::default());

        let coordinator = Coordinator {
            queue: VecDeque::new(),
            slots: (0..max_workers).map(|_| None).collect(),
            threads: ThreadPool::with_name("irflux-page-worker".to_string(), max_workers),
            worker,
            commands: cmd_tx.clone(),
            completions: done_tx,
            stats: stats.clone(),
        };
        let handle = std::thread::Builder::new()
            .name("irflux-pool-coordinator".to_string())
            .spawn(move || coordinator.run(cmd_rx))?;
        info!("worker pool started with {max_workers} workers");

        Ok(Self {
            commands: cmd_tx,
            completions: done_rx,
            stats,
            shut_down: AtomicBool::new(false),
            coordinator: Some(handle),
            max_workers,
        })
    }

    pub fn from_config(conf: &PoolConfig, worker: Arc<dyn PageWorker>) -> Result<Self, PoolError> {
        Self::new(conf.max_workers, worker)
    }

    /// Hands `page` to the pool. Never blocks: the job is dispatched to an
    /// idle worker or queued behind earlier submissions. The outcome arrives
    /// on [`WorkerPool::completions`].
    pub fn submit(&self, page: Page) -> Result<(), PoolError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }
        self.commands.send(Command::Submit(page)).map_err(|_| PoolError::ShutDown)
    }

    /// One `DecodeComplete` per job that finished before shutdown, in
    /// completion order.
    pub fn completions(&self) -> Receiver<DecodeComplete> {
        self.completions.clone()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Drops every queued job and cancels the in-flight ones. Results of
    /// in-flight jobs are discarded and no further completions are sent.
    /// Idempotent.
    ///
    /// Cancellation is cooperative: a job already past its last
    /// `JobContext::is_cancelled` check runs to the end, so a store write it
    /// has started may still land after this returns. Erase the store after
    /// shutdown if those pages must not survive.
    pub fn shutdown(&mut self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.coordinator.take() {
            if handle.join().is_err() {
                error!("pool coordinator panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Coordinator {
    queue: VecDeque<Page>,
    slots: Vec<Option<ActiveJob>>,
    threads: ThreadPool,
    worker: Arc<dyn PageWorker>,
    commands: Sender<Command>,
    completions: Sender<DecodeComplete>,
    stats: Arc<PoolStats>,
}

impl Coordinator {
    fn run(mut self, rx: Receiver<Command>) {
        while let Ok(cmd) = rx.recv() {
            match cmd {
                Command::Submit(page) => {
                    self.queue.push_back(page);
                    self.dispatch();
                }
                Command::Finished {
                    slot,
                    page_number,
                    outcome,
                } => {
                    self.finish(slot, page_number, outcome);
                    self.dispatch();
                }
                Command::Shutdown => {
                    self.abort();
                    return;
                }
            }
        }
    }

    fn dispatch(&mut self) {
        while let Some(slot) = self.slots.iter().position(Option::is_none) {
            let Some(page) = self.queue.pop_front() else {
                break;
            };
            let page_number = page.page_number;
            let cancel = Arc::new(AtomicBool::new(false));
            self.slots[slot] = Some(ActiveJob {
                page_number,
                cancel: cancel.clone(),
            });
            let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.stats.peak_active.fetch_max(active, Ordering::SeqCst);
            debug!("dispatching page {page_number} to worker {slot}");

            let worker = self.worker.clone();
            let commands = self.commands.clone();
            self.threads.execute(move || {
                let ctx = JobContext::new(slot, cancel);
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.run(page, &ctx)))
                    .unwrap_or_else(|e| Err(JobError::Panicked(panic_message(e.as_ref()))));
                // the coordinator is gone after shutdown; the result is dropped
                let _ = commands.send(Command::Finished {
                    slot,
                    page_number,
                    outcome,
                });
            });
        }
        self.stats.queued.store(self.queue.len(), Ordering::SeqCst);
    }

    fn finish(&mut self, slot: usize, page_number: PageNumber, outcome: Result<JobReport, JobError>) {
        if self.slots.get_mut(slot).and_then(Option::take).is_none() {
            warn!("completion for page {page_number} from idle worker {slot} ignored");
            return;
        }
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        self.stats.completed.fetch_add(1, Ordering::SeqCst);

        let signal = match outcome {
            Ok(report) => {
                debug!("page {page_number} decoded ({} records)", report.records);
                DecodeComplete {
                    page_number,
                    success: true,
                    truncated: report.truncated,
                    error: None,
                }
            }
            Err(e) => {
                error!("page {page_number} failed: {e}");
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
                DecodeComplete {
                    page_number,
                    success: false,
                    truncated: false,
                    error: Some(e.to_string()),
                }
            }
        };
        let _ = self.completions.send(signal);
    }

    fn abort(&mut self) {
        let dropped = self.queue.len();
        self.queue.clear();
        let mut cancelled = 0;
        for job in self.slots.iter_mut().filter_map(Option::take) {
            debug!("cancelling in-flight page {}", job.page_number);
            job.cancel.store(true, Ordering::Release);
            cancelled += 1;
        }
        self.stats.active.store(0, Ordering::SeqCst);
        self.stats.queued.store(0, Ordering::SeqCst);
        info!("worker pool shut down: {dropped} queued jobs dropped, {cancelled} in-flight jobs cancelled");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
