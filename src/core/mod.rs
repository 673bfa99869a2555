pub mod config;
pub mod pool;
pub mod worker;

pub use pool::{DecodeComplete, PoolStats, WorkerPool};
pub use worker::{DecodeWorker, JobContext, JobReport, PageWorker};
