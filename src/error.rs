//! Error taxonomy for irflux.
//!
//! - `DecodeError`: wire-level failures. `EndOfStream` is recoverable (the page
//!   keeps what decoded so far), `MalformedData` aborts the page.
//! - `EncodeError`: values the encoder cannot represent.
//! - `StoreError`: I/O-level failures of a `PageStore`.
//! - `PoolError`: pool startup failures and submission after shutdown.
//! - `JobError`: everything that can fail a single page job.
//! - `ExportError`: failures that abort an export session.

use thiserror::Error;

use crate::page::PageNumber;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("end of stream at byte {offset}")]
    EndOfStream { offset: usize },

    #[error("malformed data at byte {offset}: {reason}")]
    MalformedData { offset: usize, reason: String },
}

impl DecodeError {
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        DecodeError::MalformedData {
            offset,
            reason: reason.into(),
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DecodeError::EndOfStream { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("float {0:?} has no four-byte encoding")]
    UnrepresentableFloat(String),

    #[error("field of {0} bytes exceeds the i32 length limit")]
    TooLong(usize),

    #[error("timestamp {0} overflows the delta chain")]
    TimestampOverflow(i64),

    #[error("invalid stream metadata: {0}")]
    InvalidMetadata(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lmdb error {code}: {message}")]
    Lmdb { code: i32, message: String },

    #[error("stored page {page} is not valid UTF-8")]
    Utf8 { page: PageNumber },

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool has been shut down")]
    ShutDown,

    #[error("failed to spawn pool coordinator: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("job cancelled by pool shutdown")]
    Cancelled,

    #[error("worker panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("store failure during export: {0}")]
    Store(#[from] StoreError),

    #[error("page {page} failed to decode: {reason}")]
    PageFailed { page: PageNumber, reason: String },

    #[error("page {0} was not loaded")]
    MissingPage(PageNumber),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("completion channel closed before all pages decoded")]
    Disconnected,
}
