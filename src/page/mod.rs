//! Page-level data model shared by the codec, the worker pool and the store.

pub mod codec;
pub mod index;

/// 1-based page number, as shown to users and used as the store key.
pub type PageNumber = u32;

/// Log levels recognised at the head of a logtype. The discriminant is the
/// verbosity index; `None` means no level was found.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    None = 0,
    Trace = 1,
    Debug = 2,
    Info = 3,
    Warn = 4,
    Error = 5,
    Fatal = 6,
}

impl LogLevel {
    pub const NAMES: [&'static str; 7] = ["NONE", "TRACE", "DEBUG", "INFO", "WARN", "ERROR", "FATAL"];

    pub fn from_name(name: &[u8]) -> Self {
        match name {
            b"TRACE" => LogLevel::Trace,
            b"DEBUG" => LogLevel::Debug,
            b"INFO" => LogLevel::Info,
            b"WARN" => LogLevel::Warn,
            b"ERROR" => LogLevel::Error,
            b"FATAL" => LogLevel::Fatal,
            _ => LogLevel::None,
        }
    }

    /// Looks at the first word of a logtype, skipping leading whitespace.
    pub fn detect(logtype: &[u8]) -> Self {
        let start = logtype
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(logtype.len());
        let word_len = logtype[start..]
            .iter()
            .position(|b| !b.is_ascii_alphabetic())
            .unwrap_or(logtype.len() - start);
        Self::from_name(&logtype[start..start + word_len])
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self as usize]
    }
}

/// Caller-supplied metadata for one record of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordMetadata {
    /// Position of the record within its page.
    pub mapped_index: usize,
    /// Timestamp to assume before decoding this record: the page's absolute
    /// start for the first record, the predecessor's timestamp otherwise.
    pub reference_timestamp: i64,
}

/// Per-record result of decoding a page. The record's text is part of the
/// page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    pub mapped_index: usize,
    pub timestamp: i64,
    pub verbosity_index: u8,
}

/// A decode job: the exact encoded bytes of a page's records plus one
/// metadata entry per record. Moved into the worker that decodes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_number: PageNumber,
    pub raw_bytes: Vec<u8>,
    pub metadata: Vec<LogRecordMetadata>,
}

impl Page {
    pub fn record_count(&self) -> usize {
        self.metadata.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPage {
    pub page_number: PageNumber,
    pub text: String,
    /// `None` when no record decoded.
    pub min_verbosity: Option<u8>,
    pub records: Vec<LogRecord>,
    /// Set when the bytes ran out before every record in the metadata decoded.
    pub truncated: bool,
}
