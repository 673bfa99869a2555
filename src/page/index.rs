//! Record boundaries of a whole IR stream, and the pages cut from them.
//!
//! The index walks the stream once, remembering where each record starts and
//! ends and which timestamp precedes it. That is all a page job needs to be
//! decoded on its own.

use std::ops::Range;

use tracing::{debug, warn};

use super::{LogRecordMetadata, Page, PageNumber};
use crate::{
    buffer::GrowableByteBuffer,
    error::DecodeError,
    ir::{ByteCursor, IrStreamDecoder, StreamMetadata, preamble::read_preamble},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    pub start: usize,
    pub end: usize,
    /// Timestamp of the previous record, or the stream reference for the first.
    pub reference_timestamp: i64,
    pub timestamp: i64,
}

impl RecordSpan {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone)]
pub struct StreamIndex {
    metadata: StreamMetadata,
    records: Vec<RecordSpan>,
    truncated: bool,
}

impl StreamIndex {
    /// Reads the preamble and every record of `bytes`.
    ///
    /// A stream cut off mid-record indexes the complete records and is flagged
    /// truncated. Malformed data anywhere fails the whole index.
    pub fn build(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = ByteCursor::new(bytes);
        let metadata = read_preamble(&mut cursor)?;
        let reference = metadata
            .reference_timestamp_ms()
            .ok_or_else(|| DecodeError::malformed(0, "reference timestamp is not an integer"))?;

        let mut decoder = IrStreamDecoder::new(reference, false);
        let mut scratch = GrowableByteBuffer::new();
        let mut records = Vec::new();
        let mut truncated = false;
        loop {
            scratch.clear();
            let start = cursor.position();
            let reference_timestamp = decoder.current_timestamp();
            match decoder.decode_one_record(&mut cursor, &mut scratch) {
                Ok(Some(header)) => records.push(RecordSpan {
                    start,
                    end: cursor.position(),
                    reference_timestamp,
                    timestamp: header.timestamp,
                }),
                Ok(None) => break,
                Err(DecodeError::EndOfStream { offset }) => {
                    warn!("IR stream ends mid-record at byte {offset}, indexed {} records", records.len());
                    truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        debug!("indexed {} records ({} bytes)", records.len(), bytes.len());
        Ok(Self {
            metadata,
            records,
            truncated,
        })
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    pub fn records(&self) -> &[RecordSpan] {
        &self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn page_count(&self, page_size: usize) -> usize {
        self.records.len().div_ceil(page_size.max(1))
    }

    /// The 1-based `page_number`th page of `page_size` records, if it exists.
    pub fn page(&self, bytes: &[u8], page_size: usize, page_number: PageNumber) -> Option<Page> {
        let page_size = page_size.max(1);
        let first = (page_number as usize).checked_sub(1)?.checked_mul(page_size)?;
        let spans = self.records.get(first..)?;
        let spans = &spans[..spans.len().min(page_size)];
        make_page(bytes, page_number, spans)
    }

    /// Cuts the stream into pages of `page_size` records, numbered from 1.
    pub fn paginate(&self, bytes: &[u8], page_size: usize) -> Vec<Page> {
        self.records
            .chunks(page_size.max(1))
            .zip(1..)
            .filter_map(|(spans, page_number)| make_page(bytes, page_number, spans))
            .collect()
    }
}

fn make_page(bytes: &[u8], page_number: PageNumber, spans: &[RecordSpan]) -> Option<Page> {
    let first = spans.first()?;
    let last = spans.last()?;
    let raw_bytes = bytes.get(first.start..last.end)?.to_vec();
    let metadata = spans
        .iter()
        .enumerate()
        .map(|(mapped_index, span)| LogRecordMetadata {
            mapped_index,
            reference_timestamp: span.reference_timestamp,
        })
        .collect();
    Some(Page {
        page_number,
        raw_bytes,
        metadata,
    })
}
