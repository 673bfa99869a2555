//! Decodes one page: a run of records plus caller-supplied metadata.

use super::{DecodedPage, LogRecord, LogRecordMetadata, Page, PageNumber};
use crate::{
    buffer::GrowableByteBuffer,
    error::DecodeError,
    ir::{ByteCursor, IrStreamDecoder},
};

#[derive(Debug, Clone, Copy)]
pub struct PageCodec {
    render_timestamps: bool,
    initial_capacity: usize,
}

impl Default for PageCodec {
    fn default() -> Self {
        Self::new(true, 4096)
    }
}

impl PageCodec {
    pub fn new(render_timestamps: bool, initial_capacity: usize) -> Self {
        Self {
            render_timestamps,
            initial_capacity,
        }
    }

    pub fn decode(&self, page: &Page) -> Result<DecodedPage, DecodeError> {
        self.decode_page(page.page_number, &page.raw_bytes, &page.metadata)
    }

    /// Decodes one record per metadata entry, pinning the decoder's timestamp
    /// to the entry's reference before each record.
    ///
    /// Running out of bytes stops the page and marks it truncated; everything
    /// decoded up to that point is kept. Malformed data fails the whole page.
    pub fn decode_page(
        &self,
        page_number: PageNumber,
        raw_bytes: &[u8],
        metadata: &[LogRecordMetadata],
    ) -> Result<DecodedPage, DecodeError> {
        let mut decoder = IrStreamDecoder::new(0, self.render_timestamps);
        let mut cursor = ByteCursor::new(raw_bytes);
        let mut out = GrowableByteBuffer::with_capacity(self.initial_capacity);
        let mut records = Vec::with_capacity(metadata.len());
        let mut min_verbosity: Option<u8> = None;
        let mut truncated = false;

        for meta in metadata {
            decoder.reset_timestamp(meta.reference_timestamp);
            match decoder.decode_one_record(&mut cursor, &mut out) {
                Ok(Some(header)) => {
                    min_verbosity = Some(min_verbosity.map_or(header.verbosity_index, |v| v.min(header.verbosity_index)));
                    records.push(LogRecord {
                        mapped_index: meta.mapped_index,
                        timestamp: header.timestamp,
                        verbosity_index: header.verbosity_index,
                    });
                }
                Ok(None) | Err(DecodeError::EndOfStream { .. }) => {
                    truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let text = String::from_utf8_lossy(out.snapshot()).trim_end().to_string();
        Ok(DecodedPage {
            page_number,
            text,
            min_verbosity,
            records,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{IrStreamEncoder, MessageToken},
        page::LogLevel,
    };

    fn three_records() -> (Vec<u8>, Vec<LogRecordMetadata>) {
        let mut enc = IrStreamEncoder::records_only(1_000);
        enc.push_record(1_010, &[MessageToken::Text(" WARN disk at "), MessageToken::Int(91), MessageToken::Text("%\n")])
            .expect("encode");
        enc.push_record(1_020, &[MessageToken::Text(" ERROR write failed\n")]).expect("encode");
        enc.push_record(1_500, &[MessageToken::Text(" INFO retry ok  \n")]).expect("encode");
        let meta = [1_000, 1_010, 1_020]
            .iter()
            .enumerate()
            .map(|(i, ts)| LogRecordMetadata {
                mapped_index: i,
                reference_timestamp: *ts,
            })
            .collect();
        (enc.finish(), meta)
    }

    #[test]
    fn test_decodes_whole_page() {
        let (bytes, meta) = three_records();
        let page = PageCodec::new(false, 16).decode_page(1, &bytes, &meta).expect("decode");
        assert_eq!(page.text, " WARN disk at 91%\n ERROR write failed\n INFO retry ok");
        assert_eq!(page.min_verbosity, Some(LogLevel::Info.index()));
        assert!(!page.truncated);
        let ts: Vec<i64> = page.records.iter().map(|r| r.timestamp).collect();
        assert_eq!(ts, vec![1_010, 1_020, 1_500]);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let (bytes, meta) = three_records();
        let codec = PageCodec::default();
        assert_eq!(codec.decode_page(4, &bytes, &meta), codec.decode_page(4, &bytes, &meta));
    }

    #[test]
    fn test_every_record_is_pinned_to_its_metadata() {
        let (bytes, mut meta) = three_records();
        // a bogus reference only moves the record it belongs to
        meta[1].reference_timestamp = 0;
        let page = PageCodec::new(false, 16).decode_page(1, &bytes, &meta).expect("decode");
        let ts: Vec<i64> = page.records.iter().map(|r| r.timestamp).collect();
        assert_eq!(ts, vec![1_010, 10, 1_500]);
    }

    #[test]
    fn test_fewer_records_than_metadata_is_truncated() {
        let (bytes, mut meta) = three_records();
        meta.push(LogRecordMetadata {
            mapped_index: 3,
            reference_timestamp: 1_500,
        });
        let page = PageCodec::new(false, 16).decode_page(1, &bytes, &meta).expect("decode");
        assert!(page.truncated);
        assert_eq!(page.records.len(), 3);
    }

    #[test]
    fn test_empty_page() {
        let page = PageCodec::default().decode_page(9, &[], &[]).expect("decode");
        assert_eq!(page.text, "");
        assert_eq!(page.min_verbosity, None);
        assert!(!page.truncated);
    }

    #[test]
    fn test_malformed_record_fails_the_page() {
        let (mut bytes, meta) = three_records();
        bytes[0] = 0x7E;
        let err = PageCodec::default().decode_page(1, &bytes, &meta).expect_err("malformed");
        assert!(matches!(err, DecodeError::MalformedData { .. }));
    }
}
