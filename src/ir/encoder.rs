//! Producer side of the four-byte IR format.
//!
//! Messages are given pre-tokenized: literal text plus typed variables. Literal
//! bytes that collide with placeholders (or the escape byte) are escaped.

use super::{
    encoded_var,
    preamble::{StreamMetadata, write_preamble},
    protocol::{EOF, payload, placeholder},
};
use crate::error::EncodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageToken<'a> {
    Text(&'a str),
    Int(i32),
    /// Decimal float exactly as it should render, e.g. `"-0.50"`.
    Float(&'a str),
    Dict(&'a str),
}

#[derive(Debug)]
pub struct IrStreamEncoder {
    out: Vec<u8>,
    last_timestamp: i64,
    records: usize,
}

impl IrStreamEncoder {
    /// Starts a stream with a preamble carrying `meta`.
    pub fn new(meta: &StreamMetadata) -> Result<Self, EncodeError> {
        let reference = meta
            .reference_timestamp_ms()
            .ok_or_else(|| EncodeError::InvalidMetadata(meta.reference_timestamp.clone()))?;
        let mut out = Vec::with_capacity(1024);
        write_preamble(meta, &mut out).map_err(|e| EncodeError::InvalidMetadata(e.to_string()))?;
        Ok(Self {
            out,
            last_timestamp: reference,
            records: 0,
        })
    }

    /// Bare record stream without a preamble, chained from `reference_timestamp`.
    pub fn records_only(reference_timestamp: i64) -> Self {
        Self {
            out: Vec::with_capacity(1024),
            last_timestamp: reference_timestamp,
            records: 0,
        }
    }

    pub fn push_record(&mut self, timestamp: i64, tokens: &[MessageToken<'_>]) -> Result<(), EncodeError> {
        let delta = timestamp
            .checked_sub(self.last_timestamp)
            .ok_or(EncodeError::TimestampOverflow(timestamp))?;

        let mut record = Vec::with_capacity(64);
        let mut logtype = Vec::with_capacity(64);
        for token in tokens {
            match *token {
                MessageToken::Text(text) => {
                    for b in text.bytes() {
                        if placeholder::is_placeholder(b) || b == placeholder::ESCAPE {
                            logtype.push(placeholder::ESCAPE);
                        }
                        logtype.push(b);
                    }
                }
                MessageToken::Int(v) => {
                    logtype.push(placeholder::INTEGER);
                    record.push(payload::VAR_FOUR_BYTE_ENCODING);
                    record.extend_from_slice(&v.to_be_bytes());
                }
                MessageToken::Float(s) => {
                    let v = encoded_var::encode_float(s).ok_or_else(|| EncodeError::UnrepresentableFloat(s.to_string()))?;
                    logtype.push(placeholder::FLOAT);
                    record.push(payload::VAR_FOUR_BYTE_ENCODING);
                    record.extend_from_slice(&v.to_be_bytes());
                }
                MessageToken::Dict(s) => {
                    logtype.push(placeholder::DICTIONARY);
                    write_length_prefixed(
                        &mut record,
                        [payload::VAR_STR_LEN_UBYTE, payload::VAR_STR_LEN_USHORT, payload::VAR_STR_LEN_INT],
                        s.as_bytes(),
                    )?;
                }
            }
        }
        write_length_prefixed(
            &mut record,
            [payload::LOGTYPE_STR_LEN_UBYTE, payload::LOGTYPE_STR_LEN_USHORT, payload::LOGTYPE_STR_LEN_INT],
            &logtype,
        )?;
        write_delta(&mut record, delta);

        self.out.extend_from_slice(&record);
        self.last_timestamp = timestamp;
        self.records += 1;
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Bytes written so far, without the end-of-stream tag.
    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.out.push(EOF);
        self.out
    }
}

fn write_length_prefixed(out: &mut Vec<u8>, tags: [u8; 3], bytes: &[u8]) -> Result<(), EncodeError> {
    if let Ok(len) = u8::try_from(bytes.len()) {
        out.push(tags[0]);
        out.push(len);
    } else if let Ok(len) = u16::try_from(bytes.len()) {
        out.push(tags[1]);
        out.extend_from_slice(&len.to_be_bytes());
    } else {
        let len = i32::try_from(bytes.len()).map_err(|_| EncodeError::TooLong(bytes.len()))?;
        out.push(tags[2]);
        out.extend_from_slice(&len.to_be_bytes());
    }
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_delta(out: &mut Vec<u8>, delta: i64) {
    if let Ok(d) = i8::try_from(delta) {
        out.push(payload::TIMESTAMP_DELTA_BYTE);
        out.extend_from_slice(&d.to_be_bytes());
    } else if let Ok(d) = i16::try_from(delta) {
        out.push(payload::TIMESTAMP_DELTA_SHORT);
        out.extend_from_slice(&d.to_be_bytes());
    } else if let Ok(d) = i32::try_from(delta) {
        out.push(payload::TIMESTAMP_DELTA_INT);
        out.extend_from_slice(&d.to_be_bytes());
    } else {
        out.push(payload::TIMESTAMP_DELTA_LONG);
        out.extend_from_slice(&delta.to_be_bytes());
    }
}
