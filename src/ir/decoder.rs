//! Record-at-a-time decoder for four-byte IR streams.
//!
//! A record on the wire is a run of variable tokens, one logtype, then a
//! timestamp delta against the previous record. The decoder keeps the running
//! timestamp; `reset_timestamp` pins it so decoding can start at any record,
//! given the predecessor's timestamp.

use std::ops::Range;

use chrono::DateTime;

use super::{
    cursor::ByteCursor,
    encoded_var,
    protocol::{EOF, payload, placeholder},
};
use crate::{buffer::GrowableByteBuffer, error::DecodeError, page::LogLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Ready,
    DecodingRecord,
    /// The cursor ran out, or the end-of-stream tag was read.
    Exhausted,
    /// Malformed data was seen; no further records will decode.
    Failed,
}

/// What one decoded record resolved to. `span` is where its text landed in
/// the output buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub timestamp: i64,
    pub verbosity_index: u8,
    pub span: Range<usize>,
}

#[derive(Debug)]
pub struct IrStreamDecoder {
    current_timestamp: i64,
    current_verbosity: u8,
    state: DecoderState,
    render_timestamps: bool,
    line: Vec<u8>,
}

impl IrStreamDecoder {
    pub fn new(reference_timestamp: i64, render_timestamps: bool) -> Self {
        Self {
            current_timestamp: reference_timestamp,
            current_verbosity: LogLevel::None.index(),
            state: DecoderState::Ready,
            render_timestamps,
            line: Vec::with_capacity(256),
        }
    }

    pub fn reset_timestamp(&mut self, timestamp: i64) {
        self.current_timestamp = timestamp;
    }

    pub fn current_timestamp(&self) -> i64 {
        self.current_timestamp
    }

    pub fn current_verbosity(&self) -> u8 {
        self.current_verbosity
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Decodes the next record from `cursor` and appends its text to `out`.
    ///
    /// Returns `Ok(None)` on the end-of-stream tag. A record is appended to
    /// `out` whole or not at all: on `EndOfStream` mid-record nothing is
    /// written and the cursor position is unspecified.
    pub fn decode_one_record(
        &mut self,
        cursor: &mut ByteCursor<'_>,
        out: &mut GrowableByteBuffer,
    ) -> Result<Option<RecordHeader>, DecodeError> {
        match self.state {
            DecoderState::Failed => {
                return Err(DecodeError::malformed(cursor.position(), "decoder already failed"));
            }
            DecoderState::Exhausted => {
                return Err(DecodeError::EndOfStream { offset: cursor.position() });
            }
            DecoderState::Ready | DecoderState::DecodingRecord => {}
        }

        self.state = DecoderState::DecodingRecord;
        let result = self.read_record(cursor, out);
        self.state = match &result {
            Ok(Some(_)) => DecoderState::Ready,
            Ok(None) | Err(DecodeError::EndOfStream { .. }) => DecoderState::Exhausted,
            Err(DecodeError::MalformedData { .. }) => DecoderState::Failed,
        };
        result
    }

    fn read_record(
        &mut self,
        cursor: &mut ByteCursor<'_>,
        out: &mut GrowableByteBuffer,
    ) -> Result<Option<RecordHeader>, DecodeError> {
        let mut encoded_vars: Vec<i32> = Vec::new();
        let mut dict_vars: Vec<&[u8]> = Vec::new();

        let (logtype, logtype_at) = loop {
            let tag_at = cursor.position();
            let tag = cursor.read_u8()?;
            match tag {
                EOF if encoded_vars.is_empty() && dict_vars.is_empty() => return Ok(None),
                EOF => {
                    return Err(DecodeError::malformed(tag_at, "end-of-stream tag inside a record"));
                }
                payload::VAR_FOUR_BYTE_ENCODING => encoded_vars.push(cursor.read_i32()?),
                payload::VAR_EIGHT_BYTE_ENCODING => {
                    return Err(DecodeError::malformed(
                        tag_at,
                        "eight-byte variable in a four-byte stream",
                    ));
                }
                payload::VAR_STR_LEN_UBYTE | payload::VAR_STR_LEN_USHORT | payload::VAR_STR_LEN_INT => {
                    let len = read_length(cursor, tag, tag_at)?;
                    dict_vars.push(cursor.read_slice(len)?);
                }
                payload::LOGTYPE_STR_LEN_UBYTE | payload::LOGTYPE_STR_LEN_USHORT | payload::LOGTYPE_STR_LEN_INT => {
                    let len = read_length(cursor, tag, tag_at)?;
                    let at = cursor.position();
                    break (cursor.read_slice(len)?, at);
                }
                other => {
                    return Err(DecodeError::malformed(tag_at, format!("unknown tag {other:#04x}")));
                }
            }
        };

        let ts_at = cursor.position();
        let delta = match cursor.read_u8()? {
            payload::TIMESTAMP_DELTA_BYTE => i64::from(cursor.read_i8()?),
            payload::TIMESTAMP_DELTA_SHORT => i64::from(cursor.read_i16()?),
            payload::TIMESTAMP_DELTA_INT => i64::from(cursor.read_i32()?),
            payload::TIMESTAMP_DELTA_LONG => cursor.read_i64()?,
            other => {
                return Err(DecodeError::malformed(
                    ts_at,
                    format!("expected timestamp delta, found tag {other:#04x}"),
                ));
            }
        };
        let timestamp = self
            .current_timestamp
            .checked_add(delta)
            .ok_or_else(|| DecodeError::malformed(ts_at, "timestamp overflow"))?;

        self.line.clear();
        render_message(logtype, logtype_at, &encoded_vars, &dict_vars, &mut self.line)?;
        let verbosity = LogLevel::detect(logtype).index();

        let start = out.len();
        if self.render_timestamps {
            out.append(format_timestamp(timestamp).as_bytes());
        }
        out.append(&self.line);

        self.current_timestamp = timestamp;
        self.current_verbosity = verbosity;
        Ok(Some(RecordHeader {
            timestamp,
            verbosity_index: verbosity,
            span: start..out.len(),
        }))
    }
}

fn read_length(cursor: &mut ByteCursor<'_>, tag: u8, tag_at: usize) -> Result<usize, DecodeError> {
    match tag & 0x0F {
        0x1 => Ok(cursor.read_u8()? as usize),
        0x2 => Ok(cursor.read_u16()? as usize),
        _ => {
            let len = cursor.read_i32()?;
            usize::try_from(len).map_err(|_| DecodeError::malformed(tag_at, format!("negative length {len}")))
        }
    }
}

/// Substitutes variables into the logtype's placeholders, in order.
fn render_message(
    logtype: &[u8],
    logtype_at: usize,
    encoded_vars: &[i32],
    dict_vars: &[&[u8]],
    line: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    let mut encoded = encoded_vars.iter();
    let mut dict = dict_vars.iter();
    let mut bytes = logtype.iter().enumerate();

    while let Some((i, &b)) = bytes.next() {
        let at = logtype_at + i;
        match b {
            placeholder::INTEGER => {
                let v = encoded
                    .next()
                    .ok_or_else(|| DecodeError::malformed(at, "integer placeholder without a variable"))?;
                encoded_var::decode_integer(*v, line);
            }
            placeholder::FLOAT => {
                let v = encoded
                    .next()
                    .ok_or_else(|| DecodeError::malformed(at, "float placeholder without a variable"))?;
                encoded_var::decode_float(*v, line)
                    .ok_or_else(|| DecodeError::malformed(at, format!("invalid encoded float {v:#010x}")))?;
            }
            placeholder::DICTIONARY => {
                let v = dict
                    .next()
                    .ok_or_else(|| DecodeError::malformed(at, "dictionary placeholder without a variable"))?;
                line.extend_from_slice(v);
            }
            placeholder::ESCAPE => {
                let (_, &escaped) = bytes
                    .next()
                    .ok_or_else(|| DecodeError::malformed(at, "dangling escape at end of logtype"))?;
                line.push(escaped);
            }
            _ => line.push(b),
        }
    }
    Ok(())
}

/// UTC rendering of an epoch-millisecond timestamp; out-of-range values fall
/// back to the raw number.
pub fn format_timestamp(timestamp: i64) -> String {
    match DateTime::from_timestamp_millis(timestamp) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => timestamp.to_string(),
    }
}
