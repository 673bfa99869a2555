//! Stream preamble: encoding magic followed by a length-prefixed JSON
//! metadata object.

use serde::{Deserialize, Serialize};

use super::{
    cursor::ByteCursor,
    protocol::{EIGHT_BYTE_ENCODING_MAGIC, FOUR_BYTE_ENCODING_MAGIC, metadata},
};
use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StreamMetadata {
    pub version: String,
    /// Epoch milliseconds, carried as a decimal string on the wire.
    pub reference_timestamp: String,
    #[serde(default)]
    pub timestamp_pattern: String,
    #[serde(default)]
    pub timestamp_pattern_syntax: String,
    #[serde(default)]
    pub tz_id: String,
}

impl StreamMetadata {
    pub fn new(reference_timestamp: i64) -> Self {
        Self {
            version: metadata::VERSION_VALUE.to_string(),
            reference_timestamp: reference_timestamp.to_string(),
            timestamp_pattern: "%Y-%m-%d %H:%M:%S,%3".to_string(),
            timestamp_pattern_syntax: String::new(),
            tz_id: "UTC".to_string(),
        }
    }

    pub fn reference_timestamp_ms(&self) -> Option<i64> {
        self.reference_timestamp.trim().parse().ok()
    }
}

/// Reads and validates the preamble, leaving `cursor` at the first record.
pub fn read_preamble(cursor: &mut ByteCursor<'_>) -> Result<StreamMetadata, DecodeError> {
    let start = cursor.position();
    let magic = cursor.read_slice(4)?;
    if magic == EIGHT_BYTE_ENCODING_MAGIC {
        return Err(DecodeError::malformed(start, "eight-byte encoding is not supported"));
    }
    if magic != FOUR_BYTE_ENCODING_MAGIC {
        return Err(DecodeError::malformed(start, "unknown encoding magic number"));
    }

    let encoding_at = cursor.position();
    if cursor.read_u8()? != metadata::ENCODING_JSON {
        return Err(DecodeError::malformed(encoding_at, "unsupported metadata encoding"));
    }
    let len_at = cursor.position();
    let len = match cursor.read_u8()? {
        metadata::LENGTH_UBYTE => cursor.read_u8()? as usize,
        metadata::LENGTH_USHORT => cursor.read_u16()? as usize,
        tag => {
            return Err(DecodeError::malformed(
                len_at,
                format!("unknown metadata length tag {tag:#04x}"),
            ));
        }
    };
    let json_at = cursor.position();
    let json = cursor.read_slice(len)?;
    let meta: StreamMetadata = serde_json::from_slice(json)
        .map_err(|e| DecodeError::malformed(json_at, format!("invalid stream metadata: {e}")))?;
    if meta.reference_timestamp_ms().is_none() {
        return Err(DecodeError::malformed(json_at, "reference timestamp is not an integer"));
    }
    Ok(meta)
}

/// Serializes a preamble for `meta`.
pub fn write_preamble(meta: &StreamMetadata, out: &mut Vec<u8>) -> serde_json::Result<()> {
    let json = serde_json::to_vec(meta)?;
    out.extend_from_slice(&FOUR_BYTE_ENCODING_MAGIC);
    out.push(metadata::ENCODING_JSON);
    match u8::try_from(json.len()) {
        Ok(len) => {
            out.push(metadata::LENGTH_UBYTE);
            out.push(len);
        }
        Err(_) => {
            let len = u16::try_from(json.len()).map_err(|_| {
                serde_json::Error::io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "stream metadata longer than 65535 bytes",
                ))
            })?;
            out.push(metadata::LENGTH_USHORT);
            out.extend_from_slice(&len.to_be_bytes());
        }
    }
    out.extend_from_slice(&json);
    Ok(())
}
