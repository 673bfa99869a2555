//! Wire constants of the four-byte IR stream encoding.

pub const FOUR_BYTE_ENCODING_MAGIC: [u8; 4] = [0xFD, 0x2F, 0xB5, 0x29];
pub const EIGHT_BYTE_ENCODING_MAGIC: [u8; 4] = [0xFD, 0x2F, 0xB5, 0x30];

pub mod metadata {
    pub const ENCODING_JSON: u8 = 0x01;
    pub const LENGTH_UBYTE: u8 = 0x11;
    pub const LENGTH_USHORT: u8 = 0x12;

    pub const VERSION_VALUE: &str = "0.0.1";
}

pub mod payload {
    pub const VAR_FOUR_BYTE_ENCODING: u8 = 0x18;
    pub const VAR_EIGHT_BYTE_ENCODING: u8 = 0x19;

    pub const VAR_STR_LEN_UBYTE: u8 = 0x11;
    pub const VAR_STR_LEN_USHORT: u8 = 0x12;
    pub const VAR_STR_LEN_INT: u8 = 0x13;

    pub const LOGTYPE_STR_LEN_UBYTE: u8 = 0x21;
    pub const LOGTYPE_STR_LEN_USHORT: u8 = 0x22;
    pub const LOGTYPE_STR_LEN_INT: u8 = 0x23;

    pub const TIMESTAMP_DELTA_BYTE: u8 = 0x31;
    pub const TIMESTAMP_DELTA_SHORT: u8 = 0x32;
    pub const TIMESTAMP_DELTA_INT: u8 = 0x33;
    pub const TIMESTAMP_DELTA_LONG: u8 = 0x34;
}

pub const EOF: u8 = 0x00;

/// Placeholder bytes inside a logtype.
pub mod placeholder {
    pub const INTEGER: u8 = 0x11;
    pub const DICTIONARY: u8 = 0x12;
    pub const FLOAT: u8 = 0x13;
    pub const ESCAPE: u8 = b'\\';

    pub fn is_placeholder(b: u8) -> bool {
        matches!(b, INTEGER | DICTIONARY | FLOAT)
    }
}
