//! The four-byte IR stream format: wire constants, readers and writers.

pub mod cursor;
pub mod decoder;
pub mod encoded_var;
pub mod encoder;
pub mod preamble;
pub mod protocol;

pub use cursor::ByteCursor;
pub use decoder::{DecoderState, IrStreamDecoder, RecordHeader};
pub use encoder::{IrStreamEncoder, MessageToken};
pub use preamble::StreamMetadata;
