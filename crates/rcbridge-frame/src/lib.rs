//! The remote-control payload and its wire forms.
//!
//! Every exchange with a bridge carries one fixed [`RCPayload`]:
//! - 4 unsigned 8-bit ids
//! - 5 IEEE-754 single-precision values
//! - 1 byte of flag bits
//!
//! It travels as a packed 25-byte little-endian frame, a CSV line, or a
//! `{"cmd":"data",...}` JSON command. Inbound traffic is cut into frames
//! incrementally by [`FrameDecoder`]; [`FrameReader`] and [`FrameWriter`]
//! wrap any `Read`/`Write` stream.

pub mod codec;
pub mod command;
pub mod decoder;
pub mod error;
pub mod format;
pub mod payload;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_binary, decode_csv, encode_binary, encode_csv, encode_csv_with_precision, encode_wire,
    format_float, FrameConfig, DEFAULT_FLOAT_PRECISION, DEFAULT_MAX_LINE_LEN,
};
pub use command::{
    encode_json_command, BridgeCommand, BridgeMessage, DataFields, RadioProtocol,
    DATA_RECEIVED_EVENT,
};
pub use decoder::{DecodeStats, FrameDecoder, Inbound};
pub use error::{FrameError, ParseError, Result};
pub use format::{Framing, WireFormat, DEFAULT_RX_PREFIX};
pub use payload::{RCPayload, BYTE_SLOTS, FLAG_BITS, FLOAT_SLOTS, PAYLOAD_SIZE};
pub use reader::FrameReader;
pub use writer::FrameWriter;
