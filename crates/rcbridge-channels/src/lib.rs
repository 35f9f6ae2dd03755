//! Named, bounded channels packed into the fixed payload slots.
//!
//! A channel file names up to 4 byte channels, 5 float channels and 8 flag
//! channels. [`ChannelConfig`] validates it once at load; afterwards
//! [`ChannelConfig::build_packet`] turns a map of named values into an
//! [`rcbridge_frame::RCPayload`] without any I/O.

pub mod config;
pub mod error;
pub mod packet;
pub mod registry;
pub mod value;

pub use config::{ByteEntry, ChannelFile, FlagEntry, FloatEntry, LoadConfig};
pub use error::{ConfigError, Result, ValidationError};
pub use packet::{Packet, ResolvedChannel, ResolvedValue};
pub use registry::{
    ByteChannel, ChannelConfig, ChannelKind, FlagChannel, FloatChannel, DEFAULT_FLOAT_MAX,
    DEFAULT_FLOAT_MIN, MAX_FLOAT_DECIMALS, MIN_FLOAT_STEP,
};
pub use value::{parse_assignment, ChannelValue, NamedValues};
