//! Host-side control of serial remote-control bridges.
//!
//! rcbridge packs named, bounded channel values into a fixed 25-byte
//! remote-control payload and exchanges it with an ESP32-class bridge over
//! a serial port, as a packed binary frame, a CSV line or a JSON command.
//!
//! # Crate Structure
//!
//! - [`transport`]: Serial port and Unix socket links, port enumeration
//! - [`frame`]: Payload codec, bridge commands, incremental frame decoding
//! - [`channels`]: Channel definitions and packet building
//! - [`session`]: Session lifecycle and send scheduling (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use rcbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rcbridge_frame::*;
}

/// Re-export channel types.
pub mod channels {
    pub use rcbridge_channels::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use rcbridge_session::*;
}
