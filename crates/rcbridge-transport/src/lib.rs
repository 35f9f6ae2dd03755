//! Link abstraction for talking to a remote-control bridge.
//!
//! Provides a unified byte stream over the endpoints a host uses to reach
//! an embedded bridge:
//! - Serial devices (USB-UART adapters, CDC-ACM boards)
//! - Unix domain sockets (relay processes, simulators)
//!
//! This is the lowest layer of rcbridge. Everything else builds on top of
//! the [`Link`] type provided here.

pub mod endpoint;
pub mod error;
pub mod link;
pub mod ports;
pub mod serial;

#[cfg(unix)]
pub mod unix;

pub use endpoint::{Endpoint, DEFAULT_BAUD_RATE, UNIX_SCHEME};
pub use error::{Result, TransportError};
pub use link::{is_timeout, Link};
pub use ports::{list_ports, PortInfo, PortKind};
