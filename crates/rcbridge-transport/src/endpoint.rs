use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::link::Link;

/// Default serial baud rate used by the bridge firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Prefix selecting a Unix domain socket endpoint.
pub const UNIX_SCHEME: &str = "unix:";

/// Where a session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A serial device path (`/dev/ttyUSB0`, `COM3`).
    Serial { path: String, baud: u32 },
    /// A Unix domain socket served by a relay process or simulator.
    Unix(PathBuf),
}

impl Endpoint {
    /// Parse an endpoint string.
    ///
    /// `unix:<path>` selects a Unix socket; anything else is a serial
    /// device opened at `baud`.
    pub fn parse(text: &str, baud: u32) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TransportError::InvalidEndpoint(text.to_string()));
        }
        if let Some(path) = text.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(text.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if baud == 0 {
            return Err(TransportError::InvalidEndpoint(format!(
                "{text} (baud rate must be non-zero)"
            )));
        }
        Ok(Self::Serial {
            path: text.to_string(),
            baud,
        })
    }

    /// Open the endpoint. `timeout` bounds blocking reads on serial links.
    pub fn open(&self, timeout: Duration) -> Result<Link> {
        match self {
            Self::Serial { path, baud } => crate::serial::open_serial(path, *baud, timeout),
            #[cfg(unix)]
            Self::Unix(path) => crate::unix::connect(path),
            #[cfg(not(unix))]
            Self::Unix(path) => Err(TransportError::Open {
                endpoint: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix socket endpoints require a Unix platform",
                ),
            }),
        }
    }

    /// Baud rate for serial endpoints.
    pub fn baud(&self) -> Option<u32> {
        match self {
            Self::Serial { baud, .. } => Some(*baud),
            Self::Unix(_) => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { path, .. } => write!(f, "{path}"),
            Self::Unix(path) => write!(f, "{UNIX_SCHEME}{}", path.display()),
        }
    }
}
