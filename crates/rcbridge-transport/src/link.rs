use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::debug;

use crate::error::Result;

/// Timeout used for serial handles when the caller asks for "no timeout".
const BLOCKING_SERIAL_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// A connected link to a bridge. Implements `Read` and `Write`.
///
/// This is the fundamental I/O type returned by endpoint operations.
/// A serial link wraps an exclusively opened serial device; on Unix a
/// link may also wrap a Unix domain socket stream.
pub struct Link {
    inner: LinkInner,
    name: String,
}

enum LinkInner {
    Serial(Box<dyn SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for Link {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Link {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.flush(),
        }
    }
}

impl Link {
    /// Create a link from an opened serial port.
    pub fn from_serial(port: Box<dyn SerialPort>) -> Self {
        let name = port.name().unwrap_or_else(|| "serial".to_string());
        Self {
            inner: LinkInner::Serial(port),
            name,
        }
    }

    /// Create a link from a connected Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream, name: impl Into<String>) -> Self {
        Self {
            inner: LinkInner::Unix(stream),
            name: name.into(),
        }
    }

    /// A connected in-memory pair of links (Unix only).
    ///
    /// Used to stand in for a bridge without hardware.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((
            Self::from_unix(left, "pair:host"),
            Self::from_unix(right, "pair:bridge"),
        ))
    }

    /// Endpoint name for diagnostics and status reporting.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured baud rate, if this is a serial link.
    pub fn baud_rate(&self) -> Option<u32> {
        match &self.inner {
            LinkInner::Serial(port) => port.baud_rate().ok(),
            #[cfg(unix)]
            LinkInner::Unix(_) => None,
        }
    }

    /// Set the read timeout on this handle.
    ///
    /// Serial handles share one timeout for reads and writes.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            LinkInner::Serial(port) => {
                port.set_timeout(timeout.unwrap_or(BLOCKING_SERIAL_TIMEOUT))?;
                Ok(())
            }
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set the write timeout on this handle.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            LinkInner::Serial(port) => {
                port.set_timeout(timeout.unwrap_or(BLOCKING_SERIAL_TIMEOUT))?;
                Ok(())
            }
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this link (creates a new OS handle to the same endpoint).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            LinkInner::Serial(port) => LinkInner::Serial(port.try_clone()?),
            #[cfg(unix)]
            LinkInner::Unix(stream) => LinkInner::Unix(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            name: self.name.clone(),
        })
    }

    /// Discard any bytes the OS has already buffered on the input side.
    pub fn clear_input(&mut self) -> Result<()> {
        match &mut self.inner {
            LinkInner::Serial(port) => {
                let pending = port.bytes_to_read().unwrap_or(0);
                port.clear(ClearBuffer::Input)?;
                debug!(link = %self.name, bytes = pending, "discarded buffered input");
                Ok(())
            }
            #[cfg(unix)]
            LinkInner::Unix(stream) => {
                stream.set_nonblocking(true)?;
                let mut discarded = 0usize;
                let mut chunk = [0u8; 1024];
                let result = loop {
                    match stream.read(&mut chunk) {
                        Ok(0) => break Ok(()),
                        Ok(n) => discarded += n,
                        Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                        Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(()),
                        Err(err) => break Err(err),
                    }
                };
                stream.set_nonblocking(false)?;
                debug!(link = %self.name, bytes = discarded, "discarded buffered input");
                result.map_err(Into::into)
            }
        }
    }
}

/// True if `err` is the result of a read/write timeout rather than a failure.
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            LinkInner::Serial(_) => "serial",
            #[cfg(unix)]
            LinkInner::Unix(_) => "unix",
        };
        f.debug_struct("Link")
            .field("type", &kind)
            .field("name", &self.name)
            .finish()
    }
}
