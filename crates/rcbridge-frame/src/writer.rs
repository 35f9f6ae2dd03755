use std::io::{ErrorKind, Write};

use bytes::Bytes;
use rcbridge_transport::Link;
use tracing::trace;

use crate::codec::{encode_wire, FrameConfig};
use crate::command::BridgeCommand;
use crate::error::{FrameError, Result};
use crate::format::WireFormat;
use crate::payload::RCPayload;
use crate::reader::transport_to_frame_error;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Encode and send one payload. Returns the exact bytes written.
    pub fn send_payload(&mut self, payload: &RCPayload, format: WireFormat) -> Result<Bytes> {
        let wire = encode_wire(payload, format, self.config.float_precision)?;
        self.write_bytes(&wire)?;
        trace!(format = %format, bytes = wire.len(), "payload written");
        Ok(wire)
    }

    /// Send a bridge command as one JSON line. Returns the line written,
    /// without its newline.
    pub fn write_command(&mut self, command: &BridgeCommand) -> Result<String> {
        let line = command.to_line()?;
        let mut wire = Vec::with_capacity(line.len() + 1);
        wire.extend_from_slice(line.as_bytes());
        wire.push(b'\n');
        self.write_bytes(&wire)?;
        trace!(cmd = command.name(), "command written");
        Ok(line)
    }

    /// Write a fully encoded frame and flush.
    ///
    /// With a write timeout configured, a blocked write (`WouldBlock` or
    /// `TimedOut`) is an error; without one it is retried.
    pub fn write_bytes(&mut self, wire: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < wire.len() {
            match self.inner.write(&wire[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if self.should_retry(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if self.should_retry(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn should_retry(&self, err: &std::io::Error) -> bool {
        match err.kind() {
            ErrorKind::Interrupted => true,
            // Unix sockets report an expired SO_SNDTIMEO as WouldBlock.
            ErrorKind::WouldBlock => self.config.write_timeout.is_none(),
            _ => false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<Link> {
    /// Create a frame writer for a `Link` and apply the write timeout from config.
    pub fn with_link(mut inner: Link, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
