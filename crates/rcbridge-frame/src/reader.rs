use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use rcbridge_transport::{is_timeout, Link, TransportError};

use crate::codec::FrameConfig;
use crate::decoder::{DecodeStats, FrameDecoder, Inbound};
use crate::error::{FrameError, Result};
use crate::format::Framing;

const READ_CHUNK_SIZE: usize = 512;

/// Reads decoded frames from any `Read` stream.
///
/// Handles partial reads internally: callers get whole payloads, routed
/// JSON messages, or free-form text lines.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    pending: VecDeque<Inbound>,
    scratch: Vec<Inbound>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T, framing: Framing) -> Self {
        Self::with_config(inner, framing, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, framing: Framing, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::with_config(framing, &config),
            pending: VecDeque::new(),
            scratch: Vec::new(),
            config,
        }
    }

    /// Read until one inbound item is available.
    ///
    /// Returns `Ok(None)` when the underlying read times out, so a polling
    /// caller can check for shutdown. Returns
    /// `Err(FrameError::ConnectionClosed)` at EOF.
    pub fn read_next(&mut self) -> Result<Option<Inbound>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(Some(item));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Ok(None),
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.decoder.push(&chunk[..read], &mut self.scratch);
            self.pending.extend(self.scratch.drain(..));
        }
    }

    /// Read the next inbound item, waiting through read timeouts.
    pub fn read_inbound(&mut self) -> Result<Inbound> {
        loop {
            if let Some(item) = self.read_next()? {
                return Ok(item);
            }
        }
    }

    /// Decoded and dropped frame counts so far.
    pub fn stats(&self) -> DecodeStats {
        self.decoder.stats()
    }

    pub fn framing(&self) -> &Framing {
        self.decoder.framing()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<Link> {
    /// Create a frame reader for a `Link` and apply the read timeout from config.
    pub fn with_link(mut inner: Link, framing: Framing, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, framing, config))
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) => FrameError::Io(io),
        TransportError::Open { source, .. } => FrameError::Io(source),
        TransportError::Serial(serial) => FrameError::Io(serial.into()),
        TransportError::ConnectionClosed => FrameError::ConnectionClosed,
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
