//! Incremental inbound decoding.
//!
//! [`FrameDecoder`] accepts arbitrary chunks of bytes as they arrive from a
//! link and emits whole frames. It never buffers more than one partial frame:
//! at most 24 bytes for binary framing, at most `max_line_len` bytes for the
//! line framings. Overlong lines are skipped up to the next newline.

use bytes::BytesMut;
use serde::Serialize;
use tracing::{debug, trace};

use crate::codec::{decode_binary, decode_csv, FrameConfig};
use crate::command::BridgeMessage;
use crate::format::Framing;
use crate::payload::{RCPayload, PAYLOAD_SIZE};

/// One decoded unit of inbound traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    /// A payload from a binary or CSV frame.
    Payload { payload: RCPayload },
    /// A routed JSON object.
    Message { message: BridgeMessage },
    /// A line that is not a frame: firmware logs, banners, malformed input.
    Text { line: String },
}

/// Running counters for a decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Frames decoded successfully.
    pub frames: u64,
    /// Frames dropped as malformed or overlong.
    pub dropped: u64,
}

/// Incremental frame decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    max_line_len: usize,
    buf: BytesMut,
    discarding: bool,
    stats: DecodeStats,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self::with_config(framing, &FrameConfig::default())
    }

    pub fn with_config(framing: Framing, config: &FrameConfig) -> Self {
        let max_line_len = config.max_line_len.max(1);
        let capacity = if framing.is_line_based() {
            max_line_len.min(4096)
        } else {
            PAYLOAD_SIZE
        };
        Self {
            framing,
            max_line_len,
            buf: BytesMut::with_capacity(capacity),
            discarding: false,
            stats: DecodeStats::default(),
        }
    }

    pub fn framing(&self) -> &Framing {
        &self.framing
    }

    /// Bytes currently held as an incomplete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Feed a chunk and append every completed frame to `out`.
    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<Inbound>) {
        if self.framing.is_line_based() {
            self.push_lines(chunk, out);
        } else {
            self.push_binary(chunk, out);
        }
    }

    fn push_binary(&mut self, mut chunk: &[u8], out: &mut Vec<Inbound>) {
        while !chunk.is_empty() {
            let want = PAYLOAD_SIZE - self.buf.len();
            let take = want.min(chunk.len());
            self.buf.extend_from_slice(&chunk[..take]);
            chunk = &chunk[take..];

            if self.buf.len() == PAYLOAD_SIZE {
                let frame = self.buf.split_to(PAYLOAD_SIZE);
                match decode_binary(&frame) {
                    Ok(payload) => {
                        self.stats.frames += 1;
                        out.push(Inbound::Payload { payload });
                    }
                    Err(err) => {
                        self.stats.dropped += 1;
                        debug!(error = %err, "dropped binary frame");
                    }
                }
            }
        }
    }

    fn push_lines(&mut self, mut chunk: &[u8], out: &mut Vec<Inbound>) {
        while !chunk.is_empty() {
            let newline = chunk.iter().position(|b| *b == b'\n');
            let (head, rest, complete) = match newline {
                Some(pos) => (&chunk[..pos], &chunk[pos + 1..], true),
                None => (chunk, &chunk[chunk.len()..], false),
            };
            chunk = rest;

            if self.discarding {
                if complete {
                    self.discarding = false;
                }
                continue;
            }

            if self.buf.len() + head.len() > self.max_line_len {
                self.stats.dropped += 1;
                debug!(
                    limit = self.max_line_len,
                    buffered = self.buf.len() + head.len(),
                    "dropped overlong line"
                );
                self.buf.clear();
                self.discarding = !complete;
                continue;
            }

            self.buf.extend_from_slice(head);
            if complete {
                let line = self.buf.split();
                self.decode_line(&line, out);
            }
        }
    }

    fn decode_line(&mut self, raw: &[u8], out: &mut Vec<Inbound>) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() {
            return;
        }
        trace!(line, "inbound line");

        match &self.framing {
            Framing::Csv { prefix } => match line.strip_prefix(prefix.as_str()) {
                Some(body) => match decode_csv(body) {
                    Ok(payload) => {
                        self.stats.frames += 1;
                        out.push(Inbound::Payload { payload });
                    }
                    Err(err) => {
                        self.stats.dropped += 1;
                        debug!(error = %err, line, "dropped CSV frame");
                        out.push(Inbound::Text {
                            line: line.to_string(),
                        });
                    }
                },
                None => out.push(Inbound::Text {
                    line: line.to_string(),
                }),
            },
            Framing::Json => match BridgeMessage::parse_line(line) {
                Ok(message) => {
                    self.stats.frames += 1;
                    out.push(Inbound::Message { message });
                }
                Err(err) => {
                    if line.starts_with('{') {
                        self.stats.dropped += 1;
                        debug!(error = %err, line, "dropped JSON frame");
                    }
                    out.push(Inbound::Text {
                        line: line.to_string(),
                    });
                }
            },
            Framing::Binary => {}
        }
    }
}
