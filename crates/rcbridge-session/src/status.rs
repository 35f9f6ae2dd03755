use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use rcbridge_channels::Packet;
use rcbridge_frame::{encode_csv, DecodeStats, Inbound, RCPayload, WireFormat};
use serde::Serialize;

/// Lifecycle of a session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Opening,
    Open,
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Opening => "opening",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
        }
    }
}

/// The most recent payload written to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentRecord {
    /// The packet it was built from, when sent through channel mapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packet: Option<Packet>,
    pub payload: RCPayload,
    pub format: WireFormat,
    /// The frame as written: the text line for CSV/JSON, hex for binary.
    pub raw: String,
    /// Milliseconds since the Unix epoch.
    pub sent_at: u64,
}

/// The most recent payload decoded from the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReceivedRecord {
    pub payload: RCPayload,
    /// Milliseconds since the Unix epoch.
    pub received_at: u64,
}

/// One inbound line kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundLine {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub line: String,
}

/// Point-in-time view of a session for status observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub port: String,
    pub baud: Option<u32>,
    pub state: SessionState,
    pub last_packet: Option<SentRecord>,
    pub last_received: Option<ReceivedRecord>,
    pub last_error: Option<String>,
    pub frames_decoded: u64,
    pub frames_dropped: u64,
    pub recent_inbound_lines: Vec<InboundLine>,
}

/// Mutable status shared between the reader thread and callers.
#[derive(Debug)]
pub(crate) struct StatusCache {
    pub(crate) state: SessionState,
    pub(crate) last_packet: Option<SentRecord>,
    pub(crate) last_received: Option<ReceivedRecord>,
    pub(crate) last_error: Option<String>,
    pub(crate) stats: DecodeStats,
    lines: VecDeque<InboundLine>,
    capacity: usize,
}

impl StatusCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: SessionState::Opening,
            last_packet: None,
            last_received: None,
            last_error: None,
            stats: DecodeStats::default(),
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Record one inbound item: log its text and remember any payload.
    pub(crate) fn record_inbound(&mut self, item: &Inbound) {
        let now = unix_millis();
        let line = match item {
            Inbound::Payload { payload } => {
                self.last_received = Some(ReceivedRecord {
                    payload: *payload,
                    received_at: now,
                });
                encode_csv(payload)
            }
            Inbound::Message { message } => {
                if let Some(payload) = message.payload() {
                    self.last_received = Some(ReceivedRecord {
                        payload: *payload,
                        received_at: now,
                    });
                }
                serde_json::to_string(message.body()).unwrap_or_default()
            }
            Inbound::Text { line } => line.clone(),
        };
        self.push_line(now, line);
    }

    fn push_line(&mut self, timestamp: u64, line: String) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(InboundLine { timestamp, line });
    }

    /// Latch a fatal error and move to `Closed`.
    pub(crate) fn fail(&mut self, message: String) {
        self.state = SessionState::Closed;
        self.last_error = Some(message);
    }

    pub(crate) fn snapshot(&self, port: &str, baud: Option<u32>) -> StatusSnapshot {
        StatusSnapshot {
            port: port.to_string(),
            baud,
            state: self.state,
            last_packet: self.last_packet.clone(),
            last_received: self.last_received,
            last_error: self.last_error.clone(),
            frames_decoded: self.stats.frames,
            frames_dropped: self.stats.dropped,
            recent_inbound_lines: self.lines.iter().cloned().collect(),
        }
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Render written bytes for display.
pub(crate) fn render_raw(format: WireFormat, wire: &[u8]) -> String {
    match format {
        WireFormat::Binary => wire.iter().map(|b| format!("{b:02x}")).collect(),
        WireFormat::Csv | WireFormat::Json => String::from_utf8_lossy(wire).trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_log_is_bounded() {
        let mut cache = StatusCache::new(3);
        for i in 0..10 {
            cache.record_inbound(&Inbound::Text {
                line: format!("line {i}"),
            });
        }
        let snapshot = cache.snapshot("pair:host", None);
        let lines: Vec<&str> = snapshot
            .recent_inbound_lines
            .iter()
            .map(|l| l.line.as_str())
            .collect();
        assert_eq!(lines, vec!["line 7", "line 8", "line 9"]);
    }

    #[test]
    fn payloads_update_last_received() {
        let mut cache = StatusCache::new(8);
        let payload = RCPayload::new([1, 2, 3, 4], [0.5, 0.0, 0.0, 0.0, 0.0], 2);
        cache.record_inbound(&Inbound::Payload { payload });

        let snapshot = cache.snapshot("/dev/ttyUSB0", Some(115_200));
        assert_eq!(snapshot.last_received.unwrap().payload, payload);
        assert_eq!(
            snapshot.recent_inbound_lines[0].line,
            "1,2,3,4,0.50,0.00,0.00,0.00,0.00,2"
        );
        assert_eq!(snapshot.baud, Some(115_200));
    }

    #[test]
    fn fail_latches_error_and_closes() {
        let mut cache = StatusCache::new(1);
        cache.state = SessionState::Open;
        cache.fail("link closed by peer".to_string());
        let snapshot = cache.snapshot("x", None);
        assert_eq!(snapshot.state, SessionState::Closed);
        assert_eq!(snapshot.last_error.as_deref(), Some("link closed by peer"));
    }

    #[test]
    fn raw_rendering() {
        assert_eq!(render_raw(WireFormat::Binary, &[0x0c, 0xff]), "0cff");
        assert_eq!(render_raw(WireFormat::Csv, b"1,2\n"), "1,2");
    }
}
