use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use rcbridge_channels::Packet;
use rcbridge_frame::{
    BridgeCommand, FrameConfig, FrameError, FrameReader, FrameWriter, Framing, Inbound, RCPayload,
    WireFormat,
};
use rcbridge_transport::{Endpoint, Link};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SessionError};
use crate::status::{render_raw, unix_millis, SentRecord, SessionState, StatusCache, StatusSnapshot};

/// Callback run once when a session closes.
pub type CloseHook = Box<dyn FnOnce() + Send>;

/// Runtime knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause after opening so the bridge can finish its reset-on-connect.
    pub settle_delay: Duration,
    /// Read timeout of the reader thread; bounds how long close waits for it
    /// to notice the stop signal.
    pub poll_interval: Duration,
    /// How long close waits for the reader thread before detaching it.
    pub join_timeout: Duration,
    /// Write timeout on the link.
    pub write_timeout: Duration,
    /// Inbound items buffered for the consumer before new ones are dropped.
    pub inbound_capacity: usize,
    /// Inbound lines kept for status snapshots.
    pub log_capacity: usize,
    /// How inbound bytes are cut into frames.
    pub framing: Framing,
    /// Encoding used for outbound payloads.
    pub wire_format: WireFormat,
    /// Line length cap and float precision.
    pub frame: FrameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
            join_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            inbound_capacity: 256,
            log_capacity: 200,
            framing: Framing::default(),
            wire_format: WireFormat::default(),
            frame: FrameConfig::default(),
        }
    }
}

/// Something a [`crate::SendScheduler`] can deliver packets to.
pub trait PacketTarget: Send + Sync {
    /// True while sends can succeed.
    fn is_open(&self) -> bool;

    /// Encode and write one packet.
    fn send_packet(&self, packet: &Packet) -> Result<SentRecord>;

    /// Register a hook run once when the target closes.
    fn on_close(&self, hook: CloseHook);
}

struct ReaderHandle {
    thread: JoinHandle<()>,
    done: Receiver<()>,
}

/// State reachable from both the caller side and the reader thread.
struct Shared {
    port: String,
    writer: Mutex<Option<FrameWriter<Link>>>,
    status: Mutex<StatusCache>,
    stop: AtomicBool,
    closed: AtomicBool,
    close_hooks: Mutex<Vec<CloseHook>>,
}

impl Shared {
    fn is_open(&self) -> bool {
        lock(&self.status).state == SessionState::Open
    }

    /// Move to `Closed`, release the link and run close hooks.
    ///
    /// Runs once; later calls return false. `error` is latched as the last
    /// error. Callers must not hold the writer or status lock.
    fn shut_down(&self, error: Option<String>) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.stop.store(true, Ordering::SeqCst);
        {
            let mut status = lock(&self.status);
            match error {
                Some(message) => status.fail(message),
                None => status.state = SessionState::Closed,
            }
        }

        lock(&self.writer).take();

        let hooks = std::mem::take(&mut *lock(&self.close_hooks));
        for hook in hooks {
            hook();
        }
        true
    }
}

/// An open connection to one bridge.
///
/// One background thread owns the receive side and is the only producer of
/// inbound items; writes from any number of callers are serialized behind a
/// single lock. A transport failure on either side latches the error,
/// releases the link and runs the close hooks, leaving the session `Closed`.
pub struct Session {
    port: String,
    baud: Option<u32>,
    config: SessionConfig,
    shared: Arc<Shared>,
    reader: Mutex<Option<ReaderHandle>>,
    inbound: Mutex<Option<Receiver<Inbound>>>,
}

impl Session {
    /// Open an endpoint and start the reader thread.
    pub fn open(endpoint: &Endpoint, config: SessionConfig) -> Result<Self> {
        info!(endpoint = %endpoint, "opening session");
        let link = endpoint.open(config.poll_interval)?;
        Self::from_link(link, config)
    }

    /// Start a session on an already opened link.
    pub fn from_link(mut link: Link, config: SessionConfig) -> Result<Self> {
        let port = link.name().to_string();
        let baud = link.baud_rate();

        if !config.settle_delay.is_zero() {
            debug!(port = %port, delay = ?config.settle_delay, "waiting for bridge reset");
            thread::sleep(config.settle_delay);
        }
        link.clear_input()?;

        let reader_link = link.try_clone()?;
        let reader = FrameReader::with_link(
            reader_link,
            config.framing.clone(),
            FrameConfig {
                read_timeout: Some(config.poll_interval),
                ..config.frame.clone()
            },
        )?;
        let writer = FrameWriter::with_link(
            link,
            FrameConfig {
                write_timeout: Some(config.write_timeout),
                ..config.frame.clone()
            },
        )?;

        let shared = Arc::new(Shared {
            port: port.clone(),
            writer: Mutex::new(Some(writer)),
            status: Mutex::new(StatusCache::new(config.log_capacity)),
            stop: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_hooks: Mutex::new(Vec::new()),
        });
        let (inbound_tx, inbound_rx) = mpsc::sync_channel(config.inbound_capacity.max(1));
        let (done_tx, done_rx) = mpsc::channel();

        let thread = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("rcbridge-reader".to_string())
                .spawn(move || reader_loop(reader, inbound_tx, &shared, done_tx))
                .map_err(|source| SessionError::Spawn {
                    name: "reader",
                    source,
                })?
        };

        lock(&shared.status).state = SessionState::Open;
        info!(port = %port, framing = config.framing.name(), "session open");

        Ok(Self {
            port,
            baud,
            config,
            shared,
            reader: Mutex::new(Some(ReaderHandle {
                thread,
                done: done_rx,
            })),
            inbound: Mutex::new(Some(inbound_rx)),
        })
    }

    /// Endpoint name.
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        lock(&self.shared.status).state
    }

    /// True while the session can send.
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Take the inbound item receiver. Returns `None` after the first call.
    ///
    /// Items arriving while the receiver is full (or never taken) are
    /// dropped; the status snapshot still records them.
    pub fn take_inbound(&self) -> Option<Receiver<Inbound>> {
        lock(&self.inbound).take()
    }

    /// Send a packet built by channel mapping.
    pub fn send_packet(&self, packet: &Packet) -> Result<SentRecord> {
        self.send_encoded(Some(packet), &packet.payload)
    }

    /// Encode and write one payload in the configured wire format.
    pub fn send_payload(&self, payload: &RCPayload) -> Result<SentRecord> {
        self.send_encoded(None, payload)
    }

    /// Write a control command as a JSON line.
    pub fn send_command(&self, command: &BridgeCommand) -> Result<String> {
        let line = self.with_writer(|writer| writer.write_command(command))?;
        debug!(port = %self.port, cmd = command.name(), "command sent");
        Ok(line)
    }

    fn send_encoded(&self, packet: Option<&Packet>, payload: &RCPayload) -> Result<SentRecord> {
        let format = self.config.wire_format;
        let wire: Bytes = self.with_writer(|writer| writer.send_payload(payload, format))?;
        let record = SentRecord {
            packet: packet.cloned(),
            payload: *payload,
            format,
            raw: render_raw(format, &wire),
            sent_at: unix_millis(),
        };
        trace!(port = %self.port, raw = %record.raw, "payload sent");
        lock(&self.shared.status).last_packet = Some(record.clone());
        Ok(record)
    }

    /// Run `op` under the write lock. An I/O failure closes the session.
    fn with_writer<R>(
        &self,
        op: impl FnOnce(&mut FrameWriter<Link>) -> rcbridge_frame::Result<R>,
    ) -> Result<R> {
        let mut guard = lock(&self.shared.writer);
        if !self.shared.is_open() {
            return Err(SessionError::NotConnected);
        }
        let Some(writer) = guard.as_mut() else {
            return Err(SessionError::NotConnected);
        };

        match op(writer) {
            Ok(value) => Ok(value),
            Err(err) => {
                if matches!(err, FrameError::Io(_) | FrameError::ConnectionClosed) {
                    warn!(port = %self.port, error = %err, "write failed, closing session");
                    *guard = None;
                    drop(guard);
                    self.shared.shut_down(Some(format!("write failed: {err}")));
                }
                Err(err.into())
            }
        }
    }

    /// Current status for observers.
    pub fn status(&self) -> StatusSnapshot {
        lock(&self.shared.status).snapshot(&self.port, self.baud)
    }

    /// Stop the reader, release the link and run close hooks.
    ///
    /// Idempotent, and also completes a session already closed by a
    /// transport failure by joining its reader. Safe to call while another
    /// thread is sending; the in-flight write finishes (bounded by the write
    /// timeout) first.
    pub fn close(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        {
            let mut status = lock(&self.shared.status);
            if status.state == SessionState::Open {
                status.state = SessionState::Closed;
            }
        }

        if let Some(handle) = lock(&self.reader).take() {
            match handle.done.recv_timeout(self.config.join_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if handle.thread.join().is_err() {
                        warn!(port = %self.port, "reader thread panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        port = %self.port,
                        timeout = ?self.config.join_timeout,
                        "reader thread did not stop in time, detaching"
                    );
                }
            }
        }

        if self.shared.shut_down(None) {
            info!(port = %self.port, "session closed");
        }
    }
}

impl PacketTarget for Session {
    fn is_open(&self) -> bool {
        Session::is_open(self)
    }

    fn send_packet(&self, packet: &Packet) -> Result<SentRecord> {
        Session::send_packet(self, packet)
    }

    fn on_close(&self, hook: CloseHook) {
        let mut hooks = lock(&self.shared.close_hooks);
        // Checked under the hook lock so a concurrent shutdown cannot miss it.
        if self.shared.closed.load(Ordering::SeqCst) {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(hook);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("port", &self.port)
            .field("baud", &self.baud)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn reader_loop(
    mut reader: FrameReader<Link>,
    inbound: SyncSender<Inbound>,
    shared: &Shared,
    done: mpsc::Sender<()>,
) {
    debug!(link = %reader.get_ref().name(), "reader thread started");
    while !shared.stop.load(Ordering::SeqCst) {
        match reader.read_next() {
            Ok(Some(item)) => {
                {
                    let mut cache = lock(&shared.status);
                    cache.record_inbound(&item);
                    cache.stats = reader.stats();
                }
                match inbound.try_send(item) {
                    Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                    Err(TrySendError::Full(_)) => {
                        trace!("inbound queue full, item dropped");
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                if !shared.stop.load(Ordering::SeqCst) {
                    warn!(port = %shared.port, error = %err, "read failed, closing session");
                    lock(&shared.status).stats = reader.stats();
                    shared.shut_down(Some(format!("read failed: {err}")));
                }
                break;
            }
        }
    }
    lock(&shared.status).stats = reader.stats();
    debug!("reader thread stopped");
    let _ = done.send(());
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::time::Instant;

    use rcbridge_channels::{ChannelConfig, NamedValues};
    use rcbridge_frame::{encode_binary, BridgeMessage, PAYLOAD_SIZE};

    use super::*;
    use crate::{SchedulerConfig, SendMode, SendScheduler};

    fn quick_config(framing: Framing, wire_format: WireFormat) -> SessionConfig {
        SessionConfig {
            settle_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(20),
            framing,
            wire_format,
            ..SessionConfig::default()
        }
    }

    fn open_pair(framing: Framing, wire_format: WireFormat) -> (Session, Link) {
        let (host, bridge) = Link::pair().expect("link pair");
        let session = Session::from_link(host, quick_config(framing, wire_format))
            .expect("session should open");
        (session, bridge)
    }

    fn read_line(link: &mut Link) -> String {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            link.read_exact(&mut byte).expect("bridge should read");
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        String::from_utf8(line).expect("utf-8 line")
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn sends_csv_and_records_last_packet() {
        let (session, mut bridge) = open_pair(Framing::csv(), WireFormat::Csv);
        let channels = ChannelConfig::from_json_str(
            r#"{"bytes":[{"key":"a","default":12}],"flags":[{"key":"arm","default":true}]}"#,
        )
        .expect("channels");
        let packet = channels
            .build_packet(&NamedValues::new())
            .expect("packet");

        let record = session.send_packet(&packet).expect("send should succeed");
        assert_eq!(record.raw, "12,0,0,0,0.00,0.00,0.00,0.00,0.00,1");
        assert_eq!(read_line(&mut bridge), record.raw);

        let status = session.status();
        assert_eq!(status.state, SessionState::Open);
        assert_eq!(status.port, "pair:host");
        assert_eq!(status.last_packet.expect("last packet").raw, record.raw);
    }

    #[test]
    fn settle_discards_boot_noise() {
        let (host, mut bridge) = Link::pair().expect("link pair");
        bridge
            .write_all(b"ets Jun  8 2016 00:22:57\r\nrst:0x1 (POWERON_RESET)\r\n")
            .expect("bridge write");

        let session = Session::from_link(
            host,
            SessionConfig {
                settle_delay: Duration::from_millis(20),
                ..quick_config(Framing::Json, WireFormat::Json)
            },
        )
        .expect("session should open");
        let inbound = session.take_inbound().expect("receiver");
        assert!(session.take_inbound().is_none());

        bridge.write_all(b"{\"status\":\"ok\"}\n").expect("bridge write");
        let item = inbound
            .recv_timeout(Duration::from_secs(2))
            .expect("inbound item");
        assert!(matches!(
            item,
            Inbound::Message {
                message: BridgeMessage::Status { .. }
            }
        ));
        assert!(inbound.try_recv().is_err());
    }

    #[test]
    fn reader_decodes_binary_and_updates_status() {
        let (session, mut bridge) = open_pair(Framing::Binary, WireFormat::Binary);
        let inbound = session.take_inbound().expect("receiver");
        let payload = RCPayload::new([1, 2, 3, 4], [1.0, 2.0, 3.0, 4.0, 5.0], 9);
        let wire = encode_binary(&payload);

        bridge.write_all(&wire[..10]).expect("bridge write");
        bridge.flush().expect("flush");
        thread::sleep(Duration::from_millis(30));
        bridge.write_all(&wire[10..PAYLOAD_SIZE]).expect("bridge write");

        let item = inbound
            .recv_timeout(Duration::from_secs(2))
            .expect("inbound item");
        assert_eq!(item, Inbound::Payload { payload });
        assert!(wait_until(|| session.status().last_received.is_some()));
        assert_eq!(session.status().frames_decoded, 1);
    }

    #[test]
    fn send_commands_as_json_lines() {
        let (session, mut bridge) = open_pair(Framing::Json, WireFormat::Json);
        session
            .send_command(&BridgeCommand::Switch {
                protocol: rcbridge_frame::RadioProtocol::Nrf24,
            })
            .expect("command should send");
        assert_eq!(
            read_line(&mut bridge),
            r#"{"cmd":"switch","protocol":"nrf24"}"#
        );
    }

    #[test]
    fn closed_session_rejects_sends() {
        let (session, _bridge) = open_pair(Framing::Json, WireFormat::Json);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);

        let payload = RCPayload::default();
        assert!(matches!(
            session.send_payload(&payload),
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(
            session.send_command(&BridgeCommand::Status),
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn close_is_idempotent_and_runs_hooks_once() {
        let (session, _bridge) = open_pair(Framing::Json, WireFormat::Json);
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            session.on_close(Box::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let started = Instant::now();
        session.close();
        session.close();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let late = Arc::new(AtomicBool::new(false));
        {
            let late = Arc::clone(&late);
            session.on_close(Box::new(move || late.store(true, Ordering::SeqCst)));
        }
        assert!(late.load(Ordering::SeqCst));
    }

    #[test]
    fn bridge_hangup_closes_session() {
        let (session, bridge) = open_pair(Framing::Json, WireFormat::Json);
        drop(bridge);

        assert!(wait_until(|| session.state() == SessionState::Closed));
        assert!(session
            .status()
            .last_error
            .expect("error latched")
            .contains("read failed"));
        assert!(matches!(
            session.send_payload(&RCPayload::default()),
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn bridge_hangup_cancels_pending_auto_send() {
        let (session, bridge) = open_pair(Framing::Json, WireFormat::Json);
        let session = Arc::new(session);
        let channels = Arc::new(
            ChannelConfig::from_json_str(r#"{"floats":[{"key":"speed","min":0,"max":100}]}"#)
                .expect("channels"),
        );
        let scheduler = SendScheduler::new(
            Arc::clone(&session) as Arc<dyn PacketTarget>,
            channels,
            SchedulerConfig {
                mode: SendMode::Auto,
                debounce: Duration::from_secs(10),
            },
        )
        .expect("scheduler");

        scheduler.set_value("speed", 40.0).expect("value accepted");
        assert!(scheduler.has_pending());

        drop(bridge);
        assert!(wait_until(|| !scheduler.has_pending()));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            scheduler.set_value("speed", 50.0),
            Err(SessionError::NotConnected)
        ));
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn write_failure_closes_session() {
        let (host, _bridge) = Link::pair().expect("link pair");
        let session = Session::from_link(
            host,
            SessionConfig {
                write_timeout: Duration::from_millis(100),
                ..quick_config(Framing::Json, WireFormat::Json)
            },
        )
        .expect("session should open");
        let hook_ran = Arc::new(AtomicBool::new(false));
        {
            let hook_ran = Arc::clone(&hook_ran);
            session.on_close(Box::new(move || hook_ran.store(true, Ordering::SeqCst)));
        }

        // The peer never reads, so the socket buffer fills and a write times out.
        let payload = RCPayload::new([1, 2, 3, 4], [1.5; 5], 3);
        let deadline = Instant::now() + Duration::from_secs(10);
        let err = loop {
            match session.send_payload(&payload) {
                Ok(_) => assert!(Instant::now() < deadline, "writes never blocked"),
                Err(err) => break err,
            }
        };

        assert!(
            matches!(err, SessionError::Frame(FrameError::Io(_))),
            "unexpected error: {err:?}"
        );
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session
            .status()
            .last_error
            .expect("error latched")
            .contains("write failed"));
        assert!(hook_ran.load(Ordering::SeqCst));
        assert!(matches!(
            session.send_payload(&payload),
            Err(SessionError::NotConnected)
        ));

        let started = Instant::now();
        session.close();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn concurrent_sends_do_not_interleave() {
        let (session, mut bridge) = open_pair(Framing::Csv { prefix: "RX:".into() }, WireFormat::Csv);
        let session = Arc::new(session);

        let senders: Vec<_> = (0..4u8)
            .map(|n| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    for _ in 0..25 {
                        let payload = RCPayload::new([n; 4], [f32::from(n); 5], n);
                        session.send_payload(&payload).expect("send should succeed");
                    }
                })
            })
            .collect();

        let mut lines = Vec::new();
        for _ in 0..100 {
            lines.push(read_line(&mut bridge));
        }
        for sender in senders {
            sender.join().expect("sender thread");
        }

        for line in lines {
            let payload = rcbridge_frame::decode_csv(&line).expect("whole frame");
            let n = payload.id1;
            assert_eq!(payload.ids(), [n; 4]);
            assert_eq!(payload.flags, n);
        }
    }
}
