use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rcbridge_channels::{ChannelConfig, ChannelValue, NamedValues};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SessionError};
use crate::session::PacketTarget;
use crate::status::SentRecord;

/// When value changes turn into sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// Only [`SendScheduler::trigger`] sends.
    #[default]
    Manual,
    /// Changes send after the debounce delay; flag changes send at once.
    Auto,
}

impl SendMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SendMode::Manual => "manual",
            SendMode::Auto => "auto",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(SendMode::Manual),
            "auto" => Ok(SendMode::Auto),
            other => Err(format!("unknown send mode '{other}' (expected manual or auto)")),
        }
    }
}

/// Configuration for a [`SendScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub mode: SendMode,
    /// Quiet period after the last change before an auto send fires.
    pub debounce: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: SendMode::Manual,
            debounce: Duration::from_millis(100),
        }
    }
}

#[derive(Debug)]
struct State {
    mode: SendMode,
    values: NamedValues,
    deadline: Option<Instant>,
    shutdown: bool,
    sent: u64,
    last_error: Option<String>,
}

struct Shared {
    target: Arc<dyn PacketTarget>,
    channels: Arc<ChannelConfig>,
    debounce: Duration,
    state: Mutex<State>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) -> bool {
        let cancelled = self.lock().deadline.take().is_some();
        if cancelled {
            self.wake.notify_all();
        }
        cancelled
    }

    /// Build a packet from the current values and hand it to the target.
    fn send_now(&self, reason: &'static str) -> Result<SentRecord> {
        let values = self.lock().values.clone();
        let result = if self.target.is_open() {
            self.channels
                .build_packet(&values)
                .map_err(SessionError::from)
                .and_then(|packet| self.target.send_packet(&packet))
        } else {
            Err(SessionError::NotConnected)
        };

        let mut state = self.lock();
        match &result {
            Ok(record) => {
                state.sent += 1;
                state.last_error = None;
                trace!(reason, raw = %record.raw, "scheduled send");
            }
            Err(err) => {
                state.last_error = Some(err.to_string());
                debug!(reason, error = %err, "send dropped");
            }
        }
        result
    }
}

/// Decides when named-value changes are sent to a [`PacketTarget`].
///
/// In [`SendMode::Manual`] only [`trigger`](Self::trigger) sends. In
/// [`SendMode::Auto`] each non-flag change restarts a trailing-edge timer
/// and a burst of changes produces one send once it settles. Flag changes
/// send immediately. The timer is a single thread per scheduler, woken
/// through a condition variable; a closed target cancels it.
pub struct SendScheduler {
    shared: Arc<Shared>,
    timer: Option<JoinHandle<()>>,
}

impl SendScheduler {
    /// Start a scheduler with every channel at its default value.
    pub fn new(
        target: Arc<dyn PacketTarget>,
        channels: Arc<ChannelConfig>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            target: Arc::clone(&target),
            debounce: config.debounce,
            state: Mutex::new(State {
                mode: config.mode,
                values: channels.default_values(),
                deadline: None,
                shutdown: false,
                sent: 0,
                last_error: None,
            }),
            channels,
            wake: Condvar::new(),
        });

        let timer = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("rcbridge-debounce".to_string())
                .spawn(move || timer_loop(&shared))
                .map_err(|source| SessionError::Spawn {
                    name: "debounce",
                    source,
                })?
        };

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        target.on_close(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                if shared.cancel() {
                    debug!("target closed, pending send cancelled");
                }
            }
        }));

        debug!(mode = %config.mode, debounce = ?config.debounce, "send scheduler started");
        Ok(Self {
            shared,
            timer: Some(timer),
        })
    }

    /// Store a new value for `key`.
    ///
    /// The value is checked against its channel first; an invalid value is
    /// rejected and the previous one kept. In auto mode a flag change sends
    /// at once and returns the record, any other change (re)starts the
    /// debounce timer. Auto-mode changes while the target is closed fail
    /// with [`SessionError::NotConnected`] and schedule nothing.
    pub fn set_value(
        &self,
        key: &str,
        value: impl Into<ChannelValue>,
    ) -> Result<Option<SentRecord>> {
        let value = value.into();
        self.shared.channels.check_value(key, &value)?;

        let mode = {
            let mut state = self.shared.lock();
            state.values.insert(key.to_string(), value);
            state.mode
        };
        if mode == SendMode::Manual {
            return Ok(None);
        }

        if !self.shared.target.is_open() {
            self.shared.cancel();
            return Err(SessionError::NotConnected);
        }

        if self.shared.channels.is_flag(key) {
            // The immediate packet already carries any pending change.
            self.shared.cancel();
            return self.shared.send_now("flag").map(Some);
        }

        self.shared.lock().deadline = Some(Instant::now() + self.shared.debounce);
        self.shared.wake.notify_all();
        Ok(None)
    }

    /// Send the current values now, cancelling any pending auto send.
    pub fn trigger(&self) -> Result<SentRecord> {
        self.shared.cancel();
        self.shared.send_now("trigger")
    }

    /// Switch send mode.
    ///
    /// Manual to auto sends one synchronizing packet if the target is open;
    /// auto to manual cancels a pending send without sending.
    pub fn set_mode(&self, mode: SendMode) -> Result<Option<SentRecord>> {
        let previous = std::mem::replace(&mut self.shared.lock().mode, mode);
        if previous == mode {
            return Ok(None);
        }
        info!(from = %previous, to = %mode, "send mode changed");

        match mode {
            SendMode::Manual => {
                self.shared.cancel();
                Ok(None)
            }
            SendMode::Auto if self.shared.target.is_open() => {
                self.shared.send_now("sync").map(Some)
            }
            SendMode::Auto => Ok(None),
        }
    }

    pub fn mode(&self) -> SendMode {
        self.shared.lock().mode
    }

    /// True while a debounced send is waiting to fire.
    pub fn has_pending(&self) -> bool {
        self.shared.lock().deadline.is_some()
    }

    /// Current value of every channel.
    pub fn values(&self) -> NamedValues {
        self.shared.lock().values.clone()
    }

    /// Packets delivered so far.
    pub fn sent_count(&self) -> u64 {
        self.shared.lock().sent
    }

    /// The error of the last failed send, cleared by the next success.
    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    pub fn channels(&self) -> &ChannelConfig {
        &self.shared.channels
    }
}

impl Drop for SendScheduler {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.deadline = None;
        }
        self.shared.wake.notify_all();
        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                warn!("debounce thread panicked");
            }
        }
    }
}

impl fmt::Debug for SendScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("SendScheduler")
            .field("mode", &state.mode)
            .field("debounce", &self.shared.debounce)
            .field("pending", &state.deadline.is_some())
            .field("sent", &state.sent)
            .finish_non_exhaustive()
    }
}

fn timer_loop(shared: &Shared) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            break;
        }
        match state.deadline {
            None => {
                state = shared
                    .wake
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if now < deadline {
                    state = shared
                        .wake
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                    continue;
                }
                state.deadline = None;
                drop(state);
                // Failures are latched in `last_error` by send_now.
                let _ = shared.send_now("debounce");
                state = shared.lock();
            }
        }
    }
    trace!("debounce thread stopped");
}
