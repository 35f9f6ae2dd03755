//! Bridge sessions and send scheduling.
//!
//! A [`Session`] owns one open link: a background reader thread decodes
//! inbound frames into a bounded queue and a status cache, while writes from
//! any caller go through a single lock. [`SendScheduler`] sits in front of
//! a session and decides when named-value changes become packets.

pub mod error;
pub mod scheduler;
pub mod session;
pub mod status;

pub use error::{Result, SessionError};
pub use scheduler::{SchedulerConfig, SendMode, SendScheduler};
pub use session::{CloseHook, PacketTarget, Session, SessionConfig};
pub use status::{InboundLine, ReceivedRecord, SentRecord, SessionState, StatusSnapshot};
