/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A send was attempted while the session is not open.
    #[error("not connected")]
    NotConnected,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rcbridge_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] rcbridge_frame::FrameError),

    /// A named value could not be packed.
    #[error("invalid value: {0}")]
    Validation(#[from] rcbridge_channels::ValidationError),

    /// The reader or timer thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

impl SessionError {
    /// True for failures of the underlying link, as opposed to local errors.
    pub fn is_transport(&self) -> bool {
        match self {
            SessionError::Transport(_) => true,
            SessionError::Frame(err) => matches!(
                err,
                rcbridge_frame::FrameError::Io(_) | rcbridge_frame::FrameError::ConnectionClosed
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
