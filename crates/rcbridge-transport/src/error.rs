/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the endpoint (missing device, busy, permission denied).
    #[error("failed to open {endpoint}: {source}")]
    Open {
        endpoint: String,
        source: std::io::Error,
    },

    /// The endpoint string could not be interpreted.
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// Port enumeration failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(String),

    /// The serial layer reported an error on an open port.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the link.
    #[error("link closed by peer")]
    ConnectionClosed,
}

impl TransportError {
    /// Wrap a serial-layer error raised while opening `endpoint`.
    pub(crate) fn open(endpoint: &str, err: serialport::Error) -> Self {
        Self::Open {
            endpoint: endpoint.to_string(),
            source: err.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
