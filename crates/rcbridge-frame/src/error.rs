/// Reasons a text frame or command envelope could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// A CSV line did not have exactly ten fields.
    #[error("expected 10 comma-separated fields, found {0}")]
    FieldCount(usize),

    /// An id or flags field is not an integer in 0-255.
    #[error("field {index} ('{text}') is not an integer in 0-255")]
    InvalidByte { index: usize, text: String },

    /// A value field is not a finite number.
    #[error("field {index} ('{text}') is not a finite number")]
    InvalidFloat { index: usize, text: String },

    /// A protocol name the bridge does not support.
    #[error("unknown radio protocol '{0}' (expected espnow or nrf24)")]
    UnknownProtocol(String),

    /// The line is not valid JSON or not a valid command envelope.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A binary frame had the wrong size.
    #[error("binary frame must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A text frame could not be parsed.
    #[error("malformed frame: {0}")]
    Parse(#[from] ParseError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link reached EOF.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
