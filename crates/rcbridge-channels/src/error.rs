/// Errors that can occur while loading channel definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The definition file could not be read.
    #[error("failed to load channel file: {0}")]
    LoadFailed(String),

    /// The definition file exceeds the configured size cap.
    #[error("channel file too large ({size} bytes, max {max})")]
    TooLarge { size: u64, max: usize },

    /// The definition file is not valid JSON or has the wrong shape.
    #[error("invalid channel file: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// More definitions than wire slots in one group.
    #[error("too many {group} channels: {count} (max {max})")]
    TooManyChannels {
        group: &'static str,
        count: usize,
        max: usize,
    },

    /// A definition with an empty key.
    #[error("{group} channel #{index} has an empty key")]
    EmptyKey { group: &'static str, index: usize },

    /// Two definitions share a key.
    #[error("duplicate channel key '{0}'")]
    DuplicateKey(String),

    /// `min` is greater than `max`, or a bound is not finite.
    #[error("channel '{key}' has invalid bounds [{min}, {max}]")]
    InvalidBounds { key: String, min: f64, max: f64 },

    /// A byte channel bound outside 0-255.
    #[error("byte channel '{key}' bound {value} is outside 0-255")]
    ByteOutOfRange { key: String, value: i64 },

    /// A flag bit outside 0-7.
    #[error("flag channel '{key}' bit {bit} is outside 0-7")]
    BitOutOfRange { key: String, bit: i64 },

    /// Two flag channels claim the same bit.
    #[error("flag channel '{key}' reuses bit {bit}")]
    DuplicateBit { key: String, bit: u8 },
}

/// A named value that cannot be packed into its slot.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The value is not a number and the slot is numeric.
    #[error("channel '{key}' expects a number, got {value}")]
    NotNumeric { key: String, value: String },

    /// The value is not a boolean and the slot is a flag.
    #[error("channel '{key}' expects a boolean, got {value}")]
    NotBoolean { key: String, value: String },

    /// NaN or infinity.
    #[error("channel '{key}' value is not finite")]
    NonFinite { key: String },

    /// No channel is defined under this key.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
