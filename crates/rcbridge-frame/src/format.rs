use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix the bridge firmware puts in front of received CSV frames.
pub const DEFAULT_RX_PREFIX: &str = "RX:";

/// Outbound encoding of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Packed 25-byte frame.
    Binary,
    /// Newline-terminated CSV line.
    Csv,
    /// Newline-terminated `{"cmd":"data",...}` command.
    #[default]
    Json,
}

impl WireFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            WireFormat::Binary => "binary",
            WireFormat::Csv => "csv",
            WireFormat::Json => "json",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(WireFormat::Binary),
            "csv" => Ok(WireFormat::Csv),
            "json" => Ok(WireFormat::Json),
            other => Err(format!("unknown wire format '{other}'")),
        }
    }
}

/// How the inbound byte stream is cut into frames.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Framing {
    /// Back-to-back 25-byte binary frames, no delimiter.
    Binary,
    /// Lines; those starting with `prefix` carry a CSV payload, the rest
    /// are passed through as text.
    Csv { prefix: String },
    /// Lines holding JSON objects; anything else is passed through as text.
    #[default]
    Json,
}

impl Framing {
    /// CSV framing with the firmware's default `RX:` prefix.
    pub fn csv() -> Self {
        Framing::Csv {
            prefix: DEFAULT_RX_PREFIX.to_string(),
        }
    }

    /// True for the newline-delimited framings.
    pub fn is_line_based(&self) -> bool {
        !matches!(self, Framing::Binary)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Framing::Binary => "binary",
            Framing::Csv { .. } => "csv",
            Framing::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_parses_case_insensitively() {
        assert_eq!("CSV".parse::<WireFormat>().unwrap(), WireFormat::Csv);
        assert_eq!("bin".parse::<WireFormat>().unwrap(), WireFormat::Binary);
        assert!("xml".parse::<WireFormat>().is_err());
        assert_eq!(WireFormat::default(), WireFormat::Json);
    }

    #[test]
    fn csv_framing_uses_rx_prefix() {
        assert_eq!(
            Framing::csv(),
            Framing::Csv {
                prefix: "RX:".to_string()
            }
        );
        assert!(Framing::csv().is_line_based());
        assert!(!Framing::Binary.is_line_based());
    }
}
