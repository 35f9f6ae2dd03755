use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use rcbridge_channels::{parse_assignment, ChannelConfig, NamedValues};
use rcbridge_frame::{Framing, RadioProtocol, WireFormat, DEFAULT_RX_PREFIX};
use rcbridge_session::{Session, SessionConfig};
use rcbridge_transport::{Endpoint, DEFAULT_BAUD_RATE};

use crate::exit::{config_error, session_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod bridge;
pub mod build;
pub mod drive;
pub mod listen;
pub mod ports;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports(PortsArgs),
    /// Build a packet from a channel file without connecting.
    Build(BuildArgs),
    /// Send one packet to a bridge.
    Send(SendArgs),
    /// Print frames received from a bridge.
    Listen(ListenArgs),
    /// Send a control command to a bridge and print its replies.
    Bridge(BridgeArgs),
    /// Feed key=value lines from stdin through the send scheduler.
    Drive(DriveArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Build(args) => build::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Bridge(args) => bridge::run(args, format),
        Command::Drive(args) => drive::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where and how to connect.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Serial device path, or unix:<path> for a socket relay.
    pub endpoint: String,
    /// Serial baud rate.
    #[arg(long, env = "RCBRIDGE_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Wait after opening while the bridge resets (e.g. 2s, 0ms).
    #[arg(long, default_value = "2s")]
    pub settle: String,
}

/// Channel file plus caller-supplied values.
#[derive(Args, Debug, Clone)]
pub struct ChannelArgs {
    /// Channel definition file (JSON).
    #[arg(long, short = 'c', env = "RCBRIDGE_CHANNELS", value_name = "FILE")]
    pub channels: PathBuf,
    /// Channel value, repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub channels: ChannelArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    #[command(flatten)]
    pub channels: ChannelArgs,
    /// Outbound encoding (binary, csv, json).
    #[arg(long, default_value = "json")]
    pub wire: WireFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FramingKind {
    Binary,
    Csv,
    Json,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// How inbound bytes are split into frames.
    #[arg(long, value_enum, default_value = "json")]
    pub framing: FramingKind,
    /// Line prefix marking payload lines in CSV framing.
    #[arg(long, default_value = DEFAULT_RX_PREFIX)]
    pub prefix: String,
    /// Exit after N inbound items.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum BridgeAction {
    /// Ask for the bridge status.
    Status,
    /// Ask for the bridge command list.
    Help,
    /// Scan for receivers.
    Discover,
    /// Switch the radio protocol (espnow, nrf24).
    Switch { protocol: RadioProtocol },
}

#[derive(Args, Debug)]
pub struct BridgeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    #[command(subcommand)]
    pub action: BridgeAction,
    /// How long to print replies after sending (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s", global = true)]
    pub wait: String,
}

#[derive(Args, Debug)]
pub struct DriveArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Channel definition file (JSON).
    #[arg(long, short = 'c', env = "RCBRIDGE_CHANNELS", value_name = "FILE")]
    pub channels: PathBuf,
    /// Start in auto mode instead of manual.
    #[arg(long)]
    pub auto: bool,
    /// Auto-mode quiet period before a send (e.g. 100ms).
    #[arg(long, default_value = "100ms")]
    pub debounce: String,
    /// Outbound encoding (binary, csv, json).
    #[arg(long, default_value = "json")]
    pub wire: WireFormat,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl FramingKind {
    pub fn framing(self, prefix: &str) -> Framing {
        match self {
            FramingKind::Binary => Framing::Binary,
            FramingKind::Csv => Framing::Csv {
                prefix: prefix.to_string(),
            },
            FramingKind::Json => Framing::Json,
        }
    }
}

/// Parse `150ms`, `2s` or a bare number of seconds. Zero is allowed.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Turn repeated `--set key=value` arguments into named values.
pub fn parse_sets(sets: &[String]) -> CliResult<NamedValues> {
    let mut values = NamedValues::new();
    for set in sets {
        let (key, value) = parse_assignment(set).ok_or_else(|| {
            CliError::new(USAGE, format!("--set expects KEY=VALUE, got '{set}'"))
        })?;
        values.insert(key, value);
    }
    Ok(values)
}

pub fn load_channels(path: &Path) -> CliResult<ChannelConfig> {
    ChannelConfig::from_file(path)
        .map_err(|err| config_error(&format!("failed loading {}", path.display()), err))
}

/// Open a session on the endpoint with CLI-selected framing and wire format.
pub fn open_session(
    connect: &ConnectArgs,
    framing: Framing,
    wire_format: WireFormat,
) -> CliResult<Session> {
    let endpoint = Endpoint::parse(&connect.endpoint, connect.baud)
        .map_err(|err| transport_error("invalid endpoint", err))?;
    let config = SessionConfig {
        settle_delay: parse_duration(&connect.settle)?,
        framing,
        wire_format,
        ..SessionConfig::default()
    };
    Session::open(&endpoint, config).map_err(|err| session_error("connect failed", err))
}

#[cfg(test)]
mod tests {
    use rcbridge_channels::ChannelValue;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("0ms").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn parses_repeated_sets() {
        let values = parse_sets(&["speed=40".to_string(), "arm=on".to_string()]).unwrap();
        assert_eq!(values["speed"], ChannelValue::Int(40));
        assert_eq!(values["arm"], ChannelValue::Text("on".to_string()));
        assert_eq!(parse_sets(&["speed".to_string()]).unwrap_err().code, USAGE);
    }

    #[test]
    fn csv_framing_takes_prefix() {
        assert_eq!(
            FramingKind::Csv.framing("DATA:"),
            Framing::Csv {
                prefix: "DATA:".to_string()
            }
        );
        assert_eq!(FramingKind::Binary.framing("RX:"), Framing::Binary);
    }
}
