mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rcbridge", version, about = "Remote-control bridge CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{BridgeAction, FramingKind};

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "rcbridge",
            "send",
            "/dev/ttyUSB0",
            "--channels",
            "robot.json",
            "--set",
            "speed=40",
            "--set",
            "arm=true",
            "--wire",
            "csv",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.channels.set.len(), 2);
        assert_eq!(args.wire, rcbridge_frame::WireFormat::Csv);
        assert_eq!(args.connect.settle, "2s");
    }

    #[test]
    fn parses_bridge_switch() {
        let cli = Cli::try_parse_from([
            "rcbridge",
            "bridge",
            "unix:/tmp/bridge.sock",
            "switch",
            "nrf24",
        ])
        .expect("bridge args should parse");
        let Command::Bridge(args) = cli.command else {
            panic!("expected bridge");
        };
        assert!(matches!(
            args.action,
            BridgeAction::Switch {
                protocol: rcbridge_frame::RadioProtocol::Nrf24
            }
        ));
    }

    #[test]
    fn rejects_unknown_protocol() {
        let err = Cli::try_parse_from(["rcbridge", "bridge", "/dev/ttyUSB0", "switch", "wifi"])
            .expect_err("unknown protocol should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_listen_framing() {
        let cli = Cli::try_parse_from([
            "rcbridge",
            "listen",
            "/dev/ttyACM0",
            "--framing",
            "csv",
            "--count",
            "3",
        ])
        .expect("listen args should parse");
        let Command::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(args.framing, FramingKind::Csv);
        assert_eq!(args.prefix, "RX:");
        assert_eq!(args.count, Some(3));
    }
}
