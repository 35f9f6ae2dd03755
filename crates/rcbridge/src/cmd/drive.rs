use std::io::BufRead;
use std::sync::Arc;

use rcbridge_channels::parse_assignment;
use rcbridge_frame::Framing;
use rcbridge_session::{PacketTarget, SchedulerConfig, SendMode, SendScheduler, SessionError};
use tracing::{info, warn};

use crate::cmd::{load_channels, open_session, parse_duration, DriveArgs};
use crate::exit::{io_error, session_error, CliResult, SUCCESS};
use crate::output::{print_sent, print_status, OutputFormat};

/// One line of driver input.
#[derive(Debug, Clone, PartialEq)]
enum DriveInput {
    Set(String, rcbridge_channels::ChannelValue),
    Send,
    Mode(SendMode),
    Status,
    Quit,
    Skip,
    Invalid(String),
}

fn parse_input(line: &str) -> DriveInput {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return DriveInput::Skip;
    }
    match line {
        "send" => DriveInput::Send,
        "auto" => DriveInput::Mode(SendMode::Auto),
        "manual" => DriveInput::Mode(SendMode::Manual),
        "status" => DriveInput::Status,
        "quit" | "exit" => DriveInput::Quit,
        _ => match parse_assignment(line) {
            Some((key, value)) => DriveInput::Set(key, value),
            None => DriveInput::Invalid(line.to_string()),
        },
    }
}

pub fn run(args: DriveArgs, format: OutputFormat) -> CliResult<i32> {
    let channels = Arc::new(load_channels(&args.channels)?);
    let config = SchedulerConfig {
        mode: if args.auto {
            SendMode::Auto
        } else {
            SendMode::Manual
        },
        debounce: parse_duration(&args.debounce)?,
    };

    let session = Arc::new(open_session(&args.connect, Framing::Json, args.wire)?);
    let target: Arc<dyn PacketTarget> = session.clone();
    let scheduler = SendScheduler::new(target, channels, config)
        .map_err(|err| session_error("scheduler start failed", err))?;
    info!(mode = %scheduler.mode(), "driving; reading commands from stdin");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| io_error("failed reading stdin", err))?;
        let result = match parse_input(&line) {
            DriveInput::Skip => continue,
            DriveInput::Quit => break,
            DriveInput::Invalid(text) => {
                warn!(input = %text, "expected key=value, send, auto, manual, status or quit");
                continue;
            }
            DriveInput::Status => {
                print_status(&session.status(), format);
                continue;
            }
            DriveInput::Set(key, value) => scheduler.set_value(&key, value),
            DriveInput::Send => scheduler.trigger().map(Some),
            DriveInput::Mode(mode) => scheduler.set_mode(mode),
        };

        match result {
            Ok(Some(record)) => print_sent(&record, format),
            Ok(None) => {}
            Err(SessionError::Validation(err)) => warn!(error = %err, "value rejected"),
            Err(err) => return Err(session_error("send failed", err)),
        }
    }

    // Input ended with a debounced send still waiting: deliver it.
    if scheduler.has_pending() {
        let record = scheduler
            .trigger()
            .map_err(|err| session_error("send failed", err))?;
        print_sent(&record, format);
    }

    drop(scheduler);
    session.close();
    Ok(SUCCESS)
}
