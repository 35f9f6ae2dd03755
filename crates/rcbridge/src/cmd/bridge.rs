use std::sync::mpsc::RecvTimeoutError;
use std::time::Instant;

use rcbridge_frame::{BridgeCommand, Framing, WireFormat};
use tracing::debug;

use crate::cmd::{open_session, parse_duration, BridgeAction, BridgeArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_inbound, OutputFormat};

impl From<BridgeAction> for BridgeCommand {
    fn from(action: BridgeAction) -> Self {
        match action {
            BridgeAction::Status => BridgeCommand::Status,
            BridgeAction::Help => BridgeCommand::Help,
            BridgeAction::Discover => BridgeCommand::Discover,
            BridgeAction::Switch { protocol } => BridgeCommand::Switch { protocol },
        }
    }
}

pub fn run(args: BridgeArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    let command = BridgeCommand::from(args.action);

    let session = open_session(&args.connect, Framing::Json, WireFormat::Json)?;
    let inbound = session
        .take_inbound()
        .ok_or_else(|| CliError::new(INTERNAL, "inbound receiver already taken"))?;

    let line = session
        .send_command(&command)
        .map_err(|err| session_error("command failed", err))?;
    debug!(line = %line, "command sent");

    let deadline = Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match inbound.recv_timeout(remaining) {
            Ok(item) => print_inbound(&item, format),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    session.close();
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use rcbridge_frame::RadioProtocol;

    use super::*;

    #[test]
    fn actions_map_to_commands() {
        assert_eq!(
            BridgeCommand::from(BridgeAction::Switch {
                protocol: RadioProtocol::Espnow
            })
            .to_line()
            .unwrap(),
            r#"{"cmd":"switch","protocol":"espnow"}"#
        );
        assert_eq!(BridgeCommand::from(BridgeAction::Discover).name(), "discover");
    }
}
