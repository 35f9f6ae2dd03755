use rcbridge_frame::Framing;
use tracing::debug;

use crate::cmd::{load_channels, open_session, parse_sets, SendArgs};
use crate::exit::{session_error, validation_error, CliResult, SUCCESS};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    // Validate everything before touching the port.
    let channels = load_channels(&args.channels.channels)?;
    let values = parse_sets(&args.channels.set)?;
    let packet = channels
        .build_packet(&values)
        .map_err(|err| validation_error("packet build failed", err))?;

    let session = open_session(&args.connect, Framing::Json, args.wire)?;
    let record = session
        .send_packet(&packet)
        .map_err(|err| session_error("send failed", err))?;
    debug!(endpoint = %args.connect.endpoint, raw = %record.raw, "packet sent");
    print_sent(&record, format);

    session.close();
    Ok(SUCCESS)
}
