use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use rcbridge_frame::WireFormat;
use tracing::info;

use crate::cmd::{open_session, ListenArgs};
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_inbound, OutputFormat};

const POLL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let framing = args.framing.framing(&args.prefix);
    let framing_name = framing.name();
    let session = open_session(&args.connect, framing, WireFormat::default())?;
    let inbound = session
        .take_inbound()
        .ok_or_else(|| CliError::new(INTERNAL, "inbound receiver already taken"))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    info!(endpoint = %args.connect.endpoint, framing = framing_name, "listening");

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let item = match inbound.recv_timeout(POLL) {
            Ok(item) => item,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                let reason = session
                    .status()
                    .last_error
                    .unwrap_or_else(|| "link closed".to_string());
                return Err(CliError::new(TRANSPORT_ERROR, format!("listen stopped: {reason}")));
            }
        };

        print_inbound(&item, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    session.close();
    Ok(SUCCESS)
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
