use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::link::Link;

/// Open a serial device for exclusive use.
///
/// On Unix the port is put into exclusive mode (`TIOCEXCL`), so a second
/// open of the same device fails while this link is alive. Windows COM
/// ports are exclusive by construction.
pub fn open_serial(path: &str, baud: u32, timeout: Duration) -> Result<Link> {
    let builder = serialport::new(path, baud).timeout(timeout);

    #[cfg(unix)]
    let port: Box<dyn serialport::SerialPort> = {
        let mut native = builder
            .open_native()
            .map_err(|err| TransportError::open(path, err))?;
        native
            .set_exclusive(true)
            .map_err(|err| TransportError::open(path, err))?;
        Box::new(native)
    };

    #[cfg(not(unix))]
    let port = builder
        .open()
        .map_err(|err| TransportError::open(path, err))?;

    debug!(path, baud, ?timeout, "serial port configured");
    info!(path, baud, "opened serial port");
    Ok(Link::from_serial(port))
}
