use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::link::Link;

/// Connect to a relay process listening on a Unix domain socket (blocking).
pub fn connect(path: impl AsRef<Path>) -> Result<Link> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).map_err(|e| TransportError::Open {
        endpoint: path.display().to_string(),
        source: e,
    })?;
    debug!(?path, "connected to unix domain socket");
    Ok(Link::from_unix(stream, format!("unix:{}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixListener;

    use super::*;

    #[test]
    fn connect_to_listening_relay() {
        let dir = std::env::temp_dir().join(format!("rcbridge-unix-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("relay.sock");
        let _ = std::fs::remove_file(&sock_path);
        let listener = UnixListener::bind(&sock_path).unwrap();

        let path_clone = sock_path.clone();
        let handle = std::thread::spawn(move || {
            let mut link = connect(&path_clone).unwrap();
            link.write_all(b"hello").unwrap();
            link.name().to_string()
        });

        let (mut server, _addr) = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        let name = handle.join().unwrap();
        assert!(name.starts_with("unix:"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_missing_socket_fails() {
        let result = connect("/tmp/rcbridge-no-such-relay.sock");
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }
}
