//! Port negotiation.

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener};

use tiny_http::Server;

use crate::error::{BindErrorKind, ServeError};
use crate::{debug, log};

/// Bind to `interface`, probing from `base_port` upward.
///
/// Only "address in use" moves on to the next port; any other socket error
/// aborts immediately. Port 0 is rejected: every instance gets a concrete,
/// predictable port.
pub fn bind_with_retry(
    interface: IpAddr,
    base_port: u16,
    max_attempts: u16,
) -> Result<(Server, SocketAddr), ServeError> {
    if base_port == 0 {
        return Err(ServeError::InvalidPort(base_port));
    }

    let mut last = base_port;
    for offset in 0..max_attempts.max(1) {
        let Some(port) = base_port.checked_add(offset) else {
            break;
        };
        last = port;
        let addr = SocketAddr::new(interface, port);

        match probe(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => match BindErrorKind::classify(&e) {
                BindErrorKind::InUse => {
                    debug!("serve"; "port {} in use", port);
                }
                kind => {
                    return Err(ServeError::Bind {
                        addr,
                        kind,
                        source: e,
                    });
                }
            },
        }
    }

    Err(ServeError::PortExhausted {
        first: base_port,
        last,
        attempts: last - base_port + 1,
    })
}

/// Bind `addr` transiently to learn why it fails, then for real.
///
/// `tiny_http` boxes its bind error; the transient `TcpListener` keeps the
/// `io::ErrorKind` intact for classification.
fn probe(addr: SocketAddr) -> io::Result<Server> {
    drop(TcpListener::bind(addr)?);
    Server::http(addr).map_err(|e| match e.downcast::<io::Error>() {
        Ok(io) => *io,
        Err(other) => io::Error::other(other.to_string()),
    })
}
