//! Loopback port leases.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::TcpSocket;

use crate::error::ServerError;

/// Ask the operating system for a free loopback port.
///
/// A transient socket with address reuse enabled is bound to port 0, the
/// assigned port is read back and the socket is closed before returning.
/// Every call is an independent lease; the caller binds the port itself.
pub fn allocate() -> Result<u16, ServerError> {
    let socket = TcpSocket::new_v4().map_err(ServerError::ResourceExhausted)?;
    socket
        .set_reuseaddr(true)
        .map_err(ServerError::ResourceExhausted)?;
    socket
        .bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .map_err(ServerError::ResourceExhausted)?;
    let port = socket
        .local_addr()
        .map_err(ServerError::ResourceExhausted)?
        .port();
    tracing::debug!(port, "Leased loopback port");
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leased_port_is_nonzero_and_bindable() {
        let port = allocate().unwrap();
        assert_ne!(port, 0);
        let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port));
        assert!(listener.is_ok(), "lease {port} should be free to bind");
    }

    #[test]
    fn consecutive_leases_are_independent() {
        let held = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, allocate().unwrap())).unwrap();
        let held_port = held.local_addr().unwrap().port();
        let next = allocate().unwrap();
        assert_ne!(next, held_port);
    }
}
