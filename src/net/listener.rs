//! TCP listener binding with port retry.
//!
//! # Responsibilities
//! - Resolve the configured hostname
//! - Bind, moving to the next port while the current one is taken
//! - Report the port actually bound

use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::observability::metrics;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Hostname did not resolve to any address.
    Resolve(String, std::io::Error),
    /// Failed to bind for a reason other than the port being in use.
    Bind(SocketAddr, std::io::Error),
    /// Every port up to 65535 was in use.
    Exhausted(u16),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Resolve(host, e) => write!(f, "Failed to resolve {}: {}", host, e),
            ListenerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
            ListenerError::Exhausted(start) => write!(f, "No free port at or above {}", start),
        }
    }
}

impl std::error::Error for ListenerError {}

async fn resolve(hostname: &str, port: u16) -> Result<SocketAddr, ListenerError> {
    let mut addrs = tokio::net::lookup_host((hostname, port))
        .await
        .map_err(|e| ListenerError::Resolve(hostname.to_string(), e))?;
    addrs.next().ok_or_else(|| {
        ListenerError::Resolve(
            hostname.to_string(),
            std::io::Error::new(ErrorKind::NotFound, "no addresses"),
        )
    })
}

/// Bind `hostname:port`, moving upward while the port is in use.
///
/// Returns the listener and the port it is bound to.
pub async fn bind_with_retry(hostname: &str, port: u16) -> Result<(TcpListener, u16), ListenerError> {
    let mut addr = resolve(hostname, port).await?;
    loop {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                let bound = listener
                    .local_addr()
                    .map_err(|e| ListenerError::Bind(addr, e))?
                    .port();
                tracing::debug!(address = %addr, port = bound, "Listener bound");
                return Ok((listener, bound));
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                metrics::record_port_retry();
                let next = addr.port().checked_add(1).ok_or(ListenerError::Exhausted(port))?;
                tracing::debug!(port = addr.port(), next, "Port in use, trying next");
                addr.set_port(next);
            }
            Err(e) => return Err(ListenerError::Bind(addr, e)),
        }
    }
}
