//! TCP connect and ping-like reachability probes.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use upwatch_core::ErrorDetail;

use crate::ProbeReport;

/// Port used by the ping-like probe when the service names none.
pub const DEFAULT_PING_PORT: u16 = 80;

/// Strip the brackets `Uri::host` leaves around IPv6 literals.
pub fn unbracket(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Resolve `host:port` and connect to the first address that accepts.
///
/// When every address fails, a refusal from any of them wins over other
/// errors, so a host that answered is reported as refused.
pub async fn connect_any(host: &str, port: u16) -> Result<TcpStream, ErrorDetail> {
    let host = unbracket(host);
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ErrorDetail::Dns {
            message: e.to_string(),
        })?
        .collect();

    let mut last_error = ErrorDetail::Dns {
        message: format!("no address found for {host}"),
    };
    let mut refused = false;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "connect attempt failed");
                let error = classify_io_error(&e);
                refused |= error == ErrorDetail::ConnectionRefused;
                last_error = error;
            }
        }
    }
    Err(if refused {
        ErrorDetail::ConnectionRefused
    } else {
        last_error
    })
}

/// Map a socket error onto the outcome taxonomy.
pub fn classify_io_error(err: &io::Error) -> ErrorDetail {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ErrorDetail::ConnectionRefused,
        io::ErrorKind::TimedOut => ErrorDetail::Timeout,
        _ => ErrorDetail::Io {
            message: err.to_string(),
        },
    }
}

async fn connect(host: &str, port: u16) -> Result<(), ErrorDetail> {
    connect_any(host, port).await.map(drop)
}

/// Succeeds when a TCP handshake with `host:port` completes.
pub async fn tcp_probe(host: &str, port: u16, timeout: Duration) -> ProbeReport {
    let start = Instant::now();
    match tokio::time::timeout(timeout, connect(host, port)).await {
        Ok(Ok(())) => ProbeReport::ok(start.elapsed()),
        Ok(Err(error)) => {
            debug!(%host, port, %error, "tcp probe failed");
            ProbeReport::failed(start.elapsed(), error)
        }
        Err(_) => {
            debug!(%host, port, "tcp probe timed out");
            ProbeReport::failed(timeout, ErrorDetail::Timeout)
        }
    }
}

/// Round-trip reachability check without raw sockets.
///
/// Measures a TCP handshake; a refused connection still proves the host
/// answered, so it counts as reachable.
pub async fn ping_probe(host: &str, port: u16, timeout: Duration) -> ProbeReport {
    let start = Instant::now();
    match tokio::time::timeout(timeout, connect(host, port)).await {
        Ok(Ok(())) | Ok(Err(ErrorDetail::ConnectionRefused)) => ProbeReport::ok(start.elapsed()),
        Ok(Err(error)) => {
            debug!(%host, port, %error, "ping probe failed");
            ProbeReport::failed(start.elapsed(), error)
        }
        Err(_) => {
            debug!(%host, port, "ping probe timed out");
            ProbeReport::failed(timeout, ErrorDetail::Timeout)
        }
    }
}
