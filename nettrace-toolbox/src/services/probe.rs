//! Target resolution and TCP connect probing shared by ping and traceroute.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::TransportError;

/// Resolve `host` to one address of the requested family.
///
/// Literal addresses are used as-is when they match the family. Otherwise the first matching
/// address returned by the system resolver wins.
pub async fn resolve_target(
    host: &str,
    ipv6: bool,
    limit: Duration,
) -> Result<IpAddr, TransportError> {
    let family = if ipv6 { "IPv6" } else { "IPv4" };
    let matches_family = |ip: &IpAddr| ip.is_ipv6() == ipv6;

    if let Ok(ip) = host.parse::<IpAddr>() {
        return if matches_family(&ip) {
            Ok(ip)
        } else {
            Err(TransportError::NoAddress {
                host: host.to_string(),
                family,
            })
        };
    }

    let addrs = timeout(limit, tokio::net::lookup_host((host, 0)))
        .await
        .map_err(|_| TransportError::Timeout(limit))??;

    addrs
        .map(|addr| addr.ip())
        .find(matches_family)
        .ok_or_else(|| TransportError::NoAddress {
            host: host.to_string(),
            family,
        })
}

/// Time a TCP connection to `addr`, bounded by `limit`.
///
/// The connection is dropped as soon as it is established.
pub async fn tcp_probe(addr: SocketAddr, limit: Duration) -> Result<Duration, TransportError> {
    let start = Instant::now();
    let stream = timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::Timeout(limit))??;
    let elapsed = start.elapsed();
    drop(stream);
    Ok(elapsed)
}
