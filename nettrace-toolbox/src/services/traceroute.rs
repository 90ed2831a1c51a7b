//! Simulated traceroute.
//!
//! Hop discovery is modelled, not measured: real TTL-expiry probing needs raw sockets. Each query
//! gets a synthetic delay that grows with the hop index plus jitter, and counts as answered iff
//! that delay fits inside the per-query timeout. The destination sits at a path length derived
//! from its address, so repeated traces of one target agree on the hop count.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collab::Logger;
use crate::config::TracerouteOptions;
use crate::types::{Host, TracerouteHop};

use super::probe::resolve_target;

/// Pause between hops.
pub const HOP_PACING: Duration = Duration::from_millis(50);

const PER_HOP_DELAY: Duration = Duration::from_millis(10);
const PER_QUERY_DELAY: Duration = Duration::from_millis(2);
const JITTER_MAX_MS: u64 = 5;
const MIN_PATH_LEN: u8 = 8;
const PATH_LEN_SPREAD: u8 = 8;

/// Number of hops between us and `target`, in `8..=15`.
pub fn path_length(target: IpAddr) -> u8 {
    let sum: u32 = match target {
        IpAddr::V4(v4) => v4.octets().iter().map(|b| u32::from(*b)).sum(),
        IpAddr::V6(v6) => v6.octets().iter().map(|b| u32::from(*b)).sum(),
    };
    // `sum % 8` always fits in a u8.
    MIN_PATH_LEN + u8::try_from(sum % u32::from(PATH_LEN_SPREAD)).unwrap_or(0)
}

/// Synthetic round-trip for `query` (0-based) at `hop` (1-based), before jitter.
pub fn base_delay(hop: u8, query: u8) -> Duration {
    PER_HOP_DELAY * u32::from(hop) + PER_QUERY_DELAY * u32::from(query)
}

fn jitter() -> Duration {
    Duration::from_millis(rand::rng().random_range(0..JITTER_MAX_MS))
}

/// Address reported by an intermediate router.
fn router_address(hop: u8, ipv6: bool) -> IpAddr {
    if ipv6 {
        IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, u16::from(hop)))
    } else {
        IpAddr::V4(Ipv4Addr::new(10, hop, 0, 1))
    }
}

/// Run the simulated queries for one hop.
pub fn simulate_hop(number: u8, queries: u8, limit: Duration, responder: Host) -> TracerouteHop {
    let rtts: Vec<Duration> = (0..queries)
        .map(|q| base_delay(number, q) + jitter())
        .filter(|delay| *delay < limit)
        .collect();
    let timeout = rtts.is_empty();

    TracerouteHop {
        number,
        host: if timeout {
            Host::new("*", None)
        } else {
            responder
        },
        rtts,
        timeout,
        error: timeout.then(|| format!("all {queries} queries timed out")),
        timestamp: Utc::now(),
    }
}

/// Produce hops into `tx` until the destination answers, `max_hops` is reached, `cancel` fires
/// or the receiver is dropped.
pub async fn run_traceroute(
    host: String,
    options: TracerouteOptions,
    cancel: CancellationToken,
    tx: mpsc::Sender<TracerouteHop>,
    logger: Arc<dyn Logger>,
) {
    logger.debug(&format!(
        "[Trace] Starting {host} max_hops={} queries={}",
        options.max_hops, options.queries
    ));

    let resolved = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        resolved = resolve_target(&host, options.ipv6, options.timeout) => resolved,
    };

    let target = match resolved {
        Ok(ip) => ip,
        Err(e) => {
            logger.warn(&format!("[Trace] Cannot resolve {host}: {e}"));
            let _ = tx
                .send(TracerouteHop {
                    number: 1,
                    host: Host::new(host, None),
                    rtts: Vec::new(),
                    timeout: true,
                    error: Some(e.to_string()),
                    timestamp: Utc::now(),
                })
                .await;
            return;
        }
    };

    let destination_hop = path_length(target);

    for number in 1..=options.max_hops {
        if cancel.is_cancelled() {
            break;
        }

        let at_destination = number >= destination_hop;
        let responder = if at_destination {
            Host::new(host.clone(), Some(target))
        } else {
            let router = router_address(number, target.is_ipv6());
            Host::new(router.to_string(), Some(router))
        };

        let hop = simulate_hop(number, options.queries, options.timeout, responder);
        let reached = at_destination && !hop.timeout;
        logger.debug(&format!(
            "[Trace] hop={number} host={} rtts={:?} timeout={}",
            hop.host.hostname, hop.rtts, hop.timeout
        ));

        if tx.send(hop).await.is_err() || reached {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(HOP_PACING) => {}
        }
    }

    logger.debug(&format!("[Trace] Finished {host}"));
}
