//! Aggregate numbers over streamed probe results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{PingResult, TracerouteHop};

/// Summary of a ping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingStatistics {
    pub sent: u32,
    pub received: u32,
    /// `(sent - received) / sent * 100`; `0.0` when nothing was sent.
    pub packet_loss: f64,
    #[serde(with = "crate::utils::duration::option")]
    pub min_rtt: Option<Duration>,
    #[serde(with = "crate::utils::duration::option")]
    pub avg_rtt: Option<Duration>,
    #[serde(with = "crate::utils::duration::option")]
    pub max_rtt: Option<Duration>,
    /// Population standard deviation of the received RTTs.
    #[serde(with = "crate::utils::duration::option")]
    pub stddev_rtt: Option<Duration>,
}

impl PingStatistics {
    pub fn from_results(results: &[PingResult]) -> Self {
        let sent = u32::try_from(results.len()).unwrap_or(u32::MAX);
        let rtts: Vec<Duration> = results
            .iter()
            .filter(|r| r.is_success())
            .filter_map(|r| r.rtt)
            .collect();
        let received = u32::try_from(rtts.len()).unwrap_or(u32::MAX);

        let (avg_rtt, stddev_rtt) = if rtts.is_empty() {
            (None, None)
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = rtts.len() as f64;
            let mean = rtts.iter().map(Duration::as_secs_f64).sum::<f64>() / n;
            let variance = rtts
                .iter()
                .map(|d| (d.as_secs_f64() - mean).powi(2))
                .sum::<f64>()
                / n;
            (
                Some(Duration::from_secs_f64(mean)),
                Some(Duration::from_secs_f64(variance.sqrt())),
            )
        };

        Self {
            sent,
            received,
            packet_loss: packet_loss(sent, received),
            min_rtt: rtts.iter().min().copied(),
            avg_rtt,
            max_rtt: rtts.iter().max().copied(),
            stddev_rtt,
        }
    }
}

/// Packet loss percentage for `sent` probes of which `received` came back.
pub fn packet_loss(sent: u32, received: u32) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    let received = received.min(sent);
    f64::from(sent - received) / f64::from(sent) * 100.0
}

/// Summary of a traceroute run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracerouteSummary {
    pub hops: usize,
    pub timed_out_hops: usize,
    /// Whether the last hop reported the target address.
    pub reached: bool,
}

impl TracerouteSummary {
    pub fn from_hops(hops: &[TracerouteHop], target: Option<std::net::IpAddr>) -> Self {
        let reached = match (hops.last(), target) {
            (Some(last), Some(target)) => !last.timeout && last.host.ip == Some(target),
            _ => false,
        };
        Self {
            hops: hops.len(),
            timed_out_hops: hops.iter().filter(|h| h.timeout).count(),
            reached,
        }
    }
}
