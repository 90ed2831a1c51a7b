//! Client configuration and per-operation probe options.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Global network settings, fixed at client construction.
///
/// Deserializes from JSON with every field optional; durations are integer milliseconds.
///
/// ```
/// use nettrace_toolbox::NetworkConfig;
///
/// let config: NetworkConfig = serde_json::from_str(r#"{"retryAttempts": 5}"#).unwrap();
/// assert_eq!(config.retry_attempts, 5);
/// assert_eq!(config.timeout.as_secs(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    /// Dial / read timeout applied to every network call.
    #[serde(with = "crate::utils::duration")]
    pub timeout: Duration,
    /// Attempts made by single-shot operations before giving up.
    pub retry_attempts: u32,
    /// Base delay for the retry backoff.
    #[serde(with = "crate::utils::duration")]
    pub retry_base_delay: Duration,
    /// Maximum number of single-shot lookups (DNS, WHOIS, SSL) in flight at once.
    pub max_concurrency: usize,
    /// DNS server to query instead of the system resolver.
    pub nameserver: Option<IpAddr>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            nameserver: None,
        }
    }
}

/// Ping options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PingOptions {
    /// Number of probes; `0` pings until cancelled.
    pub count: u32,
    /// Wait between probes.
    #[serde(with = "crate::utils::duration")]
    pub interval: Duration,
    /// Per-probe timeout.
    #[serde(with = "crate::utils::duration")]
    pub timeout: Duration,
    /// Packet size hint, echoed in every result.
    pub packet_size: u16,
    /// TTL hint, echoed in every result.
    pub ttl: u8,
    /// TCP port used for the connect probe.
    pub port: u16,
    /// Resolve to an IPv6 address instead of IPv4.
    pub ipv6: bool,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            count: 4,
            interval: Duration::from_secs(1),
            timeout: DEFAULT_TIMEOUT,
            packet_size: 64,
            ttl: 64,
            port: 80,
            ipv6: false,
        }
    }
}

impl PingOptions {
    /// Reject option combinations the probe engine cannot honour.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        if self.interval.is_zero() {
            return Err("interval must be greater than zero".to_string());
        }
        if self.port == 0 {
            return Err("port must be between 1 and 65535".to_string());
        }
        Ok(())
    }
}

/// Traceroute options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TracerouteOptions {
    /// Highest hop index probed.
    pub max_hops: u8,
    /// Per-query timeout.
    #[serde(with = "crate::utils::duration")]
    pub timeout: Duration,
    /// Packet size hint.
    pub packet_size: u16,
    /// Queries issued per hop.
    pub queries: u8,
    /// TCP port of the target service.
    pub port: u16,
    /// Resolve to an IPv6 address instead of IPv4.
    pub ipv6: bool,
}

impl Default for TracerouteOptions {
    fn default() -> Self {
        Self {
            max_hops: 30,
            timeout: DEFAULT_TIMEOUT,
            packet_size: 60,
            queries: 3,
            port: 80,
            ipv6: false,
        }
    }
}

impl TracerouteOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_hops == 0 {
            return Err("max hops must be greater than zero".to_string());
        }
        if self.queries == 0 {
            return Err("queries per hop must be greater than zero".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
