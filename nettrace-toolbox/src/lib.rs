//! Network diagnostic engine
//!
//! Ping, traceroute, DNS lookup, WHOIS and SSL certificate inspection behind one
//! [`DiagnosticClient`]. Long-running probes stream their results; single-shot lookups run under
//! a retry executor with pluggable backoff. Every operation takes a cancellation token.

mod collab;
mod config;
mod error;
mod retry;
mod services;
mod stats;
mod types;
mod utils;

pub use collab::{ErrorHandler, LogLogger, Logger, NoopLogger, PassthroughErrorHandler};
pub use config::{NetworkConfig, PingOptions, TracerouteOptions};
pub use error::{BoxError, ErrorKind, NetTraceError, NetTraceResult, TransportError, codes};
pub use retry::{BackoffFn, BackoffPolicy, MAX_BACKOFF_DELAY, RetryExecutor};
pub use services::{
    DiagnosticClient, MAX_HOST_LEN, PingStream, STREAM_CAPACITY, TracerouteStream, whois,
};
pub use stats::{PingStatistics, TracerouteSummary, packet_loss};
pub use types::{
    CertificateInfo, Contact, ContactRole, DnsRecord, DnsRecordType, DnsResult, Host, PingResult,
    SslResult, TracerouteHop, WhoisResult,
};
pub use tokio_util::sync::CancellationToken;
