//! Resolver construction for DNS lookups.

use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;

use hickory_resolver::{
    TokioResolver,
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
};

use crate::collab::Logger;

/// Human-readable description of the DNS servers used when no nameserver is configured.
pub(crate) static SYSTEM_DNS_LABEL: LazyLock<String> = LazyLock::new(|| {
    #[cfg(any(unix, target_os = "windows"))]
    {
        if let Ok((config, _opts)) = hickory_resolver::system_conf::read_system_conf() {
            let ips = dedup_ips(&config);
            if !ips.is_empty() {
                return ips.join(", ");
            }
        }
    }

    let fallback = ResolverConfig::default();
    let ips = dedup_ips(&fallback);
    if ips.is_empty() {
        "Default".to_string()
    } else {
        ips.join(", ")
    }
});

/// Deduplicate nameserver IP addresses from a resolver configuration.
pub(crate) fn dedup_ips(config: &ResolverConfig) -> Vec<String> {
    let mut ips: Vec<String> = Vec::new();
    for ns in config.name_servers() {
        let ip = ns.socket_addr.ip().to_string();
        if !ips.contains(&ip) {
            ips.push(ip);
        }
    }
    ips
}

/// Label for the resolver that [`build_resolver_for_ns`] builds for `ns_ip`.
pub(crate) fn nameserver_label(ns_ip: Option<IpAddr>) -> String {
    ns_ip.map_or_else(|| SYSTEM_DNS_LABEL.clone(), |ip| ip.to_string())
}

/// Build a resolver that targets a specific nameserver IP, or falls back to the
/// system configuration when `ns_ip` is `None`.
///
/// Hickory's own retries are disabled; retrying is the caller's job.
pub(crate) fn build_resolver_for_ns(
    ns_ip: Option<IpAddr>,
    timeout: Duration,
    logger: &dyn Logger,
) -> TokioResolver {
    if let Some(ns_ip) = ns_ip {
        let config = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from_ips_clear(&[ns_ip], 53, true),
        );
        let provider = TokioConnectionProvider::default();
        return TokioResolver::builder_with_config(config, provider)
            .with_options(resolver_opts(timeout))
            .build();
    }

    build_system_resolver(timeout, logger)
}

fn resolver_opts(timeout: Duration) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    opts.cache_size = 0;
    opts
}

/// Build a resolver using the host system DNS configuration (with fallback).
fn build_system_resolver(timeout: Duration, logger: &dyn Logger) -> TokioResolver {
    #[cfg(any(unix, target_os = "windows"))]
    {
        match TokioResolver::builder_tokio() {
            Ok(mut builder) => {
                let opts = builder.options_mut();
                opts.timeout = timeout;
                opts.attempts = 1;
                opts.cache_size = 0;
                return builder.build();
            }
            Err(e) => {
                logger.warn(&format!(
                    "[DNS] Failed to load system DNS configuration, falling back to defaults: {e}"
                ));
            }
        }
    }

    let provider = TokioConnectionProvider::default();
    TokioResolver::builder_with_config(ResolverConfig::default(), provider)
        .with_options(resolver_opts(timeout))
        .build()
}
