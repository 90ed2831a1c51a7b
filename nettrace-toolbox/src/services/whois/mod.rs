//! WHOIS lookup: server selection, raw query and response parsing.

mod client;
mod dates;
mod parser;
mod servers;

use std::time::Duration;

use crate::collab::Logger;
use crate::error::TransportError;
use crate::types::WhoisResult;

pub use dates::parse_date;
pub use parser::{dedup, parse_response};
pub use servers::get_whois_server;

/// Query the registry responsible for `query` and parse its answer.
pub async fn whois_lookup(
    query: &str,
    limit: Duration,
    logger: &dyn Logger,
) -> Result<WhoisResult, TransportError> {
    let server = get_whois_server(query);
    lookup_at(server, query, limit, logger).await
}

/// Query a specific WHOIS `server` (`host:port`).
pub async fn lookup_at(
    server: &str,
    query: &str,
    limit: Duration,
    logger: &dyn Logger,
) -> Result<WhoisResult, TransportError> {
    let raw = client::query_server(server, query, limit, logger).await?;
    Ok(parse_response(query, server, &raw))
}
