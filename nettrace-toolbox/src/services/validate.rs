//! Cheap syntactic input checks shared by every operation.

use std::net::IpAddr;

use crate::error::{NetTraceError, NetTraceResult, codes};

/// Longest DNS name accepted.
pub const MAX_HOST_LEN: usize = 253;

/// Validate and normalise a hostname or IP address input.
///
/// Trims whitespace, passes literal addresses through unchanged and rejects empty or overlong
/// names. `code` is the operation-specific validation code.
pub fn validate_host(host: &str, code: &'static str) -> NetTraceResult<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(NetTraceError::validation(code, "Host is required"));
    }
    if host.parse::<IpAddr>().is_ok() {
        return Ok(host.to_string());
    }
    if host.len() > MAX_HOST_LEN {
        return Err(NetTraceError::validation(
            code,
            format!(
                "Host exceeds maximum length of {MAX_HOST_LEN} characters (got {})",
                host.len()
            ),
        )
        .with_context("length", host.len()));
    }
    Ok(host.to_string())
}

/// Validate a WHOIS query: any non-blank string.
pub fn validate_query(query: &str) -> NetTraceResult<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(NetTraceError::validation(
            codes::WHOIS_INVALID_QUERY,
            "WHOIS query is required",
        ));
    }
    Ok(query.to_string())
}

/// Validate a TCP port in `1..=65535`.
pub fn validate_port(port: u32) -> NetTraceResult<u16> {
    u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| {
            NetTraceError::validation(
                codes::SSL_INVALID_PORT,
                format!("Port must be between 1 and 65535 (got {port})"),
            )
            .with_context("port", port)
        })
}
