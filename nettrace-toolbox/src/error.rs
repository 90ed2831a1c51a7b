//! Unified error type definition
//!
//! Every failure handed to a caller is a [`NetTraceError`]: a kind, a machine-readable code,
//! an optional wrapped cause, a diagnostic context map and a timestamp. Engine-level failures
//! are [`TransportError`]s, which carry the timeout / temporary classification the retry
//! predicate relies on.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hickory_resolver::ResolveError;
use hickory_resolver::proto::ProtoErrorKind;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Boxed error used as the wrapped cause of a [`NetTraceError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Machine-readable error codes.
pub mod codes {
    pub const PING_INVALID_HOST: &str = "PING_INVALID_HOST";
    pub const PING_INVALID_OPTIONS: &str = "PING_INVALID_OPTIONS";
    pub const TRACE_INVALID_HOST: &str = "TRACE_INVALID_HOST";
    pub const TRACE_INVALID_OPTIONS: &str = "TRACE_INVALID_OPTIONS";
    pub const DNS_INVALID_DOMAIN: &str = "DNS_INVALID_DOMAIN";
    pub const DNS_UNSUPPORTED_TYPE: &str = "DNS_UNSUPPORTED_TYPE";
    pub const DNS_LOOKUP_FAILED: &str = "DNS_LOOKUP_FAILED";
    pub const WHOIS_INVALID_QUERY: &str = "WHOIS_INVALID_QUERY";
    pub const WHOIS_LOOKUP_FAILED: &str = "WHOIS_LOOKUP_FAILED";
    pub const SSL_INVALID_HOST: &str = "SSL_INVALID_HOST";
    pub const SSL_INVALID_PORT: &str = "SSL_INVALID_PORT";
    pub const SSL_CHECK_FAILED: &str = "SSL_CHECK_FAILED";

    pub const RETRY_EXHAUSTED: &str = "RETRY_EXHAUSTED";
    pub const LINEAR_RETRY_EXHAUSTED: &str = "LINEAR_RETRY_EXHAUSTED";
    pub const CUSTOM_RETRY_EXHAUSTED: &str = "CUSTOM_RETRY_EXHAUSTED";
    /// Cancelled before or during an attempt.
    pub const RETRY_CANCELLED: &str = "RETRY_CANCELLED";
    /// Cancelled while waiting between attempts.
    pub const RETRY_DELAY_CANCELLED: &str = "RETRY_DELAY_CANCELLED";
}

/// Error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Bad input, caught before any I/O. Never retried.
    Validation,
    /// I/O or protocol failure. May be retried.
    Network,
}

/// The error type returned by every [`DiagnosticClient`](crate::DiagnosticClient) operation.
#[derive(Error, Debug)]
#[error("[{code}] {message}")]
pub struct NetTraceError {
    /// Error category.
    pub kind: ErrorKind,
    /// Machine-readable code, see [`codes`].
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
    /// Underlying failure, if any.
    #[source]
    pub cause: Option<BoxError>,
    /// Diagnostic key/value data.
    pub context: BTreeMap<String, String>,
    /// When the error was created.
    pub timestamp: DateTime<Utc>,
}

impl NetTraceError {
    fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            cause: None,
            context: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Build a validation error.
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, code, message)
    }

    /// Build a network error.
    pub fn network(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, code, message)
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.cause = Some(cause.into());
        self
    }

    /// Attach a diagnostic key/value pair.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    /// Whether the error reports a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.code,
            codes::RETRY_CANCELLED | codes::RETRY_DELAY_CANCELLED
        )
    }

    /// Retryability predicate shared by all single-shot operations.
    ///
    /// Walks the cause chain and returns `true` iff the first transport-level failure found is
    /// a timeout or a temporary condition. Validation errors are never transient.
    pub fn is_transient(&self) -> bool {
        if self.is_validation() {
            return false;
        }
        let mut source: Option<&(dyn StdError + 'static)> = self
            .cause
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static));
        while let Some(err) = source {
            if let Some(transport) = err.downcast_ref::<TransportError>() {
                return transport.is_timeout() || transport.is_temporary();
            }
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                return io_is_timeout(io_err) || io_is_temporary(io_err);
            }
            source = err.source();
        }
        false
    }
}

impl Serialize for NetTraceError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("NetTraceError", 6)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("code", self.code)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("cause", &self.cause.as_ref().map(ToString::to_string))?;
        state.serialize_field("context", &self.context)?;
        state.serialize_field("timestamp", &self.timestamp.to_rfc3339())?;
        state.end()
    }
}

/// Result type alias used across the crate.
pub type NetTraceResult<T> = std::result::Result<T, NetTraceError>;

/// Low-level failure produced by the probe and lookup engines.
#[derive(Error, Debug)]
pub enum TransportError {
    /// A bounded operation did not finish in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Name resolution failure.
    #[error("DNS resolution failed: {message}")]
    Resolve {
        message: String,
        timeout: bool,
        temporary: bool,
    },

    /// TLS setup or handshake failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The peer presented no usable certificate.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// The target has no address of the requested family.
    #[error("no {family} address found for {host}")]
    NoAddress { host: String, family: &'static str },

    /// The governing cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => io_is_timeout(e),
            Self::Resolve { timeout, .. } => *timeout,
            _ => false,
        }
    }

    /// Transient conditions worth retrying that are not plain timeouts.
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::Io(e) => io_is_temporary(e),
            Self::Resolve { temporary, .. } => *temporary,
            _ => false,
        }
    }
}

impl From<ResolveError> for TransportError {
    fn from(err: ResolveError) -> Self {
        let (timeout, temporary) = match err.proto().map(|p| p.kind()) {
            Some(ProtoErrorKind::Timeout) => (true, false),
            Some(ProtoErrorKind::Io(_) | ProtoErrorKind::NoConnections | ProtoErrorKind::Busy) => {
                (false, true)
            }
            _ => (false, false),
        };
        Self::Resolve {
            message: err.to_string(),
            timeout,
            temporary,
        }
    }
}

fn io_is_timeout(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::TimedOut
}

fn io_is_temporary(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_shape() {
        let err = NetTraceError::validation(codes::PING_INVALID_HOST, "host is required")
            .with_context("host", "");
        assert!(err.is_validation());
        assert_eq!(err.code, "PING_INVALID_HOST");
        assert_eq!(err.context.get("host").map(String::as_str), Some(""));
        assert_eq!(err.to_string(), "[PING_INVALID_HOST] host is required");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_timeout_cause() {
        let err = NetTraceError::network(codes::WHOIS_LOOKUP_FAILED, "query failed")
            .with_cause(TransportError::Timeout(Duration::from_secs(5)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_transient_temporary_io_cause() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let err = NetTraceError::network(codes::SSL_CHECK_FAILED, "handshake failed")
            .with_cause(TransportError::Io(io_err));
        assert!(err.is_transient());
    }

    #[test]
    fn test_refused_is_terminal() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = NetTraceError::network(codes::WHOIS_LOOKUP_FAILED, "connect failed")
            .with_cause(TransportError::Io(io_err));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_through_nested_error() {
        let inner = NetTraceError::network(codes::DNS_LOOKUP_FAILED, "lookup failed").with_cause(
            TransportError::Resolve {
                message: "timed out".to_string(),
                timeout: true,
                temporary: false,
            },
        );
        let outer = NetTraceError::network(codes::RETRY_EXHAUSTED, "gave up").with_cause(inner);
        assert!(outer.is_transient());
    }

    #[test]
    fn test_no_cause_is_terminal() {
        let err = NetTraceError::network(codes::SSL_CHECK_FAILED, "no certificate");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_cancelled_codes() {
        assert!(NetTraceError::network(codes::RETRY_CANCELLED, "stop").is_cancelled());
        assert!(NetTraceError::network(codes::RETRY_DELAY_CANCELLED, "stop").is_cancelled());
        assert!(!NetTraceError::network(codes::RETRY_EXHAUSTED, "gave up").is_cancelled());
    }

    #[test]
    fn test_serialize_renders_cause_as_string() {
        let err = NetTraceError::network(codes::WHOIS_LOOKUP_FAILED, "query failed")
            .with_cause(TransportError::Cancelled);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "network");
        assert_eq!(json["code"], "WHOIS_LOOKUP_FAILED");
        assert_eq!(json["cause"], "operation cancelled");
    }
}
