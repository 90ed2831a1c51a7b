//! Diagnostic client façade exposing every operation.
//!
//! Inputs are validated synchronously. Ping and traceroute then hand back a stream fed by a
//! background task; DNS, WHOIS and SSL run inside the retry executor.

mod dns;
mod ping;
mod probe;
mod resolver;
#[cfg(feature = "rustls")]
mod ssl;
mod traceroute;
mod validate;
pub mod whois;

use std::future::Future;
use std::sync::Arc;

use futures::TryFutureExt;
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::collab::{ErrorHandler, LogLogger, Logger, PassthroughErrorHandler};
use crate::config::{NetworkConfig, PingOptions, TracerouteOptions};
use crate::error::{NetTraceError, NetTraceResult, TransportError, codes};
use crate::retry::{BackoffPolicy, RetryExecutor};
use crate::types::{DnsRecordType, DnsResult, PingResult, TracerouteHop, WhoisResult};

pub use validate::MAX_HOST_LEN;

/// Capacity of the channel behind every result stream.
pub const STREAM_CAPACITY: usize = 16;

/// Stream of ping samples, ending when the run completes or is cancelled.
pub type PingStream = ReceiverStream<PingResult>;

/// Stream of traceroute hops, ending when the run completes or is cancelled.
pub type TracerouteStream = ReceiverStream<TracerouteHop>;

/// Wrap an engine failure in a network-kind error carrying it as the cause.
fn engine_error(code: &'static str, what: &str) -> impl FnOnce(TransportError) -> NetTraceError {
    move |err| NetTraceError::network(code, format!("{what} failed: {err}")).with_cause(err)
}

/// Entry point for all network diagnostic operations.
///
/// ```rust,no_run
/// use nettrace_toolbox::{CancellationToken, DiagnosticClient, NetworkConfig};
/// # async fn demo() -> nettrace_toolbox::NetTraceResult<()> {
/// let client = DiagnosticClient::new(NetworkConfig::default());
/// let dns = client
///     .dns_lookup(&CancellationToken::new(), "example.com", "A")
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct DiagnosticClient {
    config: Arc<NetworkConfig>,
    retry: RetryExecutor,
    limiter: Arc<Semaphore>,
    logger: Arc<dyn Logger>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl DiagnosticClient {
    /// Create a client that logs through the `log` facade and returns errors unchanged.
    pub fn new(config: NetworkConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(LogLogger),
            Arc::new(PassthroughErrorHandler),
        )
    }

    pub fn with_collaborators(
        config: NetworkConfig,
        logger: Arc<dyn Logger>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self {
        let retry = RetryExecutor::new(
            config.retry_attempts,
            config.retry_base_delay,
            Arc::clone(&logger),
        );
        Self {
            limiter: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config: Arc::new(config),
            retry,
            logger,
            error_handler,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Log `err` and pass it through the error handler.
    fn fail(&self, err: NetTraceError) -> NetTraceError {
        if err.is_validation() {
            self.logger.debug(&format!("Rejected input: {err}"));
        } else {
            self.logger.error(&err.to_string());
        }
        self.error_handler.handle(err)
    }

    /// Run a single-shot operation under the concurrency limit and retry policy.
    async fn run_single<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> NetTraceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NetTraceError>>,
    {
        // A cancelled wait falls through; the executor then reports the cancellation.
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            permit = self.limiter.acquire() => permit.ok(),
        };
        let result = self
            .retry
            .execute(
                cancel,
                &BackoffPolicy::Exponential,
                operation,
                NetTraceError::is_transient,
            )
            .await;
        drop(permit);
        result.map_err(|e| self.fail(e))
    }

    /// Ping `host` with timed TCP connection attempts.
    ///
    /// Returns once the input is validated; samples arrive on the stream. Cancelling `cancel`
    /// ends the stream.
    pub async fn ping(
        &self,
        cancel: &CancellationToken,
        host: &str,
        options: PingOptions,
    ) -> NetTraceResult<PingStream> {
        let host = validate::validate_host(host, codes::PING_INVALID_HOST)
            .map_err(|e| self.fail(e))?;
        options.validate().map_err(|msg| {
            self.fail(NetTraceError::validation(codes::PING_INVALID_OPTIONS, msg))
        })?;

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        tokio::spawn(ping::run_ping(
            host,
            options,
            cancel.child_token(),
            tx,
            Arc::clone(&self.logger),
        ));
        Ok(ReceiverStream::new(rx))
    }

    /// Trace the path to `host`.
    ///
    /// Hop discovery is simulated; see [`TracerouteOptions`] for the knobs.
    pub async fn traceroute(
        &self,
        cancel: &CancellationToken,
        host: &str,
        options: TracerouteOptions,
    ) -> NetTraceResult<TracerouteStream> {
        let host = validate::validate_host(host, codes::TRACE_INVALID_HOST)
            .map_err(|e| self.fail(e))?;
        options.validate().map_err(|msg| {
            self.fail(NetTraceError::validation(codes::TRACE_INVALID_OPTIONS, msg))
        })?;

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        tokio::spawn(traceroute::run_traceroute(
            host,
            options,
            cancel.child_token(),
            tx,
            Arc::clone(&self.logger),
        ));
        Ok(ReceiverStream::new(rx))
    }

    /// Resolve DNS records for a domain.
    ///
    /// `record_type` is one of `"A"`, `"AAAA"`, `"MX"`, `"TXT"`, `"CNAME"`, `"NS"`
    /// (case-insensitive). The configured nameserver is used when set, otherwise the system
    /// resolver.
    pub async fn dns_lookup(
        &self,
        cancel: &CancellationToken,
        domain: &str,
        record_type: &str,
    ) -> NetTraceResult<DnsResult> {
        let domain = validate::validate_host(domain, codes::DNS_INVALID_DOMAIN)
            .map_err(|e| self.fail(e))?;
        let record_type: DnsRecordType = record_type.parse().map_err(|msg: String| {
            self.fail(
                NetTraceError::validation(codes::DNS_UNSUPPORTED_TYPE, msg)
                    .with_context("recordType", record_type),
            )
        })?;

        let limit = self.config.timeout;
        let nameserver = self.config.nameserver;
        let logger = self.logger.as_ref();
        let resolver = resolver::build_resolver_for_ns(nameserver, limit, logger);
        let label = resolver::nameserver_label(nameserver);
        let (resolver, domain) = (&resolver, domain.as_str());

        self.run_single(cancel, move || {
            dns::lookup(resolver, label.clone(), domain, record_type, limit, logger)
                .map_err(engine_error(codes::DNS_LOOKUP_FAILED, "DNS lookup"))
        })
        .await
    }

    /// Query WHOIS registration data for a domain or IP address.
    pub async fn whois_lookup(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> NetTraceResult<WhoisResult> {
        let query = validate::validate_query(query).map_err(|e| self.fail(e))?;
        let limit = self.config.timeout;
        let query = query.as_str();
        let logger = self.logger.as_ref();

        self.run_single(cancel, move || {
            whois::whois_lookup(query, limit, logger)
                .map_err(engine_error(codes::WHOIS_LOOKUP_FAILED, "WHOIS lookup"))
        })
        .await
    }

    /// Inspect the TLS certificate served by `host:port`.
    ///
    /// Certificate problems (expiry, name mismatch, untrusted issuer) are reported in the
    /// result rather than as errors.
    #[cfg(feature = "rustls")]
    pub async fn ssl_check(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u32,
    ) -> NetTraceResult<crate::types::SslResult> {
        let host = validate::validate_host(host, codes::SSL_INVALID_HOST)
            .map_err(|e| self.fail(e))?;
        let port = validate::validate_port(port).map_err(|e| self.fail(e))?;
        let limit = self.config.timeout;
        let host = host.as_str();
        let logger = self.logger.as_ref();

        self.run_single(cancel, move || {
            ssl::ssl_check(host, port, limit, logger)
                .map_err(engine_error(codes::SSL_CHECK_FAILED, "SSL check"))
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::collab::NoopLogger;
    use crate::collab::testing::RecordingLogger;

    /// Records codes it sees and returns errors unchanged.
    #[derive(Default)]
    struct RecordingHandler {
        codes: Mutex<Vec<&'static str>>,
    }

    impl ErrorHandler for RecordingHandler {
        fn handle(&self, error: NetTraceError) -> NetTraceError {
            self.codes.lock().unwrap().push(error.code);
            error
        }
    }

    /// Replaces every error with a fixed one.
    struct ReplacingHandler;

    impl ErrorHandler for ReplacingHandler {
        fn handle(&self, error: NetTraceError) -> NetTraceError {
            NetTraceError::network("RECOVERED", format!("recovered from {}", error.code))
        }
    }

    fn client() -> DiagnosticClient {
        DiagnosticClient::with_collaborators(
            NetworkConfig::default(),
            Arc::new(NoopLogger),
            Arc::new(PassthroughErrorHandler),
        )
    }

    #[tokio::test]
    async fn test_validation_codes() {
        let client = client();
        let cancel = CancellationToken::new();

        let err = client.ping(&cancel, "", PingOptions::default()).await.unwrap_err();
        assert_eq!(err.code, codes::PING_INVALID_HOST);

        let err = client
            .traceroute(&cancel, &"a".repeat(300), TracerouteOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::TRACE_INVALID_HOST);

        let err = client.dns_lookup(&cancel, " ", "A").await.unwrap_err();
        assert_eq!(err.code, codes::DNS_INVALID_DOMAIN);

        let err = client.whois_lookup(&cancel, "").await.unwrap_err();
        assert_eq!(err.code, codes::WHOIS_INVALID_QUERY);

        let err = client.ssl_check(&cancel, "", 443).await.unwrap_err();
        assert_eq!(err.code, codes::SSL_INVALID_HOST);

        for port in [0, 65536] {
            let err = client.ssl_check(&cancel, "example.com", port).await.unwrap_err();
            assert_eq!(err.code, codes::SSL_INVALID_PORT);
            assert!(err.is_validation());
        }
    }

    #[tokio::test]
    async fn test_invalid_options_codes() {
        let client = client();
        let cancel = CancellationToken::new();

        let options = PingOptions {
            timeout: Duration::ZERO,
            ..PingOptions::default()
        };
        let err = client.ping(&cancel, "127.0.0.1", options).await.unwrap_err();
        assert_eq!(err.code, codes::PING_INVALID_OPTIONS);

        let options = TracerouteOptions {
            max_hops: 0,
            ..TracerouteOptions::default()
        };
        let err = client
            .traceroute(&cancel, "127.0.0.1", options)
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::TRACE_INVALID_OPTIONS);
    }

    #[tokio::test]
    async fn test_unsupported_record_type_is_synchronous() {
        let client = client();
        let err = client
            .dns_lookup(&CancellationToken::new(), "example.com", "SOA")
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::DNS_UNSUPPORTED_TYPE);
        assert!(err.is_validation());
        assert_eq!(err.context.get("recordType").map(String::as_str), Some("SOA"));
    }

    #[tokio::test]
    async fn test_errors_pass_through_handler() {
        let handler = Arc::new(RecordingHandler::default());
        let logger = Arc::new(RecordingLogger::default());
        let client = DiagnosticClient::with_collaborators(
            NetworkConfig::default(),
            logger.clone(),
            handler.clone(),
        );
        let cancel = CancellationToken::new();

        let _ = client.whois_lookup(&cancel, " ").await;
        let _ = client.dns_lookup(&cancel, "example.com", "PTR").await;

        assert_eq!(
            *handler.codes.lock().unwrap(),
            vec![codes::WHOIS_INVALID_QUERY, codes::DNS_UNSUPPORTED_TYPE]
        );
        assert_eq!(logger.count("DEBUG"), 2);
    }

    #[tokio::test]
    async fn test_handler_can_replace_error() {
        let client = DiagnosticClient::with_collaborators(
            NetworkConfig::default(),
            Arc::new(NoopLogger),
            Arc::new(ReplacingHandler),
        );
        let err = client
            .whois_lookup(&CancellationToken::new(), "")
            .await
            .unwrap_err();
        assert_eq!(err.code, "RECOVERED");
    }

    #[tokio::test]
    async fn test_cancelled_before_lookup() {
        let client = client();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.whois_lookup(&cancel, "example.com").await.unwrap_err();
        assert_eq!(err.code, codes::RETRY_CANCELLED);
        assert!(err.is_cancelled());

        let err = client
            .ssl_check(&cancel, "127.0.0.1", 443)
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::RETRY_CANCELLED);
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let logger = Arc::new(RecordingLogger::default());
        let client = DiagnosticClient::with_collaborators(
            NetworkConfig::default(),
            logger.clone(),
            Arc::new(PassthroughErrorHandler),
        );

        let err = client
            .ssl_check(&CancellationToken::new(), "127.0.0.1", u32::from(port))
            .await
            .unwrap_err();

        // Connection refused is terminal: one attempt, wrapped in the exhaustion error.
        assert_eq!(err.code, codes::RETRY_EXHAUSTED);
        assert_eq!(err.context.get("attempts").map(String::as_str), Some("1"));
        assert!(!err.is_transient());
        // Engine connect warning plus the executor's give-up warning.
        assert_eq!(logger.count("WARN"), 2);
        assert_eq!(logger.count("ERROR"), 1);
        let lines = logger.lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.starts_with("WARN [SSL] TCP connection failed")));
        assert!(lines.iter().any(|l| l.starts_with("DEBUG [SSL] Starting check")));
    }

    #[tokio::test]
    async fn test_ping_stream_through_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let options = PingOptions {
            count: 2,
            interval: Duration::from_millis(10),
            port,
            ..PingOptions::default()
        };

        let stream = client()
            .ping(&CancellationToken::new(), " 127.0.0.1 ", options)
            .await
            .unwrap();
        let results: Vec<PingResult> = stream.collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sequence, 1);
        assert_eq!(results[1].sequence, 2);
        assert!(results.iter().all(PingResult::is_success));
    }

    #[tokio::test]
    async fn test_parent_cancel_ends_traceroute() {
        let cancel = CancellationToken::new();
        let mut stream = client()
            .traceroute(&cancel, "127.0.0.1", TracerouteOptions::default())
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().number, 1);
        cancel.cancel();
        let rest: Vec<TracerouteHop> = stream.collect().await;
        assert!(rest.len() <= 1);
    }
}
