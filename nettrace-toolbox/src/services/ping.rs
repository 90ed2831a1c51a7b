//! Ping via timed TCP connection attempts.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collab::Logger;
use crate::config::PingOptions;
use crate::types::{Host, PingResult};

use super::probe::{resolve_target, tcp_probe};

/// Produce ping samples into `tx` until `count` is reached, `cancel` fires or the receiver
/// is dropped. `count == 0` runs until cancelled.
pub async fn run_ping(
    host: String,
    options: PingOptions,
    cancel: CancellationToken,
    tx: mpsc::Sender<PingResult>,
    logger: Arc<dyn Logger>,
) {
    logger.debug(&format!("[Ping] Starting {host} count={}", options.count));

    let resolved = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        resolved = resolve_target(&host, options.ipv6, options.timeout) => resolved,
    };

    let ip = match resolved {
        Ok(ip) => ip,
        Err(e) => {
            logger.warn(&format!("[Ping] Cannot resolve {host}: {e}"));
            let _ = tx
                .send(PingResult {
                    sequence: 1,
                    host: Host::new(host, None),
                    rtt: None,
                    ttl: options.ttl,
                    packet_size: options.packet_size,
                    error: Some(e.to_string()),
                    timestamp: Utc::now(),
                })
                .await;
            return;
        }
    };

    let target = SocketAddr::new(ip, options.port);
    let mut sequence: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        sequence = sequence.saturating_add(1);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = tcp_probe(target, options.timeout) => outcome,
        };

        let (rtt, error) = match outcome {
            Ok(rtt) => (Some(rtt), None),
            Err(e) => (None, Some(e.to_string())),
        };
        logger.debug(&format!(
            "[Ping] {target} seq={sequence} rtt={rtt:?} error={error:?}"
        ));

        let sample = PingResult {
            sequence,
            host: Host::new(host.clone(), Some(ip)),
            rtt,
            ttl: options.ttl,
            packet_size: options.packet_size,
            error,
            timestamp: Utc::now(),
        };
        if tx.send(sample).await.is_err() {
            break;
        }

        if options.count != 0 && sequence >= options.count {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(options.interval) => {}
        }
    }

    logger.debug(&format!("[Ping] Finished {host} after {sequence} probe(s)"));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio_stream::StreamExt;
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;
    use crate::collab::NoopLogger;

    async fn local_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    fn start(
        host: &str,
        options: PingOptions,
        cancel: &CancellationToken,
    ) -> ReceiverStream<PingResult> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(run_ping(
            host.to_string(),
            options,
            cancel.clone(),
            tx,
            Arc::new(NoopLogger),
        ));
        ReceiverStream::new(rx)
    }

    #[tokio::test]
    async fn test_ping_count_sequence_and_packet_size() {
        let (_listener, port) = local_listener().await;
        let options = PingOptions {
            count: 3,
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(2),
            packet_size: 128,
            port,
            ..PingOptions::default()
        };

        let results: Vec<PingResult> = start("127.0.0.1", options, &CancellationToken::new())
            .collect()
            .await;

        assert_eq!(results.len(), 3);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.sequence, u32::try_from(i).unwrap() + 1);
            assert_eq!(r.packet_size, 128);
            assert!(r.is_success(), "probe failed: {:?}", r.error);
            assert_eq!(r.host.ip, Some("127.0.0.1".parse().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_ping_records_failure_verbatim() {
        let port = {
            let (listener, port) = local_listener().await;
            drop(listener);
            port
        };
        let options = PingOptions {
            count: 2,
            interval: Duration::from_millis(5),
            timeout: Duration::from_secs(2),
            port,
            ..PingOptions::default()
        };

        let results: Vec<PingResult> = start("127.0.0.1", options, &CancellationToken::new())
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.rtt.is_none() && r.error.is_some()));
    }

    #[tokio::test]
    async fn test_ping_unresolvable_family_emits_single_failure() {
        let options = PingOptions {
            count: 5,
            ipv6: true,
            ..PingOptions::default()
        };
        let results: Vec<PingResult> = start("127.0.0.1", options, &CancellationToken::new())
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].sequence, 1);
        assert!(results[0].host.ip.is_none());
        assert!(results[0].error.is_some());
    }

    #[tokio::test]
    async fn test_ping_continuous_until_cancelled() {
        let (_listener, port) = local_listener().await;
        let options = PingOptions {
            count: 0,
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(2),
            port,
            ..PingOptions::default()
        };
        let cancel = CancellationToken::new();
        let mut stream = start("127.0.0.1", options, &cancel);

        let mut seen = Vec::new();
        while let Some(r) = stream.next().await {
            seen.push(r.sequence);
            if seen.len() == 3 {
                cancel.cancel();
            }
        }

        // Sequence numbers are strictly increasing with no duplicates after cancellation.
        assert!(seen.len() >= 3);
        assert!(seen.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(seen[0], 1);
    }

    #[tokio::test]
    async fn test_ping_cancelled_before_start_emits_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let results: Vec<PingResult> = start("127.0.0.1", PingOptions::default(), &cancel)
            .collect()
            .await;
        assert!(results.is_empty());
    }
}
