//! Raw WHOIS protocol client (RFC 3912).

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::collab::Logger;
use crate::error::TransportError;

/// Responses beyond this size are truncated.
pub const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// Send `query` to `server` (`host:port`) and read the response until the server closes.
///
/// Connecting, writing and reading are each bounded by `limit`.
pub async fn query_server(
    server: &str,
    query: &str,
    limit: Duration,
    logger: &dyn Logger,
) -> Result<String, TransportError> {
    logger.debug(&format!("[WHOIS] Querying {server} for {query}"));

    let mut stream = timeout(limit, TcpStream::connect(server))
        .await
        .map_err(|_| TransportError::Timeout(limit))??;

    timeout(limit, stream.write_all(format!("{query}\r\n").as_bytes()))
        .await
        .map_err(|_| TransportError::Timeout(limit))??;

    let mut buf = Vec::new();
    timeout(limit, read_response(&mut stream, &mut buf))
        .await
        .map_err(|_| TransportError::Timeout(limit))??;

    logger.debug(&format!("[WHOIS] {server} returned {} bytes", buf.len()));
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Read into `buf` until EOF or [`MAX_RESPONSE_BYTES`].
///
/// Servers that reset the connection after answering are treated as having closed it, as long
/// as some data arrived first.
async fn read_response<R>(reader: R, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = reader.take(MAX_RESPONSE_BYTES);
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => return Ok(()),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if !buf.is_empty() && is_abortive_close(e.kind()) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

fn is_abortive_close(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::AsyncBufReadExt;
    use tokio::io::BufReader;
    use tokio::net::TcpListener;

    use super::*;
    use crate::collab::NoopLogger;

    /// Serve one connection: record the request line, reply with `response`, close.
    async fn serve_once(response: Vec<u8>) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let mut socket = reader.into_inner();
            socket.write_all(&response).await.unwrap();
            socket.shutdown().await.unwrap();
            line
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_query_sends_crlf_and_reads_to_close() {
        let body = b"Domain Name: EXAMPLE.COM\r\nRegistrar: Example Registrar\r\n".to_vec();
        let (addr, handle) = serve_once(body.clone()).await;

        let response = query_server(&addr, "example.com", Duration::from_secs(2), &NoopLogger)
            .await
            .unwrap();

        assert_eq!(response.as_bytes(), body.as_slice());
        assert_eq!(handle.await.unwrap(), "example.com\r\n");
    }

    #[tokio::test]
    async fn test_reset_after_answer_keeps_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let mut socket = reader.into_inner();
            socket.write_all(b"Registrar: Abrupt Registrar\r\n").await.unwrap();
            // Zero linger turns the close into a RST.
            #[allow(deprecated)]
            socket.set_linger(Some(Duration::ZERO)).unwrap();
            drop(socket);
        });

        let response = query_server(&addr, "example.com", Duration::from_secs(2), &NoopLogger)
            .await
            .unwrap();
        assert_eq!(response, "Registrar: Abrupt Registrar\r\n");
    }

    #[tokio::test]
    async fn test_reset_before_any_data_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let socket = reader.into_inner();
            #[allow(deprecated)]
            socket.set_linger(Some(Duration::ZERO)).unwrap();
            drop(socket);
        });

        let err = query_server(&addr, "example.com", Duration::from_secs(2), &NoopLogger)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_lossy() {
        let (addr, _handle) = serve_once(vec![b'o', b'k', 0xff, b'!']).await;
        let response = query_server(&addr, "example.com", Duration::from_secs(2), &NoopLogger)
            .await
            .unwrap();
        assert_eq!(response, "ok\u{fffd}!");
    }

    #[tokio::test]
    async fn test_oversized_response_truncated() {
        let size = usize::try_from(MAX_RESPONSE_BYTES).unwrap() + 4096;
        let (addr, _handle) = serve_once(vec![b'a'; size]).await;
        let response = query_server(&addr, "example.com", Duration::from_secs(5), &NoopLogger)
            .await
            .unwrap();
        assert_eq!(response.len(), usize::try_from(MAX_RESPONSE_BYTES).unwrap());
    }

    #[tokio::test]
    async fn test_refused_is_io_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let err = query_server(&addr, "example.com", Duration::from_secs(2), &NoopLogger)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let err = query_server(&addr, "example.com", Duration::from_millis(100), &NoopLogger)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
