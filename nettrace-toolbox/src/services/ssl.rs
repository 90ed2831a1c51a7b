//! SSL/TLS certificate inspection.
//!
//! The handshake runs with a verifier that records validation failures instead of aborting, so
//! an expired or mismatched certificate is still reported in full.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

use crate::collab::Logger;
use crate::error::TransportError;
use crate::types::{CertificateInfo, SslResult};

const MSG_EXPIRED: &str = "certificate has expired";
const MSG_NOT_YET_VALID: &str = "certificate is not yet valid";
const MSG_UNTRUSTED: &str = "certificate issuer is not trusted";

/// Initialize the rustls `CryptoProvider` (once).
///
/// `install_default` returns `Err` only when a provider is already installed.
fn ensure_crypto_provider() {
    let _ = CryptoProvider::install_default(rustls::crypto::ring::default_provider());
}

fn name_mismatch(host: &str) -> String {
    format!("certificate does not match host {host}")
}

/// Human-readable form of a chain verification failure.
fn describe(err: &rustls::Error, host: &str) -> String {
    match err {
        rustls::Error::InvalidCertificate(CertificateError::Expired) => MSG_EXPIRED.to_string(),
        rustls::Error::InvalidCertificate(CertificateError::NotValidYet) => {
            MSG_NOT_YET_VALID.to_string()
        }
        rustls::Error::InvalidCertificate(CertificateError::NotValidForName) => {
            name_mismatch(host)
        }
        rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer) => {
            MSG_UNTRUSTED.to_string()
        }
        other => other.to_string(),
    }
}

/// Delegates to the WebPKI verifier but lets the handshake continue on failure.
#[derive(Debug)]
struct RecordingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    errors: Arc<Mutex<Vec<rustls::Error>>>,
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if let Err(e) = self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            if let Ok(mut errors) = self.errors.lock() {
                errors.push(e);
            }
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

fn build_connector() -> Result<(TlsConnector, Arc<Mutex<Vec<rustls::Error>>>), TransportError> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let inner = WebPkiServerVerifier::builder(Arc::new(root_store))
        .build()
        .map_err(|e| TransportError::Tls(format!("Failed to build verifier: {e}")))?;
    let errors = Arc::new(Mutex::new(Vec::new()));
    let verifier = RecordingVerifier {
        inner,
        errors: Arc::clone(&errors),
    };

    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok((TlsConnector::from(Arc::new(config)), errors))
}

/// Connect to `host:port`, complete a TLS handshake and inspect the presented chain.
///
/// Connection and handshake are each bounded by `limit`. Certificate problems do not fail the
/// call; they are listed in [`SslResult::validation_errors`].
pub async fn ssl_check(
    host: &str,
    port: u16,
    limit: Duration,
    logger: &dyn Logger,
) -> Result<SslResult, TransportError> {
    ensure_crypto_provider();

    logger.debug(&format!("[SSL] Starting check for {host}:{port}"));
    let start_time = Instant::now();

    let stream = timeout(limit, TcpStream::connect((host, port)))
        .await
        .map_err(|_| TransportError::Timeout(limit))?
        .inspect_err(|e| logger.warn(&format!("[SSL] TCP connection failed: {e}")))?;
    logger.debug(&format!(
        "[SSL] TCP connection succeeded, took {:?}",
        start_time.elapsed()
    ));

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| TransportError::Tls(format!("Invalid server name: {host}")))?;
    let (connector, recorded) = build_connector()?;

    let tls_start = Instant::now();
    let tls_stream = match timeout(limit, connector.connect(server_name, stream)).await {
        Ok(Ok(stream)) => {
            logger.debug(&format!(
                "[SSL] TLS handshake succeeded, took {:?}",
                tls_start.elapsed()
            ));
            stream
        }
        Ok(Err(e)) => {
            logger.warn(&format!("[SSL] TLS handshake failed: {e}"));
            let err = TransportError::Io(e);
            return Err(if err.is_timeout() || err.is_temporary() {
                err
            } else {
                TransportError::Tls(format!("Handshake failed: {err}"))
            });
        }
        Err(_) => {
            logger.warn(&format!("[SSL] TLS handshake timeout ({limit:?})"));
            return Err(TransportError::Timeout(limit));
        }
    };

    let (_, tls_conn) = tls_stream.get_ref();
    let protocol = tls_conn.protocol_version().map(|v| format!("{v:?}"));
    let certs = match tls_conn.peer_certificates() {
        Some(c) if !c.is_empty() => {
            logger.debug(&format!("[SSL] Retrieved {} certificate(s)", c.len()));
            c
        }
        _ => {
            logger.warn("[SSL] No certificates found");
            return Err(TransportError::Certificate(
                "No certificate presented".to_string(),
            ));
        }
    };

    let mut parsed = certs.iter().map(|c| {
        X509Certificate::from_der(c.as_ref())
            .map(|(_, cert)| cert)
            .map_err(|e| TransportError::Certificate(format!("Certificate parsing failed: {e}")))
    });
    let leaf = match parsed.next() {
        Some(leaf) => leaf?,
        None => {
            return Err(TransportError::Certificate(
                "No certificate presented".to_string(),
            ));
        }
    };
    let chain: Vec<CertificateInfo> = parsed
        .filter_map(Result::ok)
        .map(|cert| parse_certificate(&cert))
        .collect();

    let certificate = parse_certificate(&leaf);
    let cn = leaf
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(String::from);

    let now = Utc::now();
    let mut validation_errors = Vec::new();
    if now > certificate.not_after {
        validation_errors.push(MSG_EXPIRED.to_string());
    }
    if now < certificate.not_before {
        validation_errors.push(MSG_NOT_YET_VALID.to_string());
    }
    if !check_domain_match(host, cn.as_deref(), &certificate.san) {
        validation_errors.push(name_mismatch(host));
    }
    if let Ok(errors) = recorded.lock() {
        for message in errors.iter().map(|e| describe(e, host)) {
            if !validation_errors.contains(&message) {
                validation_errors.push(message);
            }
        }
    }

    let days_remaining = (certificate.not_after - now).num_days();
    logger.debug(&format!(
        "[SSL] Check completed: {host} - valid={}, days_remaining={days_remaining}, \
         chain_length={}, total_time={:?}",
        validation_errors.is_empty(),
        chain.len(),
        start_time.elapsed()
    ));

    Ok(SslResult {
        host: host.to_string(),
        port,
        protocol,
        is_valid: validation_errors.is_empty(),
        validation_errors,
        expires: certificate.not_after,
        days_remaining,
        issuer: certificate.issuer.clone(),
        subject: certificate.subject.clone(),
        san: certificate.san.clone(),
        certificate,
        chain,
    })
}

fn asn1_to_utc(time: x509_parser::time::ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

/// Render a DNS or IP address SAN entry; other name forms are skipped.
fn san_entry(name: &x509_parser::extensions::GeneralName<'_>) -> Option<String> {
    use x509_parser::extensions::GeneralName;

    match name {
        GeneralName::DNSName(dns) => Some((*dns).to_string()),
        GeneralName::IPAddress(bytes) => match bytes.len() {
            4 => <[u8; 4]>::try_from(*bytes).ok().map(|b| IpAddr::from(b).to_string()),
            16 => <[u8; 16]>::try_from(*bytes).ok().map(|b| IpAddr::from(b).to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Parse certificate fields into [`CertificateInfo`].
fn parse_certificate(cert: &X509Certificate<'_>) -> CertificateInfo {
    let san: Vec<String> = cert
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|ext| {
            ext.value
                .general_names
                .iter()
                .filter_map(san_entry)
                .collect()
        })
        .unwrap_or_default();

    CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial_number: cert.serial.to_str_radix(16).to_uppercase(),
        not_before: asn1_to_utc(cert.validity().not_before),
        not_after: asn1_to_utc(cert.validity().not_after),
        signature_algorithm: cert.signature_algorithm.algorithm.to_string(),
        san,
        is_ca: cert.is_ca(),
    }
}

/// Check whether the queried domain/IP matches the certificate's CN or SANs.
///
/// An IP address query is compared by address value, without wildcards.
fn check_domain_match(query: &str, cn: Option<&str>, san: &[String]) -> bool {
    if let Ok(ip) = query.parse::<IpAddr>() {
        return cn
            .into_iter()
            .chain(san.iter().map(String::as_str))
            .any(|name| name.parse::<IpAddr>().is_ok_and(|addr| addr == ip));
    }

    let query_lower = query.to_lowercase();

    if let Some(cn) = cn
        && matches_domain(&query_lower, &cn.to_lowercase())
    {
        return true;
    }

    san.iter()
        .any(|name| matches_domain(&query_lower, &name.to_lowercase()))
}

/// Domain matching with wildcard support.
fn matches_domain(query: &str, pattern: &str) -> bool {
    if query == pattern {
        return true;
    }

    // *.example.com matches foo.example.com but not foo.bar.example.com
    if let Some(suffix) = pattern.strip_prefix("*.")
        && let Some(prefix) = query.strip_suffix(suffix)
        && let Some(label) = prefix.strip_suffix('.')
    {
        return !label.is_empty() && !label.contains('.');
    }

    false
}
