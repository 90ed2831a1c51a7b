//! Public types returned by diagnostic operations.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A probed host: the name that was asked for and the address it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    /// Hostname (or address literal) as reported for this sample.
    pub hostname: String,
    /// Resolved address; absent when resolution or the probe failed.
    pub ip: Option<IpAddr>,
}

impl Host {
    pub fn new(hostname: impl Into<String>, ip: Option<IpAddr>) -> Self {
        Self {
            hostname: hostname.into(),
            ip,
        }
    }
}

/// One ping probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    /// 1-based sequence number.
    pub sequence: u32,
    /// Target host.
    pub host: Host,
    /// Round-trip time (connection setup time); `None` on failure.
    #[serde(with = "crate::utils::duration::option")]
    pub rtt: Option<Duration>,
    /// TTL hint from the request.
    pub ttl: u8,
    /// Packet size hint from the request.
    pub packet_size: u16,
    /// Failure description, verbatim.
    pub error: Option<String>,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

impl PingResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.rtt.is_some()
    }
}

/// One traceroute hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracerouteHop {
    /// 1-based hop number.
    pub number: u8,
    /// Responding host. `ip` is `None` when every query timed out.
    pub host: Host,
    /// Round-trip times of the successful queries, in query order.
    #[serde(with = "crate::utils::duration::vec")]
    pub rtts: Vec<Duration>,
    /// `true` iff every query for this hop timed out.
    pub timeout: bool,
    /// Failure description, if any.
    pub error: Option<String>,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

/// DNS record types supported by lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    /// IPv4 address record.
    A,
    /// IPv6 address record.
    Aaaa,
    /// Mail exchange record.
    Mx,
    /// Text record.
    Txt,
    /// Canonical name (alias) record.
    Cname,
    /// Name server record.
    Ns,
}

impl DnsRecordType {
    /// Every supported type, in display order.
    pub const ALL: [Self; 6] = [Self::A, Self::Aaaa, Self::Mx, Self::Txt, Self::Cname, Self::Ns];
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::Aaaa => write!(f, "AAAA"),
            Self::Mx => write!(f, "MX"),
            Self::Txt => write!(f, "TXT"),
            Self::Cname => write!(f, "CNAME"),
            Self::Ns => write!(f, "NS"),
        }
    }
}

impl FromStr for DnsRecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::Aaaa),
            "MX" => Ok(Self::Mx),
            "TXT" => Ok(Self::Txt),
            "CNAME" => Ok(Self::Cname),
            "NS" => Ok(Self::Ns),
            _ => Err(format!("Unsupported DNS record type: {s}")),
        }
    }
}

/// A single DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    /// Record name (owner).
    pub name: String,
    /// Record type; always equal to the requested type.
    pub record_type: DnsRecordType,
    /// Record value. Domain names have their trailing dot removed.
    pub value: String,
    /// Time-to-live in seconds.
    pub ttl: u32,
    /// Preference (MX only).
    pub priority: Option<u16>,
}

/// Result of a DNS lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsResult {
    /// Queried name.
    pub query: String,
    /// Requested record type.
    pub record_type: DnsRecordType,
    /// Returned records, in answer order.
    pub records: Vec<DnsRecord>,
    /// Time taken by the successful query.
    #[serde(with = "crate::utils::duration")]
    pub response_time: Duration,
    /// Resolver that answered: a configured IP, or a label for the system configuration.
    pub nameserver: String,
}

/// WHOIS contact role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactRole {
    Registrant,
    Admin,
    Tech,
}

impl fmt::Display for ContactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registrant => write!(f, "registrant"),
            Self::Admin => write!(f, "admin"),
            Self::Tech => write!(f, "tech"),
        }
    }
}

/// WHOIS contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: Option<String>,
    pub organization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Address lines joined with `", "`.
    pub address: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.organization.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
    }
}

/// WHOIS query result with parsed registration fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisResult {
    /// The queried domain name or address.
    pub domain: String,
    /// WHOIS server that answered (`host:port`).
    pub server: String,
    /// Domain registrar (e.g. "Cloudflare, Inc.").
    pub registrar: Option<String>,
    /// Registration creation date.
    pub created: Option<DateTime<Utc>>,
    /// Last updated date.
    pub updated: Option<DateTime<Utc>>,
    /// Registration expiration date.
    pub expires: Option<DateTime<Utc>>,
    /// Authoritative name servers, lowercased and deduplicated.
    pub name_servers: Vec<String>,
    /// EPP status codes, deduplicated.
    pub status: Vec<String>,
    /// Contacts by role.
    pub contacts: BTreeMap<ContactRole, Contact>,
    /// Raw WHOIS response text.
    pub raw: String,
}

/// Parsed X.509 certificate fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Serial number (uppercase hex).
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Signature algorithm OID.
    pub signature_algorithm: String,
    /// DNS Subject Alternative Names.
    pub san: Vec<String>,
    /// Whether this is a CA certificate.
    pub is_ca: bool,
}

/// SSL/TLS certificate check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslResult {
    /// Queried host.
    pub host: String,
    /// Port that was checked.
    pub port: u16,
    /// Negotiated protocol version (e.g. `"TLSv1_3"`).
    pub protocol: Option<String>,
    /// Leaf certificate.
    pub certificate: CertificateInfo,
    /// Remaining chain as sent by the server, leaf excluded.
    pub chain: Vec<CertificateInfo>,
    /// `true` iff `validation_errors` is empty.
    pub is_valid: bool,
    /// Human-readable validation failures.
    pub validation_errors: Vec<String>,
    /// Leaf expiry.
    pub expires: DateTime<Utc>,
    /// Days until expiry (negative once expired).
    pub days_remaining: i64,
    /// Leaf issuer DN.
    pub issuer: String,
    /// Leaf subject DN.
    pub subject: String,
    /// Leaf DNS Subject Alternative Names.
    pub san: Vec<String>,
}
