//! DNS lookups

use std::time::{Duration, Instant};

use hickory_resolver::TokioResolver;
use hickory_resolver::proto::rr::{RData, Record, RecordType};

use crate::collab::Logger;
use crate::error::TransportError;
use crate::types::{DnsRecord, DnsRecordType, DnsResult};

fn to_hickory(record_type: DnsRecordType) -> RecordType {
    match record_type {
        DnsRecordType::A => RecordType::A,
        DnsRecordType::Aaaa => RecordType::AAAA,
        DnsRecordType::Mx => RecordType::MX,
        DnsRecordType::Txt => RecordType::TXT,
        DnsRecordType::Cname => RecordType::CNAME,
        DnsRecordType::Ns => RecordType::NS,
    }
}

fn trim_dot(name: &impl ToString) -> String {
    name.to_string().trim_end_matches('.').to_string()
}

/// Render one answer record, or `None` if its data does not belong to `record_type`.
fn to_record(record: &Record, record_type: DnsRecordType) -> Option<DnsRecord> {
    let (value, priority) = match (record_type, record.data()) {
        (DnsRecordType::A, RData::A(ip)) => (ip.to_string(), None),
        (DnsRecordType::Aaaa, RData::AAAA(ip)) => (ip.to_string(), None),
        (DnsRecordType::Mx, RData::MX(mx)) => (trim_dot(mx.exchange()), Some(mx.preference())),
        (DnsRecordType::Txt, RData::TXT(txt)) => (
            txt.iter()
                .map(|data| String::from_utf8_lossy(data).to_string())
                .collect::<String>(),
            None,
        ),
        (DnsRecordType::Cname, RData::CNAME(cname)) => (trim_dot(&cname.0), None),
        (DnsRecordType::Ns, RData::NS(ns)) => (trim_dot(&ns.0), None),
        _ => return None,
    };

    Some(DnsRecord {
        name: trim_dot(record.name()),
        record_type,
        value,
        ttl: record.ttl(),
        priority,
    })
}

/// Query `domain` for `record_type`.
///
/// Answers of other types (e.g. the CNAME chain in front of an A answer) are dropped. A name
/// without records of the type yields an empty result rather than an error.
pub async fn lookup(
    resolver: &TokioResolver,
    nameserver: String,
    domain: &str,
    record_type: DnsRecordType,
    limit: Duration,
    logger: &dyn Logger,
) -> Result<DnsResult, TransportError> {
    let start = Instant::now();
    let answer = tokio::time::timeout(limit, resolver.lookup(domain, to_hickory(record_type)))
        .await
        .map_err(|_| TransportError::Timeout(limit))?;

    let records = match answer {
        Ok(response) => response
            .record_iter()
            .filter_map(|record| to_record(record, record_type))
            .collect(),
        Err(e) if e.is_no_records_found() || e.is_nx_domain() => {
            logger.debug(&format!("[DNS] No {record_type} records for {domain}"));
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    Ok(DnsResult {
        query: domain.to_string(),
        record_type,
        records,
        response_time: start.elapsed(),
        nameserver,
    })
}
