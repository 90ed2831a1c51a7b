//! Best-effort field extraction from free-text WHOIS responses.
//!
//! Registries disagree on key names, so each canonical field has a set of synonym keys. A
//! malformed or unknown line is skipped; parsing never fails.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};

use super::dates::parse_date;
use crate::types::{Contact, ContactRole, WhoisResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Registrar,
    Created,
    Updated,
    Expires,
    NameServers,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContactField {
    Name,
    Organization,
    Email,
    Phone,
    Address,
}

static FIELD_KEYS: LazyLock<HashMap<&'static str, Field>> = LazyLock::new(|| {
    let groups: [(Field, &[&str]); 6] = [
        (
            Field::Registrar,
            &[
                "registrar",
                "registrar name",
                "sponsoring registrar",
                "registrar organization",
            ],
        ),
        (
            Field::Created,
            &[
                "creation date",
                "created",
                "created on",
                "created date",
                "registered",
                "registered on",
                "registration date",
                "registration time",
                "domain registration date",
                "domain create date",
            ],
        ),
        (
            Field::Updated,
            &[
                "updated date",
                "updated",
                "updated on",
                "last updated",
                "last update",
                "last modified",
                "modified",
                "changed",
                "domain last updated date",
            ],
        ),
        (
            Field::Expires,
            &[
                "registry expiry date",
                "registrar registration expiration date",
                "expiration date",
                "expiry date",
                "expires",
                "expires on",
                "expire date",
                "expiration time",
                "paid-till",
                "renewal date",
                "domain expiration date",
            ],
        ),
        (
            Field::NameServers,
            &[
                "name server",
                "name servers",
                "nameserver",
                "nameservers",
                "nserver",
                "dns",
                "host name",
            ],
        ),
        (Field::Status, &["domain status", "status", "state"]),
    ];

    groups
        .into_iter()
        .flat_map(|(field, keys)| keys.iter().map(move |k| (*k, field)))
        .collect()
});

/// Role prefixes, longest first so `administrative contact` wins over `admin`.
const ROLE_PREFIXES: &[(&str, ContactRole)] = &[
    ("registrant contact", ContactRole::Registrant),
    ("registrant", ContactRole::Registrant),
    ("administrative contact", ContactRole::Admin),
    ("administrative", ContactRole::Admin),
    ("admin contact", ContactRole::Admin),
    ("admin", ContactRole::Admin),
    ("technical contact", ContactRole::Tech),
    ("technical", ContactRole::Tech),
    ("tech contact", ContactRole::Tech),
    ("tech", ContactRole::Tech),
];

static CONTACT_SUFFIXES: LazyLock<HashMap<&'static str, ContactField>> = LazyLock::new(|| {
    HashMap::from([
        ("", ContactField::Name),
        ("name", ContactField::Name),
        ("contact name", ContactField::Name),
        ("organization", ContactField::Organization),
        ("organisation", ContactField::Organization),
        ("org", ContactField::Organization),
        ("contact organization", ContactField::Organization),
        ("email", ContactField::Email),
        ("e-mail", ContactField::Email),
        ("contact email", ContactField::Email),
        ("phone", ContactField::Phone),
        ("phone number", ContactField::Phone),
        ("contact phone", ContactField::Phone),
        ("telephone", ContactField::Phone),
        ("street", ContactField::Address),
        ("address", ContactField::Address),
        ("city", ContactField::Address),
        ("state/province", ContactField::Address),
        ("state", ContactField::Address),
        ("province", ContactField::Address),
        ("postal code", ContactField::Address),
        ("postcode", ContactField::Address),
        ("country", ContactField::Address),
        ("country code", ContactField::Address),
    ])
});

fn contact_key(key: &str) -> Option<(ContactRole, ContactField)> {
    ROLE_PREFIXES.iter().find_map(|(prefix, role)| {
        let rest = key.strip_prefix(prefix)?;
        if !rest.is_empty() && !rest.starts_with(' ') {
            return None;
        }
        CONTACT_SUFFIXES
            .get(rest.trim_start())
            .map(|field| (*role, *field))
    })
}

/// Remove duplicates, keeping the first occurrence of each item in order.
pub fn dedup<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn is_comment(line: &str) -> bool {
    line.starts_with('%') || line.starts_with('#') || line.starts_with(">>>")
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

fn set_date_once(slot: &mut Option<DateTime<Utc>>, value: &str) {
    if slot.is_none() {
        *slot = parse_date(value);
    }
}

fn name_server_tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|token| token.trim_end_matches('.').to_lowercase())
        .filter(|token| !token.is_empty() && token.parse::<IpAddr>().is_err())
}

fn status_tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .filter_map(|part| part.split_whitespace().next())
        .map(String::from)
}

#[derive(Default)]
struct ContactBuilder {
    contact: Contact,
    address: Vec<String>,
}

/// Parse a raw WHOIS response for `domain` returned by `server`.
pub fn parse_response(domain: &str, server: &str, raw: &str) -> WhoisResult {
    let mut result = WhoisResult {
        domain: domain.to_string(),
        server: server.to_string(),
        raw: raw.to_string(),
        ..WhoisResult::default()
    };
    let mut name_servers = Vec::new();
    let mut status = Vec::new();
    let mut contacts: BTreeMap<ContactRole, ContactBuilder> = BTreeMap::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        if let Some(field) = FIELD_KEYS.get(key.as_str()) {
            match field {
                Field::Registrar => set_once(&mut result.registrar, value),
                Field::Created => set_date_once(&mut result.created, value),
                Field::Updated => set_date_once(&mut result.updated, value),
                Field::Expires => set_date_once(&mut result.expires, value),
                Field::NameServers => name_servers.extend(name_server_tokens(value)),
                Field::Status => status.extend(status_tokens(value)),
            }
        } else if let Some((role, field)) = contact_key(&key) {
            let entry = contacts.entry(role).or_default();
            match field {
                ContactField::Name => set_once(&mut entry.contact.name, value),
                ContactField::Organization => set_once(&mut entry.contact.organization, value),
                ContactField::Email => set_once(&mut entry.contact.email, value),
                ContactField::Phone => set_once(&mut entry.contact.phone, value),
                ContactField::Address => entry.address.push(value.to_string()),
            }
        }
    }

    result.name_servers = dedup(name_servers);
    result.status = dedup(status);
    result.contacts = contacts
        .into_iter()
        .map(|(role, mut builder)| {
            if !builder.address.is_empty() {
                builder.contact.address = Some(builder.address.join(", "));
            }
            (role, builder.contact)
        })
        .filter(|(_, contact)| !contact.is_empty())
        .collect();

    result
}
