//! WHOIS server selection.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::LazyLock;

/// Server for IP address queries.
pub const IP_WHOIS_SERVER: &str = "whois.arin.net:43";

/// Fallback for TLDs without a known registry server.
pub const DEFAULT_WHOIS_SERVER: &str = "whois.iana.org:43";

/// Registry WHOIS servers for second-level public suffixes.
static SUFFIX_SERVERS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("co.uk", "whois.nic.uk:43"),
        ("org.uk", "whois.nic.uk:43"),
        ("me.uk", "whois.nic.uk:43"),
        ("ac.uk", "whois.nic.uk:43"),
        ("com.au", "whois.auda.org.au:43"),
        ("net.au", "whois.auda.org.au:43"),
        ("org.au", "whois.auda.org.au:43"),
        ("co.nz", "whois.irs.net.nz:43"),
        ("co.jp", "whois.jprs.jp:43"),
        ("com.cn", "whois.cnnic.cn:43"),
        ("com.br", "whois.registro.br:43"),
        ("co.za", "whois.registry.net.za:43"),
        ("co.in", "whois.registry.in:43"),
    ])
});

/// Registry WHOIS servers by TLD.
static TLD_SERVERS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("com", "whois.verisign-grs.com:43"),
        ("net", "whois.verisign-grs.com:43"),
        ("org", "whois.pir.org:43"),
        ("info", "whois.nic.info:43"),
        ("biz", "whois.nic.biz:43"),
        ("io", "whois.nic.io:43"),
        ("co", "whois.nic.co:43"),
        ("me", "whois.nic.me:43"),
        ("tv", "whois.nic.tv:43"),
        ("cc", "ccwhois.verisign-grs.com:43"),
        ("ai", "whois.nic.ai:43"),
        ("xyz", "whois.nic.xyz:43"),
        ("dev", "whois.nic.google:43"),
        ("app", "whois.nic.google:43"),
        ("page", "whois.nic.google:43"),
        ("cloud", "whois.nic.cloud:43"),
        ("tech", "whois.nic.tech:43"),
        ("online", "whois.nic.online:43"),
        ("site", "whois.nic.site:43"),
        ("us", "whois.nic.us:43"),
        ("uk", "whois.nic.uk:43"),
        ("de", "whois.denic.de:43"),
        ("fr", "whois.nic.fr:43"),
        ("nl", "whois.domain-registry.nl:43"),
        ("eu", "whois.eu:43"),
        ("ca", "whois.cira.ca:43"),
        ("au", "whois.auda.org.au:43"),
        ("nz", "whois.irs.net.nz:43"),
        ("jp", "whois.jprs.jp:43"),
        ("cn", "whois.cnnic.cn:43"),
        ("ru", "whois.tcinet.ru:43"),
        ("br", "whois.registro.br:43"),
        ("in", "whois.registry.in:43"),
        ("it", "whois.nic.it:43"),
        ("se", "whois.iis.se:43"),
        ("ch", "whois.nic.ch:43"),
        ("kr", "whois.kr:43"),
    ])
});

/// Pick the WHOIS server (`host:port`) responsible for `query`.
///
/// IP literals go to ARIN. Domains are matched on their last two labels first, then on the
/// TLD; anything unknown falls back to IANA.
pub fn get_whois_server(query: &str) -> &'static str {
    if query.parse::<IpAddr>().is_ok() {
        return IP_WHOIS_SERVER;
    }

    let domain = query.trim().trim_end_matches('.').to_lowercase();
    let mut labels = domain.rsplit('.');
    let Some(tld) = labels.next() else {
        return DEFAULT_WHOIS_SERVER;
    };

    if let Some(second) = labels.next()
        && let Some(server) = SUFFIX_SERVERS.get(format!("{second}.{tld}").as_str())
    {
        return server;
    }

    TLD_SERVERS.get(tld).copied().unwrap_or(DEFAULT_WHOIS_SERVER)
}
