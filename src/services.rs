//! Service names for well-known ports.
//!
//! A [`ServiceTable`] is built once (from the built-in list or a JSON file)
//! and passed by reference to the renderers. The scan engine never reads it.
//!
//! The JSON file maps port numbers to one entry or a list of entries:
//!
//! ```json
//! {
//!   "53": [{"service_name": "domain", "protocol": "TCP/UDP"}],
//!   "443": {"service_name": "https", "description": "HTTP over TLS", "protocol": "TCP"}
//! }
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::scanner::Protocol;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Well-known ports: (port, name, protocol). An empty protocol matches both.
const WELL_KNOWN: &[(u16, &str, &str)] = &[
    (20, "ftp-data", "TCP"),
    (21, "ftp", "TCP"),
    (22, "ssh", "TCP"),
    (23, "telnet", "TCP"),
    (25, "smtp", "TCP"),
    (53, "dns", "TCP/UDP"),
    (67, "dhcp-server", "UDP"),
    (68, "dhcp-client", "UDP"),
    (69, "tftp", "UDP"),
    (80, "http", "TCP"),
    (88, "kerberos", "TCP/UDP"),
    (110, "pop3", "TCP"),
    (111, "rpcbind", "TCP/UDP"),
    (119, "nntp", "TCP"),
    (123, "ntp", "UDP"),
    (135, "msrpc", "TCP"),
    (137, "netbios-ns", "UDP"),
    (138, "netbios-dgm", "UDP"),
    (139, "netbios-ssn", "TCP"),
    (143, "imap", "TCP"),
    (161, "snmp", "UDP"),
    (162, "snmptrap", "UDP"),
    (179, "bgp", "TCP"),
    (389, "ldap", "TCP/UDP"),
    (443, "https", "TCP"),
    (443, "quic", "UDP"),
    (445, "microsoft-ds", "TCP"),
    (464, "kpasswd", "TCP/UDP"),
    (465, "smtps", "TCP"),
    (500, "isakmp", "UDP"),
    (514, "syslog", "UDP"),
    (520, "rip", "UDP"),
    (521, "ripng", "UDP"),
    (548, "afp", "TCP"),
    (554, "rtsp", "TCP"),
    (587, "submission", "TCP"),
    (631, "ipp", "TCP"),
    (636, "ldaps", "TCP"),
    (873, "rsync", "TCP"),
    (993, "imaps", "TCP"),
    (995, "pop3s", "TCP"),
    (1080, "socks", "TCP"),
    (1194, "openvpn", "UDP"),
    (1433, "mssql", "TCP"),
    (1434, "mssql-m", "UDP"),
    (1521, "oracle", "TCP"),
    (1701, "l2tp", "UDP"),
    (1723, "pptp", "TCP"),
    (1812, "radius", "UDP"),
    (1813, "radius-acct", "UDP"),
    (1883, "mqtt", "TCP"),
    (1900, "ssdp", "UDP"),
    (2049, "nfs", "TCP/UDP"),
    (2181, "zookeeper", "TCP"),
    (2375, "docker", "TCP"),
    (2376, "docker-ssl", "TCP"),
    (3128, "squid", "TCP"),
    (3306, "mysql", "TCP"),
    (3389, "rdp", "TCP"),
    (3478, "stun", "UDP"),
    (4500, "ipsec-nat-t", "UDP"),
    (5060, "sip", "TCP/UDP"),
    (5353, "mdns", "UDP"),
    (5432, "postgresql", "TCP"),
    (5672, "amqp", "TCP"),
    (5900, "vnc", "TCP"),
    (6379, "redis", "TCP"),
    (6443, "kubernetes-api", "TCP"),
    (6667, "irc", "TCP"),
    (8000, "http-alt", "TCP"),
    (8080, "http-proxy", "TCP"),
    (8443, "https-alt", "TCP"),
    (9090, "prometheus", "TCP"),
    (9092, "kafka", "TCP"),
    (9200, "elasticsearch", "TCP"),
    (11211, "memcached", "TCP/UDP"),
    (27017, "mongodb", "TCP"),
    (51820, "wireguard", "UDP"),
];

/// One service definition for a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    #[serde(alias = "name")]
    pub service_name: String,
    #[serde(default)]
    pub description: String,
    /// `"TCP"`, `"UDP"`, `"TCP/UDP"`, or empty for either.
    #[serde(default)]
    pub protocol: String,
}

impl ServiceEntry {
    /// Whether this entry applies to results of `protocol`.
    pub fn matches(&self, protocol: Protocol) -> bool {
        let declared = self.protocol.trim().to_ascii_uppercase();
        let wanted = match protocol {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        };
        declared.is_empty() || declared.contains(wanted)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryOrList {
    One(ServiceEntry),
    Many(Vec<ServiceEntry>),
}

/// Immutable port to service lookup.
#[derive(Debug, Clone, Default)]
pub struct ServiceTable {
    entries: HashMap<u16, Vec<ServiceEntry>>,
}

impl ServiceTable {
    /// The built-in table of well-known ports.
    pub fn builtin() -> Self {
        let mut entries: HashMap<u16, Vec<ServiceEntry>> = HashMap::new();
        for &(port, name, protocol) in WELL_KNOWN {
            entries.entry(port).or_default().push(ServiceEntry {
                service_name: name.to_string(),
                description: String::new(),
                protocol: protocol.to_string(),
            });
        }
        Self { entries }
    }

    /// Parse a table from JSON text.
    ///
    /// # Errors
    /// Fails on malformed JSON or a key that is not a port number.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let raw: HashMap<String, EntryOrList> = serde_json::from_str(json)?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let port: u16 = key.trim().parse().map_err(|_| {
                ConfigError::InvalidFormat(format!("service table key {:?} is not a port number", key))
            })?;
            let list = match value {
                EntryOrList::One(entry) => vec![entry],
                EntryOrList::Many(list) => list,
            };
            entries.insert(port, list);
        }
        Ok(Self { entries })
    }

    /// Load a table from a JSON file.
    pub fn from_json_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&content)
    }

    /// First entry for `port` that applies to `protocol`.
    pub fn lookup(&self, port: u16, protocol: Protocol) -> Option<&ServiceEntry> {
        self.entries
            .get(&port)?
            .iter()
            .find(|entry| entry.matches(protocol))
    }

    /// Service name for display, or an empty string when unknown.
    pub fn name(&self, port: u16, protocol: Option<Protocol>) -> &str {
        protocol
            .and_then(|protocol| self.lookup(port, protocol))
            .map_or("", |entry| entry.service_name.as_str())
    }

    /// Number of ports with at least one entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_common_ports() {
        let table = ServiceTable::builtin();
        assert_eq!(table.name(22, Some(Protocol::Tcp)), "ssh");
        assert_eq!(table.name(80, Some(Protocol::Tcp)), "http");
        assert_eq!(table.name(3306, Some(Protocol::Tcp)), "mysql");
        assert_eq!(table.name(53, Some(Protocol::Udp)), "dns");
    }

    #[test]
    fn test_lookup_respects_protocol() {
        let table = ServiceTable::builtin();
        assert_eq!(table.name(443, Some(Protocol::Tcp)), "https");
        assert_eq!(table.name(443, Some(Protocol::Udp)), "quic");
        assert!(table.lookup(123, Protocol::Tcp).is_none());
    }

    #[test]
    fn test_unknown_port() {
        let table = ServiceTable::builtin();
        assert!(table.lookup(12345, Protocol::Tcp).is_none());
        assert_eq!(table.name(12345, Some(Protocol::Tcp)), "");
        assert_eq!(table.name(22, None), "");
    }

    #[test]
    fn test_json_entry_or_list() {
        let json = r#"{
            "53": [
                {"service_name": "domain-tcp", "protocol": "TCP"},
                {"service_name": "domain", "description": "DNS", "protocol": "UDP"}
            ],
            "7": {"name": "echo"}
        }"#;
        let table = ServiceTable::from_json_str(json).unwrap();
        assert_eq!(table.len(), 2);

        let udp = table.lookup(53, Protocol::Udp).unwrap();
        assert_eq!(udp.service_name, "domain");
        assert_eq!(udp.description, "DNS");
        assert_eq!(table.name(53, Some(Protocol::Tcp)), "domain-tcp");
        // No protocol given: applies to both.
        assert_eq!(table.name(7, Some(Protocol::Udp)), "echo");
    }

    #[test]
    fn test_first_match_wins() {
        let json = r#"{"80": [
            {"service_name": "first", "protocol": "tcp/udp"},
            {"service_name": "second", "protocol": "TCP"}
        ]}"#;
        let table = ServiceTable::from_json_str(json).unwrap();
        assert_eq!(table.name(80, Some(Protocol::Tcp)), "first");
    }

    #[test]
    fn test_bad_key_rejected() {
        let err = ServiceTable::from_json_str(r#"{"http": {"name": "x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"8080": {{"service_name": "proxy", "protocol": "TCP"}}}}"#).unwrap();
        let table = ServiceTable::from_json_file(file.path()).unwrap();
        assert_eq!(table.name(8080, Some(Protocol::Tcp)), "proxy");

        let missing = ServiceTable::from_json_file(Path::new("/nonexistent/services.json"));
        assert!(matches!(missing, Err(ConfigError::ReadFailed { .. })));
    }
}
