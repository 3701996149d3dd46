//! Scan requests, reports and result aggregation.

use crate::scanner::traits::{ProbeResult, ProbeStatus, Protocol};
use crate::types::Port;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Default wait for a reply to a SYN probe.
pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_secs(3);
/// Default wait for a reply to a UDP probe.
pub const DEFAULT_UDP_TIMEOUT: Duration = Duration::from_secs(5);

/// What to scan. Built once per invocation and never changed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Target as given by the caller; validated by the engine.
    pub target: String,
    pub tcp_ports: Option<BTreeSet<Port>>,
    pub udp_ports: Option<BTreeSet<Port>>,
    pub tcp_timeout: Duration,
    pub udp_timeout: Duration,
}

impl ScanRequest {
    /// A request with no ports and default timeouts.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            tcp_ports: None,
            udp_ports: None,
            tcp_timeout: DEFAULT_TCP_TIMEOUT,
            udp_timeout: DEFAULT_UDP_TIMEOUT,
        }
    }

    pub fn with_tcp_ports(mut self, ports: impl IntoIterator<Item = Port>) -> Self {
        self.tcp_ports = Some(ports.into_iter().collect());
        self
    }

    pub fn with_udp_ports(mut self, ports: impl IntoIterator<Item = Port>) -> Self {
        self.udp_ports = Some(ports.into_iter().collect());
        self
    }

    pub fn with_tcp_timeout(mut self, timeout: Duration) -> Self {
        self.tcp_timeout = timeout;
        self
    }

    pub fn with_udp_timeout(mut self, timeout: Duration) -> Self {
        self.udp_timeout = timeout;
        self
    }

    /// Number of (port, protocol) pairs this request will probe.
    pub fn probe_count(&self) -> usize {
        self.tcp_ports.as_ref().map_or(0, BTreeSet::len)
            + self.udp_ports.as_ref().map_or(0, BTreeSet::len)
    }
}

/// Per-status tallies over a report's results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub open: usize,
    pub closed: usize,
    pub filtered: usize,
    pub open_filtered: usize,
    pub unknown: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn from_results(results: &[ProbeResult]) -> Self {
        let mut counts = Self::default();
        for result in results {
            match result.status {
                ProbeStatus::Open => counts.open += 1,
                ProbeStatus::Closed => counts.closed += 1,
                ProbeStatus::Filtered => counts.filtered += 1,
                ProbeStatus::OpenFiltered => counts.open_filtered += 1,
                ProbeStatus::Unknown => counts.unknown += 1,
                ProbeStatus::Error => counts.error += 1,
                ProbeStatus::InvalidTarget => {}
            }
        }
        counts
    }
}

/// Complete, ordered outcome of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub counts: StatusCounts,
    /// Ascending by port; TCP before UDP on the same port.
    pub results: Vec<ProbeResult>,
}

impl ScanReport {
    /// Finish a report that started at `started_at`.
    pub fn new(target: impl Into<String>, started_at: DateTime<Utc>, results: Vec<ProbeResult>) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            target: target.into(),
            started_at,
            finished_at,
            duration_ms,
            counts: StatusCounts::from_results(&results),
            results,
        }
    }

    /// The degenerate report for a target that failed validation.
    pub fn invalid_target(target: &str) -> Self {
        Self::new(target, Utc::now(), vec![ProbeResult::invalid_target(target)])
    }

    pub fn is_invalid_target(&self) -> bool {
        matches!(self.results.as_slice(), [only] if only.status == ProbeStatus::InvalidTarget)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results for one protocol, in report order.
    pub fn for_protocol(&self, protocol: Protocol) -> impl Iterator<Item = &ProbeResult> {
        self.results
            .iter()
            .filter(move |r| r.protocol == Some(protocol))
    }
}

/// Merge TCP and UDP results into report order.
///
/// Each result is stamped with its protocol, TCP results go first, and a
/// stable sort by port keeps TCP ahead of UDP on equal ports.
pub fn aggregate(tcp: Vec<ProbeResult>, udp: Vec<ProbeResult>) -> Vec<ProbeResult> {
    let mut merged: Vec<ProbeResult> = tcp
        .into_iter()
        .map(|r| r.with_protocol(Protocol::Tcp))
        .chain(udp.into_iter().map(|r| r.with_protocol(Protocol::Udp)))
        .collect();
    merged.sort_by_key(|r| r.port);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(port: u16, status: ProbeStatus) -> ProbeResult {
        // Protocol is deliberately wrong; aggregate must restamp it.
        ProbeResult::new(Port::new(port).unwrap(), Protocol::Udp, status)
    }

    #[test]
    fn test_request_defaults() {
        let request = ScanRequest::new("10.0.0.1");
        assert_eq!(request.tcp_timeout, Duration::from_secs(3));
        assert_eq!(request.udp_timeout, Duration::from_secs(5));
        assert!(request.tcp_ports.is_none());
        assert!(request.udp_ports.is_none());
        assert_eq!(request.probe_count(), 0);
    }

    #[test]
    fn test_request_dedups_ports() {
        let p = |n| Port::new(n).unwrap();
        let request = ScanRequest::new("::1")
            .with_tcp_ports([p(80), p(22), p(80)])
            .with_udp_ports([p(53)]);
        let tcp: Vec<u16> = request.tcp_ports.as_ref().unwrap().iter().map(|p| p.as_u16()).collect();
        assert_eq!(tcp, vec![22, 80]);
        assert_eq!(request.probe_count(), 3);
    }

    #[test]
    fn test_aggregate_tags_and_sorts() {
        let tcp = vec![result(443, ProbeStatus::Open), result(22, ProbeStatus::Closed)];
        let udp = vec![result(53, ProbeStatus::OpenFiltered), result(22, ProbeStatus::Closed)];

        let merged = aggregate(tcp, udp);
        let order: Vec<(u16, Option<Protocol>)> = merged.iter().map(|r| (r.port, r.protocol)).collect();
        assert_eq!(
            order,
            vec![
                (22, Some(Protocol::Tcp)),
                (22, Some(Protocol::Udp)),
                (53, Some(Protocol::Udp)),
                (443, Some(Protocol::Tcp)),
            ]
        );
    }

    #[test]
    fn test_aggregate_never_drops() {
        let tcp: Vec<ProbeResult> = (1..=30).map(|p| result(p, ProbeStatus::Filtered)).collect();
        let udp: Vec<ProbeResult> = (1..=30).rev().map(|p| result(p, ProbeStatus::Error)).collect();
        let merged = aggregate(tcp, udp);
        assert_eq!(merged.len(), 60);
        assert!(merged.windows(2).all(|w| w[0].port <= w[1].port));
    }

    #[test]
    fn test_invalid_target_report() {
        let report = ScanReport::invalid_target("999.1.1.1");
        assert!(report.is_invalid_target());
        assert_eq!(report.len(), 1);
        assert_eq!(report.results[0].port, 0);
        assert_eq!(report.results[0].detail.as_deref(), Some("999.1.1.1"));
        assert_eq!(report.counts, StatusCounts::default());
    }

    #[test]
    fn test_counts() {
        let results = aggregate(
            vec![result(1, ProbeStatus::Open), result(2, ProbeStatus::Closed)],
            vec![result(1, ProbeStatus::OpenFiltered), result(3, ProbeStatus::Error)],
        );
        let report = ScanReport::new("127.0.0.1", Utc::now(), results);
        assert_eq!(report.counts.open, 1);
        assert_eq!(report.counts.closed, 1);
        assert_eq!(report.counts.open_filtered, 1);
        assert_eq!(report.counts.error, 1);
        assert_eq!(report.for_protocol(Protocol::Udp).count(), 2);
    }

    #[test]
    fn test_report_serializes() {
        let report = ScanReport::new("127.0.0.1", Utc::now(), vec![result(80, ProbeStatus::Open)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["target"], "127.0.0.1");
        assert_eq!(json["results"][0]["status"], "open");
        assert!(json["started_at"].is_string());
    }
}
