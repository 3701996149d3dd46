//! Scanner trait abstraction.
//!
//! Defines the probe result vocabulary, the common interface for the TCP and
//! UDP probers, and the injected packet transport they send through.

use crate::error::ScanResult;
use crate::scanner::response::Response;
use crate::types::Port;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Port is open (SYN+ACK, or a UDP reply).
    Open,
    /// Port is closed (RST+ACK, or ICMP port unreachable for UDP).
    Closed,
    /// Port is filtered (no TCP reply, or an ICMP filtering error).
    Filtered,
    /// No UDP reply: open and silent, or silently dropped.
    #[serde(rename = "open|filtered")]
    OpenFiltered,
    /// A reply arrived that the classifier has no rule for.
    Unknown,
    /// The probe itself failed (OS or network error).
    Error,
    /// The target was not a valid IP literal; no probe was sent.
    #[serde(rename = "invalid_target")]
    InvalidTarget,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
            Self::OpenFiltered => write!(f, "open|filtered"),
            Self::Unknown => write!(f, "unknown"),
            Self::Error => write!(f, "error"),
            Self::InvalidTarget => write!(f, "invalid_target"),
        }
    }
}

/// Transport protocol a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Result of probing a single port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Probed port, or 0 for the synthetic invalid-target result.
    pub port: u16,
    /// Protocol tag; absent only on the synthetic invalid-target result.
    pub protocol: Option<Protocol>,
    /// Classified status.
    pub status: ProbeStatus,
    /// Diagnostic detail for `Error`, `Unknown` and `InvalidTarget`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Round trip time when a reply was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl ProbeResult {
    /// Create a new probe result.
    pub fn new(port: Port, protocol: Protocol, status: ProbeStatus) -> Self {
        Self {
            port: port.as_u16(),
            protocol: Some(protocol),
            status,
            detail: None,
            response_time_ms: None,
        }
    }

    /// An `Error` result carrying the failure text.
    pub fn error(port: Port, protocol: Protocol, detail: impl Into<String>) -> Self {
        Self::new(port, protocol, ProbeStatus::Error).with_detail(Some(detail.into()))
    }

    /// The synthetic result standing in for a whole scan of a bad target.
    pub fn invalid_target(target: impl Into<String>) -> Self {
        Self {
            port: 0,
            protocol: None,
            status: ProbeStatus::InvalidTarget,
            detail: Some(target.into()),
            response_time_ms: None,
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_response_time(mut self, time_ms: u64) -> Self {
        self.response_time_ms = Some(time_ms);
        self
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, ProbeStatus::Open | ProbeStatus::OpenFiltered)
    }
}

/// A fully built probe ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePacket {
    pub protocol: Protocol,
    pub source: IpAddr,
    pub target: IpAddr,
    pub source_port: u16,
    pub target_port: u16,
    /// Transport-layer bytes (TCP segment or UDP datagram), checksummed.
    pub bytes: Vec<u8>,
}

/// Capability to put a probe on the wire and wait for its reply.
///
/// Implementations block for at most `timeout`. Failures are reported as
/// `Response::RawError` rather than panicking, so a prober can classify
/// every outcome.
pub trait PacketTransport: Send + Sync {
    /// Local address used to reach `target`.
    fn source_for(&self, target: IpAddr) -> ScanResult<IpAddr>;

    /// Send `packet` and wait up to `timeout` for the first matching reply.
    fn send_and_wait(&self, packet: &ProbePacket, timeout: Duration) -> Response;
}

/// Trait for port prober implementations.
///
/// This trait abstracts the probing technique so the worker pool can drive
/// TCP and UDP probers the same way.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Protocol this scanner probes.
    fn protocol(&self) -> Protocol;

    /// Probe a single port. Never fails; errors become `Error` results.
    async fn scan_port(&self, port: Port) -> ProbeResult;
}
