//! SYN (Stealth) Scanner implementation.
//!
//! Performs half-open TCP scanning by sending SYN packets and analyzing
//! responses without completing the TCP handshake. No ACK is ever sent, so
//! the target never sees an established connection.
//!
//! # How It Works
//!
//! 1. Send a TCP segment with only the SYN flag set to the target port
//! 2. Classify the first matching reply (first rule wins):
//!    - SYN/ACK: open
//!    - RST/ACK: closed
//!    - Any other TCP flags: filtered
//!    - Any ICMP error quoting the probe: filtered
//!    - No reply before the timeout: filtered
//!    - A reply of no recognized kind: unknown
//!    - Send/receive failure: error

use crate::error::{ScanError, ScanResult};
use crate::scanner::exchange;
use crate::scanner::response::{Response, TCP_CONTROL_BITS};
use crate::scanner::traits::{PacketTransport, ProbePacket, ProbeResult, ProbeStatus, Protocol, Scanner};
use crate::types::Port;
use async_trait::async_trait;
use pnet::packet::tcp::{self, MutableTcpPacket, TcpFlags};
use rand::Rng;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const TCP_HEADER_LEN: usize = 20;

/// SYN Scanner for stealth port scanning.
///
/// **Requires raw socket privileges when used with the raw transport.**
pub struct SynScanner {
    target: IpAddr,
    source: IpAddr,
    timeout: Duration,
    transport: Arc<dyn PacketTransport>,
}

impl SynScanner {
    /// Create a new SYN scanner.
    ///
    /// # Errors
    /// Returns an error if the transport cannot find a local address that
    /// routes to `target`.
    pub fn new(
        target: IpAddr,
        timeout: Duration,
        transport: Arc<dyn PacketTransport>,
    ) -> ScanResult<Self> {
        let source = transport.source_for(target)?;
        Ok(Self {
            target,
            source,
            timeout,
            transport,
        })
    }

    fn build_probe(&self, dest_port: u16) -> ScanResult<ProbePacket> {
        let source_port = rand_source_port();
        let bytes = build_syn_segment(
            self.source,
            self.target,
            source_port,
            dest_port,
            rand::random(),
        )?;
        Ok(ProbePacket {
            protocol: Protocol::Tcp,
            source: self.source,
            target: self.target,
            source_port,
            target_port: dest_port,
            bytes,
        })
    }
}

#[async_trait]
impl Scanner for SynScanner {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn scan_port(&self, port: Port) -> ProbeResult {
        let packet = match self.build_probe(port.as_u16()) {
            Ok(packet) => packet,
            Err(e) => return ProbeResult::error(port, Protocol::Tcp, e.to_string()),
        };

        let (response, elapsed) = exchange(Arc::clone(&self.transport), packet, self.timeout).await;
        let (status, detail) = classify(&response);
        debug!(port = port.as_u16(), %status, "tcp probe finished");

        let result = ProbeResult::new(port, Protocol::Tcp, status).with_detail(detail);
        match response {
            Response::NoResponse | Response::RawError { .. } => result,
            _ => result.with_response_time(elapsed.as_millis() as u64),
        }
    }
}

/// Map a reply to a port status for a SYN probe.
pub fn classify(response: &Response) -> (ProbeStatus, Option<String>) {
    match response {
        Response::NoResponse => (ProbeStatus::Filtered, None),
        Response::Tcp { flags } => {
            let status = match flags & TCP_CONTROL_BITS {
                f if f == TcpFlags::SYN | TcpFlags::ACK => ProbeStatus::Open,
                f if f == TcpFlags::RST | TcpFlags::ACK => ProbeStatus::Closed,
                _ => ProbeStatus::Filtered,
            };
            (status, None)
        }
        // Every ICMP error is treated as filtering, unreachable or not.
        Response::Icmp { .. } => (ProbeStatus::Filtered, None),
        Response::Udp => (
            ProbeStatus::Unknown,
            Some("udp datagram in reply to tcp probe".to_string()),
        ),
        Response::Unrecognized { detail } => (ProbeStatus::Unknown, Some(detail.clone())),
        Response::RawError { detail } => (ProbeStatus::Error, Some(detail.clone())),
    }
}

/// Build a checksummed TCP segment carrying only the SYN flag.
pub fn build_syn_segment(
    source: IpAddr,
    target: IpAddr,
    source_port: u16,
    dest_port: u16,
    sequence: u32,
) -> ScanResult<Vec<u8>> {
    let mut buffer = vec![0u8; TCP_HEADER_LEN];
    let mut tcp_packet = MutableTcpPacket::new(&mut buffer)
        .ok_or_else(|| ScanError::InvalidPacket("Failed to create TCP packet".to_string()))?;

    tcp_packet.set_source(source_port);
    tcp_packet.set_destination(dest_port);
    tcp_packet.set_sequence(sequence);
    tcp_packet.set_acknowledgement(0);
    tcp_packet.set_data_offset(5);
    tcp_packet.set_reserved(0);
    tcp_packet.set_flags(TcpFlags::SYN);
    tcp_packet.set_window(64240);
    tcp_packet.set_urgent_ptr(0);

    let checksum = match (source, target) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => tcp::ipv4_checksum(&tcp_packet.to_immutable(), &src, &dst),
        (IpAddr::V6(src), IpAddr::V6(dst)) => tcp::ipv6_checksum(&tcp_packet.to_immutable(), &src, &dst),
        _ => {
            return Err(ScanError::InvalidPacket(format!(
                "source {} and target {} are different address families",
                source, target
            )))
        }
    };
    tcp_packet.set_checksum(checksum);

    Ok(buffer)
}

/// Generate a random source port in the ephemeral range.
pub(crate) fn rand_source_port() -> u16 {
    rand::thread_rng().gen_range(49152..=65535)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::tcp::TcpPacket;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const SRC: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
    const DST: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

    #[test]
    fn test_classify_syn_ack_open() {
        let response = Response::Tcp {
            flags: TcpFlags::SYN | TcpFlags::ACK,
        };
        assert_eq!(classify(&response), (ProbeStatus::Open, None));
    }

    #[test]
    fn test_classify_rst_ack_closed() {
        let response = Response::Tcp {
            flags: TcpFlags::RST | TcpFlags::ACK,
        };
        assert_eq!(classify(&response).0, ProbeStatus::Closed);
    }

    #[test]
    fn test_classify_no_response_filtered() {
        assert_eq!(classify(&Response::NoResponse).0, ProbeStatus::Filtered);
    }

    #[test]
    fn test_classify_other_flags_filtered() {
        for flags in [TcpFlags::RST, TcpFlags::SYN, TcpFlags::ACK, TcpFlags::FIN | TcpFlags::ACK] {
            assert_eq!(classify(&Response::Tcp { flags }).0, ProbeStatus::Filtered);
        }
    }

    #[test]
    fn test_classify_ignores_ecn_bits() {
        let flags = TcpFlags::SYN | TcpFlags::ACK | TcpFlags::ECE;
        assert_eq!(classify(&Response::Tcp { flags }).0, ProbeStatus::Open);
    }

    #[test]
    fn test_classify_icmp_filtered() {
        for (icmp_type, code) in [(3, 1), (3, 3), (3, 13), (11, 0), (5, 1), (1, 2), (1, 7)] {
            let response = Response::Icmp { icmp_type, code };
            assert_eq!(classify(&response).0, ProbeStatus::Filtered);
        }
    }

    #[test]
    fn test_classify_unknown_and_error() {
        let (status, detail) = classify(&Response::Unrecognized {
            detail: "truncated reply".to_string(),
        });
        assert_eq!(status, ProbeStatus::Unknown);
        assert_eq!(detail.as_deref(), Some("truncated reply"));

        let (status, detail) = classify(&Response::RawError {
            detail: "Operation not permitted".to_string(),
        });
        assert_eq!(status, ProbeStatus::Error);
        assert!(detail.is_some());
    }

    #[test]
    fn test_build_syn_segment() {
        let bytes = build_syn_segment(SRC, DST, 50123, 80, 0xdead_beef).unwrap();
        let packet = TcpPacket::new(&bytes).unwrap();
        assert_eq!(packet.get_source(), 50123);
        assert_eq!(packet.get_destination(), 80);
        assert_eq!(packet.get_flags(), TcpFlags::SYN);
        assert_eq!(packet.get_sequence(), 0xdead_beef);
        assert_eq!(packet.get_acknowledgement(), 0);

        let (IpAddr::V4(src), IpAddr::V4(dst)) = (SRC, DST) else {
            unreachable!()
        };
        assert_eq!(packet.get_checksum(), tcp::ipv4_checksum(&packet, &src, &dst));
        assert_ne!(packet.get_checksum(), 0);
    }

    #[test]
    fn test_build_syn_segment_ipv6() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let bytes = build_syn_segment(v6, v6, 50000, 22, 1).unwrap();
        assert_eq!(TcpPacket::new(&bytes).unwrap().get_flags(), TcpFlags::SYN);
    }

    #[test]
    fn test_build_rejects_mixed_families() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert!(matches!(
            build_syn_segment(SRC, v6, 50000, 22, 1),
            Err(ScanError::InvalidPacket(_))
        ));
    }

    #[test]
    fn test_source_port_is_ephemeral() {
        for _ in 0..100 {
            assert!(rand_source_port() >= 49152);
        }
    }
}
