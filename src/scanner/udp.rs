//! UDP Scanner implementation.
//!
//! Sends one empty UDP datagram per port and classifies the reply (or lack
//! thereof). UDP scanning is inherently ambiguous because an open service
//! may simply stay silent.
//!
//! # Detection Methods
//!
//! 1. **UDP Response**: any datagram back from the port means open
//! 2. **ICMP Port Unreachable** (type 3, code 3): closed
//! 3. **Other ICMP unreachable** (codes 1, 2, 9, 10, 13): filtered
//! 4. **No Response**: open or filtered (ambiguous)

use crate::error::{ScanError, ScanResult};
use crate::scanner::exchange;
use crate::scanner::response::{Response, ICMP_DEST_UNREACHABLE, ICMP_PORT_UNREACHABLE};
use crate::scanner::syn::rand_source_port;
use crate::scanner::traits::{PacketTransport, ProbePacket, ProbeResult, ProbeStatus, Protocol, Scanner};
use crate::types::Port;
use async_trait::async_trait;
use pnet::packet::udp::{self, MutableUdpPacket};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const UDP_HEADER_LEN: usize = 8;

/// ICMP unreachable codes that indicate a filtering device.
const FILTERED_CODES: &[u8] = &[1, 2, 9, 10, 13];

/// UDP Scanner for detecting open UDP ports.
pub struct UdpScanner {
    target: IpAddr,
    source: IpAddr,
    timeout: Duration,
    transport: Arc<dyn PacketTransport>,
}

impl UdpScanner {
    /// Create a new UDP scanner.
    ///
    /// # Errors
    /// Returns an error if no local address routes to `target`.
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
        let bytes = build_udp_datagram(self.source, self.target, source_port, dest_port)?;
        Ok(ProbePacket {
            protocol: Protocol::Udp,
            source: self.source,
            target: self.target,
            source_port,
            target_port: dest_port,
            bytes,
        })
    }
}

#[async_trait]
impl Scanner for UdpScanner {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    async fn scan_port(&self, port: Port) -> ProbeResult {
        let packet = match self.build_probe(port.as_u16()) {
            Ok(packet) => packet,
            Err(e) => return ProbeResult::error(port, Protocol::Udp, e.to_string()),
        };

        let (response, elapsed) = exchange(Arc::clone(&self.transport), packet, self.timeout).await;
        let (status, detail) = classify(&response);
        debug!(port = port.as_u16(), %status, "udp probe finished");

        let result = ProbeResult::new(port, Protocol::Udp, status).with_detail(detail);
        match response {
            Response::NoResponse | Response::RawError { .. } => result,
            _ => result.with_response_time(elapsed.as_millis() as u64),
        }
    }
}

/// Map a reply to a port status for a UDP probe.
pub fn classify(response: &Response) -> (ProbeStatus, Option<String>) {
    match response {
        Response::NoResponse => (ProbeStatus::OpenFiltered, None),
        Response::Udp => (ProbeStatus::Open, None),
        Response::Icmp {
            icmp_type: ICMP_DEST_UNREACHABLE,
            code: ICMP_PORT_UNREACHABLE,
        } => (ProbeStatus::Closed, None),
        Response::Icmp {
            icmp_type: ICMP_DEST_UNREACHABLE,
            code,
        } if FILTERED_CODES.contains(code) => (ProbeStatus::Filtered, None),
        Response::Icmp { icmp_type, code } => (
            ProbeStatus::Unknown,
            Some(format!("icmp type {} code {}", icmp_type, code)),
        ),
        Response::Tcp { flags } => (
            ProbeStatus::Unknown,
            Some(format!("tcp segment (flags {:#04x}) in reply to udp probe", flags)),
        ),
        Response::Unrecognized { detail } => (ProbeStatus::Unknown, Some(detail.clone())),
        Response::RawError { detail } => (ProbeStatus::Error, Some(detail.clone())),
    }
}

/// Build an empty, checksummed UDP datagram.
pub fn build_udp_datagram(
    source: IpAddr,
    target: IpAddr,
    source_port: u16,
    dest_port: u16,
) -> ScanResult<Vec<u8>> {
    let mut buffer = vec![0u8; UDP_HEADER_LEN];
    let mut udp_packet = MutableUdpPacket::new(&mut buffer)
        .ok_or_else(|| ScanError::InvalidPacket("Failed to create UDP packet".to_string()))?;

    udp_packet.set_source(source_port);
    udp_packet.set_destination(dest_port);
    udp_packet.set_length(UDP_HEADER_LEN as u16);

    let checksum = match (source, target) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => udp::ipv4_checksum(&udp_packet.to_immutable(), &src, &dst),
        (IpAddr::V6(src), IpAddr::V6(dst)) => udp::ipv6_checksum(&udp_packet.to_immutable(), &src, &dst),
        _ => {
            return Err(ScanError::InvalidPacket(format!(
                "source {} and target {} are different address families",
                source, target
            )))
        }
    };
    udp_packet.set_checksum(checksum);

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::udp::UdpPacket;
    use pnet::packet::Packet;
    use std::net::Ipv4Addr;

    #[test]
    fn test_classify_no_response_open_filtered() {
        assert_eq!(classify(&Response::NoResponse), (ProbeStatus::OpenFiltered, None));
    }

    #[test]
    fn test_classify_udp_reply_open() {
        assert_eq!(classify(&Response::Udp).0, ProbeStatus::Open);
    }

    #[test]
    fn test_classify_port_unreachable_closed() {
        let response = Response::Icmp {
            icmp_type: 3,
            code: 3,
        };
        assert_eq!(classify(&response).0, ProbeStatus::Closed);
    }

    #[test]
    fn test_classify_filtering_codes() {
        for code in [1, 2, 9, 10, 13] {
            let response = Response::Icmp { icmp_type: 3, code };
            assert_eq!(classify(&response).0, ProbeStatus::Filtered, "code {}", code);
        }
    }

    #[test]
    fn test_classify_other_icmp_unknown() {
        for (icmp_type, code) in [(3, 0), (3, 4), (11, 0)] {
            let (status, detail) = classify(&Response::Icmp { icmp_type, code });
            assert_eq!(status, ProbeStatus::Unknown);
            assert!(detail.is_some());
        }
    }

    #[test]
    fn test_classify_error() {
        let (status, detail) = classify(&Response::RawError {
            detail: "Network is unreachable".to_string(),
        });
        assert_eq!(status, ProbeStatus::Error);
        assert_eq!(detail.as_deref(), Some("Network is unreachable"));
    }

    #[test]
    fn test_build_empty_datagram() {
        let src = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        let dst = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let bytes = build_udp_datagram(src, dst, 50000, 53).unwrap();
        assert_eq!(bytes.len(), UDP_HEADER_LEN);

        let packet = UdpPacket::new(&bytes).unwrap();
        assert_eq!(packet.get_source(), 50000);
        assert_eq!(packet.get_destination(), 53);
        assert_eq!(packet.get_length(), 8);
        assert!(packet.payload().is_empty());
    }
}
