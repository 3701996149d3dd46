//! Reply model shared by the probers and transports.
//!
//! A transport decodes whatever it captured into an [`Inbound`] packet,
//! matches it against the outstanding probe, and hands the prober a
//! [`Response`]. Classifiers match exhaustively on `Response`; nothing
//! downstream inspects raw bytes.

use crate::scanner::traits::{ProbePacket, Protocol};
use pnet::packet::ip::IpNextHeaderProtocols;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// ICMP destination unreachable (IPv4 numbering).
pub const ICMP_DEST_UNREACHABLE: u8 = 3;
/// ICMP port unreachable code.
pub const ICMP_PORT_UNREACHABLE: u8 = 3;

/// FIN, SYN, RST, PSH, ACK and URG. ECN bits are not part of the comparison.
pub const TCP_CONTROL_BITS: u8 = 0x3f;

/// What came back for a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Nothing matched before the timeout.
    NoResponse,
    /// A TCP segment from the probed port.
    Tcp { flags: u8 },
    /// A UDP datagram from the probed port.
    Udp,
    /// An ICMP error quoting the probe, in IPv4 numbering.
    Icmp { icmp_type: u8, code: u8 },
    /// A reply to the probe that no classifier rule understands.
    Unrecognized { detail: String },
    /// Sending or receiving failed.
    RawError { detail: String },
}

/// Transport header quoted inside an ICMP error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotedHeader {
    pub protocol: u8,
    pub destination: IpAddr,
    pub source_port: u16,
    pub destination_port: u16,
}

/// A captured packet reduced to the fields needed for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Tcp {
        from: IpAddr,
        source_port: u16,
        destination_port: u16,
        flags: u8,
    },
    Udp {
        from: IpAddr,
        source_port: u16,
        destination_port: u16,
    },
    Icmp {
        icmp_type: u8,
        code: u8,
        quoted: Option<QuotedHeader>,
    },
    Icmpv6 {
        icmp_type: u8,
        code: u8,
        quoted: Option<QuotedHeader>,
    },
}

impl Inbound {
    /// Match this packet against `probe`, returning the response it
    /// represents or `None` when it belongs to some other conversation.
    pub fn answer(&self, probe: &ProbePacket) -> Option<Response> {
        match *self {
            Self::Tcp {
                from,
                source_port,
                destination_port,
                flags,
            } if probe.protocol == Protocol::Tcp
                && from == probe.target
                && source_port == probe.target_port
                && destination_port == probe.source_port =>
            {
                Some(Response::Tcp { flags })
            }
            Self::Udp {
                from,
                source_port,
                destination_port,
            } if probe.protocol == Protocol::Udp
                && from == probe.target
                && source_port == probe.target_port
                && destination_port == probe.source_port =>
            {
                Some(Response::Udp)
            }
            Self::Icmp {
                icmp_type,
                code,
                quoted: Some(quoted),
            } if quotes_probe(&quoted, probe) => Some(Response::Icmp { icmp_type, code }),
            Self::Icmpv6 {
                icmp_type,
                code,
                quoted: Some(quoted),
            } if quotes_probe(&quoted, probe) => {
                let (icmp_type, code) = normalize_icmpv6(icmp_type, code);
                Some(Response::Icmp { icmp_type, code })
            }
            _ => None,
        }
    }
}

fn quotes_probe(quoted: &QuotedHeader, probe: &ProbePacket) -> bool {
    quoted.protocol == ip_protocol_number(probe.protocol)
        && quoted.destination == probe.target
        && quoted.source_port == probe.source_port
        && quoted.destination_port == probe.target_port
}

/// IANA protocol number for a probe protocol.
pub fn ip_protocol_number(protocol: Protocol) -> u8 {
    match protocol {
        Protocol::Tcp => IpNextHeaderProtocols::Tcp.0,
        Protocol::Udp => IpNextHeaderProtocols::Udp.0,
    }
}

/// Map an ICMPv6 error onto the equivalent ICMPv4 type and code.
///
/// Messages with no IPv4 counterpart keep their ICMPv6 type and code. None
/// of those types is 3, so they never read as an IPv4 unreachable.
pub fn normalize_icmpv6(icmp_type: u8, code: u8) -> (u8, u8) {
    match (icmp_type, code) {
        // Destination unreachable
        (1, 0) | (1, 3) => (ICMP_DEST_UNREACHABLE, 1),
        (1, 1) | (1, 5) | (1, 6) => (ICMP_DEST_UNREACHABLE, 13),
        (1, 4) => (ICMP_DEST_UNREACHABLE, ICMP_PORT_UNREACHABLE),
        // Packet too big ~ fragmentation needed
        (2, _) => (ICMP_DEST_UNREACHABLE, 4),
        // Time exceeded
        (3, code) => (11, code),
        // Parameter problem
        (4, _) => (12, 0),
        other => other,
    }
}

/// Decode the header quoted after the 8-byte ICMPv4 error header.
pub fn quoted_header_v4(icmp: &[u8]) -> Option<QuotedHeader> {
    let quoted = icmp.get(8..)?;
    if quoted.len() < 20 || quoted[0] >> 4 != 4 {
        return None;
    }
    let header_len = usize::from(quoted[0] & 0x0f) * 4;
    let ports = quoted.get(header_len..header_len + 4)?;
    Some(QuotedHeader {
        protocol: quoted[9],
        destination: IpAddr::V4(Ipv4Addr::new(
            quoted[16], quoted[17], quoted[18], quoted[19],
        )),
        source_port: u16::from_be_bytes([ports[0], ports[1]]),
        destination_port: u16::from_be_bytes([ports[2], ports[3]]),
    })
}

/// Decode the header quoted after the 8-byte ICMPv6 error header.
///
/// Extension headers are not walked; a probe never carries any.
pub fn quoted_header_v6(icmp: &[u8]) -> Option<QuotedHeader> {
    let quoted = icmp.get(8..)?;
    if quoted.len() < 44 || quoted[0] >> 4 != 6 {
        return None;
    }
    let mut destination = [0u8; 16];
    destination.copy_from_slice(&quoted[24..40]);
    Some(QuotedHeader {
        protocol: quoted[6],
        destination: IpAddr::V6(Ipv6Addr::from(destination)),
        source_port: u16::from_be_bytes([quoted[40], quoted[41]]),
        destination_port: u16::from_be_bytes([quoted[42], quoted[43]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::traits::ProbeStatus;
    use pnet::packet::tcp::TcpFlags;

    const TARGET: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));

    fn probe(protocol: Protocol) -> ProbePacket {
        ProbePacket {
            protocol,
            source: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
            target: TARGET,
            source_port: 50000,
            target_port: 443,
            bytes: Vec::new(),
        }
    }

    fn icmp_v4_error(protocol: u8, destination: [u8; 4], sport: u16, dport: u16) -> Vec<u8> {
        let mut bytes = vec![3, 3, 0, 0, 0, 0, 0, 0];
        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        ip[9] = protocol;
        ip[16..20].copy_from_slice(&destination);
        bytes.extend_from_slice(&ip);
        bytes.extend_from_slice(&sport.to_be_bytes());
        bytes.extend_from_slice(&dport.to_be_bytes());
        bytes.extend_from_slice(&[0, 8, 0, 0]);
        bytes
    }

    #[test]
    fn test_tcp_reply_matches_ports() {
        let reply = Inbound::Tcp {
            from: TARGET,
            source_port: 443,
            destination_port: 50000,
            flags: TcpFlags::SYN | TcpFlags::ACK,
        };
        assert_eq!(
            reply.answer(&probe(Protocol::Tcp)),
            Some(Response::Tcp {
                flags: TcpFlags::SYN | TcpFlags::ACK
            })
        );
        assert_eq!(reply.answer(&probe(Protocol::Udp)), None);
    }

    #[test]
    fn test_unrelated_tcp_is_ignored() {
        let reply = Inbound::Tcp {
            from: TARGET,
            source_port: 443,
            destination_port: 40000,
            flags: TcpFlags::RST | TcpFlags::ACK,
        };
        assert_eq!(reply.answer(&probe(Protocol::Tcp)), None);
    }

    #[test]
    fn test_quoted_header_v4() {
        let bytes = icmp_v4_error(17, [192, 0, 2, 10], 50000, 443);
        let quoted = quoted_header_v4(&bytes).unwrap();
        assert_eq!(quoted.protocol, 17);
        assert_eq!(quoted.destination, TARGET);
        assert_eq!(quoted.source_port, 50000);
        assert_eq!(quoted.destination_port, 443);

        assert!(quoted_header_v4(&bytes[..20]).is_none());
    }

    #[test]
    fn test_icmp_error_matches_probe() {
        let bytes = icmp_v4_error(17, [192, 0, 2, 10], 50000, 443);
        let reply = Inbound::Icmp {
            icmp_type: 3,
            code: 3,
            quoted: quoted_header_v4(&bytes),
        };
        assert_eq!(
            reply.answer(&probe(Protocol::Udp)),
            Some(Response::Icmp {
                icmp_type: 3,
                code: 3
            })
        );
        // Quoted protocol is UDP, so a TCP probe on the same ports is not answered.
        assert_eq!(reply.answer(&probe(Protocol::Tcp)), None);
    }

    #[test]
    fn test_quoted_header_v6() {
        let mut bytes = vec![1, 4, 0, 0, 0, 0, 0, 0];
        let mut ip = vec![0u8; 40];
        ip[0] = 0x60;
        ip[6] = 6;
        ip[39] = 1;
        bytes.extend_from_slice(&ip);
        bytes.extend_from_slice(&50000u16.to_be_bytes());
        bytes.extend_from_slice(&22u16.to_be_bytes());

        let quoted = quoted_header_v6(&bytes).unwrap();
        assert_eq!(quoted.protocol, 6);
        assert_eq!(quoted.destination, IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(quoted.destination_port, 22);
    }

    #[test]
    fn test_normalize_icmpv6() {
        assert_eq!(normalize_icmpv6(1, 4), (3, 3));
        assert_eq!(normalize_icmpv6(1, 1), (3, 13));
        assert_eq!(normalize_icmpv6(1, 3), (3, 1));
        assert_eq!(normalize_icmpv6(3, 0), (11, 0));
        assert_eq!(normalize_icmpv6(1, 2), (1, 2));
        assert_eq!(normalize_icmpv6(1, 7), (1, 7));
        assert_eq!(normalize_icmpv6(128, 0), (128, 0));
    }

    fn icmpv6_reply(protocol: Protocol, icmp_type: u8, code: u8) -> (Inbound, ProbePacket) {
        let target = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let probe = ProbePacket {
            target,
            source: target,
            ..probe(protocol)
        };
        let reply = Inbound::Icmpv6 {
            icmp_type,
            code,
            quoted: Some(QuotedHeader {
                protocol: ip_protocol_number(protocol),
                destination: target,
                source_port: 50000,
                destination_port: 443,
            }),
        };
        (reply, probe)
    }

    #[test]
    fn test_unmapped_icmpv6_stays_icmp() {
        for code in [2, 7] {
            let (reply, probe) = icmpv6_reply(Protocol::Tcp, 1, code);
            assert_eq!(
                reply.answer(&probe),
                Some(Response::Icmp { icmp_type: 1, code })
            );
        }
    }

    #[test]
    fn test_unmapped_icmpv6_to_syn_is_filtered() {
        for code in [2, 7] {
            let (reply, probe) = icmpv6_reply(Protocol::Tcp, 1, code);
            let response = reply.answer(&probe).unwrap();
            assert_eq!(crate::scanner::syn::classify(&response).0, ProbeStatus::Filtered);
        }
    }

    #[test]
    fn test_unmapped_icmpv6_to_udp_is_unknown() {
        let (reply, probe) = icmpv6_reply(Protocol::Udp, 1, 2);
        let response = reply.answer(&probe).unwrap();
        let (status, detail) = crate::scanner::udp::classify(&response);
        assert_eq!(status, ProbeStatus::Unknown);
        assert_eq!(detail.as_deref(), Some("icmp type 1 code 2"));
    }

    #[test]
    fn test_mapped_icmpv6_port_unreachable_closes_udp() {
        let (reply, probe) = icmpv6_reply(Protocol::Udp, 1, 4);
        let response = reply.answer(&probe).unwrap();
        assert_eq!(crate::scanner::udp::classify(&response).0, ProbeStatus::Closed);
    }
}
