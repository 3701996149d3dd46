//! Raw socket transport.
//!
//! Sends probes through `pnet` layer-4 transport channels and listens for
//! the reply on the probe's own protocol channel plus an ICMP channel.
//! Every probe opens its own pair of channels and drops them when done.
//!
//! # Privileges Required
//!
//! Opening raw channels requires root (or `CAP_NET_RAW` on Linux). A
//! failure to open them is reported as a `RawError` response for the probe.

use crate::error::{ScanError, ScanResult};
use crate::scanner::response::{quoted_header_v4, quoted_header_v6, Inbound, Response};
use crate::scanner::traits::{PacketTransport, ProbePacket, Protocol};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;
use pnet::transport::{
    icmp_packet_iter, icmpv6_packet_iter, tcp_packet_iter, transport_channel, udp_packet_iter,
    TransportChannelType, TransportProtocol, TransportReceiver, TransportSender,
};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};
use tracing::trace;

/// Receive buffer size for each channel.
const CHANNEL_BUFFER: usize = 4096;

/// How long one receiver is polled before switching to the other.
const POLL_SLICE: Duration = Duration::from_millis(20);

/// Production transport backed by raw sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawTransport;

impl RawTransport {
    pub fn new() -> Self {
        Self
    }

    fn exchange(&self, packet: &ProbePacket, timeout: Duration) -> ScanResult<Response> {
        let v6 = packet.target.is_ipv6();
        let (mut tx, mut proto_rx) = open_channel(transport_protocol(packet.protocol, v6))?;
        let (_icmp_tx, mut icmp_rx) = open_channel(icmp_protocol(v6))?;

        send(&mut tx, packet)?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Response::NoResponse);
            }
            let slice = remaining.min(POLL_SLICE);

            if let Some(inbound) = next_transport(&mut proto_rx, packet.protocol, slice)? {
                if let Some(response) = inbound.answer(packet) {
                    return Ok(response);
                }
                trace!(?inbound, "ignoring unrelated packet");
            }
            if let Some(inbound) = next_icmp(&mut icmp_rx, v6, slice)? {
                if let Some(response) = inbound.answer(packet) {
                    return Ok(response);
                }
                trace!(?inbound, "ignoring unrelated icmp");
            }
        }
    }
}

impl PacketTransport for RawTransport {
    fn source_for(&self, target: IpAddr) -> ScanResult<IpAddr> {
        local_source_for(target)
    }

    fn send_and_wait(&self, packet: &ProbePacket, timeout: Duration) -> Response {
        match self.exchange(packet, timeout) {
            Ok(response) => response,
            Err(e) => Response::RawError {
                detail: e.to_string(),
            },
        }
    }
}

/// Find the local address the kernel would use to reach `target`.
///
/// Connecting a UDP socket sends nothing; it only performs the route lookup.
pub fn local_source_for(target: IpAddr) -> ScanResult<IpAddr> {
    if target.is_loopback() {
        return Ok(target);
    }
    let bind: SocketAddr = match target {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind)?;
    socket
        .connect(SocketAddr::new(target, 9))
        .map_err(|e| ScanError::NoRoute(target.to_string(), e.to_string()))?;
    Ok(socket.local_addr()?.ip())
}

fn transport_protocol(protocol: Protocol, v6: bool) -> TransportChannelType {
    let next: IpNextHeaderProtocol = match protocol {
        Protocol::Tcp => IpNextHeaderProtocols::Tcp,
        Protocol::Udp => IpNextHeaderProtocols::Udp,
    };
    if v6 {
        TransportChannelType::Layer4(TransportProtocol::Ipv6(next))
    } else {
        TransportChannelType::Layer4(TransportProtocol::Ipv4(next))
    }
}

fn icmp_protocol(v6: bool) -> TransportChannelType {
    if v6 {
        TransportChannelType::Layer4(TransportProtocol::Ipv6(IpNextHeaderProtocols::Icmpv6))
    } else {
        TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp))
    }
}

fn open_channel(kind: TransportChannelType) -> ScanResult<(TransportSender, TransportReceiver)> {
    transport_channel(CHANNEL_BUFFER, kind).map_err(ScanError::from_channel_error)
}

fn send(tx: &mut TransportSender, packet: &ProbePacket) -> ScanResult<()> {
    let sent = match packet.protocol {
        Protocol::Tcp => {
            let tcp = TcpPacket::new(&packet.bytes)
                .ok_or_else(|| ScanError::InvalidPacket("truncated TCP segment".to_string()))?;
            tx.send_to(tcp, packet.target)
        }
        Protocol::Udp => {
            let udp = UdpPacket::new(&packet.bytes)
                .ok_or_else(|| ScanError::InvalidPacket("truncated UDP datagram".to_string()))?;
            tx.send_to(udp, packet.target)
        }
    };
    sent.map(|_| ()).map_err(|e| ScanError::RawSocketError(e.to_string()))
}

fn next_transport(
    rx: &mut TransportReceiver,
    protocol: Protocol,
    wait: Duration,
) -> io::Result<Option<Inbound>> {
    let inbound = match protocol {
        Protocol::Tcp => tcp_packet_iter(rx)
            .next_with_timeout(wait)?
            .map(|(tcp, from)| Inbound::Tcp {
                from,
                source_port: tcp.get_source(),
                destination_port: tcp.get_destination(),
                flags: tcp.get_flags(),
            }),
        Protocol::Udp => udp_packet_iter(rx)
            .next_with_timeout(wait)?
            .map(|(udp, from)| Inbound::Udp {
                from,
                source_port: udp.get_source(),
                destination_port: udp.get_destination(),
            }),
    };
    Ok(inbound)
}

fn next_icmp(rx: &mut TransportReceiver, v6: bool, wait: Duration) -> io::Result<Option<Inbound>> {
    let inbound = if v6 {
        icmpv6_packet_iter(rx)
            .next_with_timeout(wait)?
            .map(|(icmp, _)| Inbound::Icmpv6 {
                icmp_type: icmp.get_icmpv6_type().0,
                code: icmp.get_icmpv6_code().0,
                quoted: quoted_header_v6(icmp.packet()),
            })
    } else {
        icmp_packet_iter(rx)
            .next_with_timeout(wait)?
            .map(|(icmp, _)| Inbound::Icmp {
                icmp_type: icmp.get_icmp_type().0,
                code: icmp.get_icmp_code().0,
                quoted: quoted_header_v4(icmp.packet()),
            })
    };
    Ok(inbound)
}
