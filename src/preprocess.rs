use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_HEADER_LEN: usize = 4;
const LINUX_SLL_HEADER_LEN: usize = 16;
const IPV6_HEADER_LEN: usize = 40;
const UDP_HEADER_LEN: usize = 8;

/// Link layer of the frames in a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    /// Linux "cooked" capture (SLL)
    LinuxSll,
    /// Bare IPv4/IPv6 packets
    RawIp,
    Unsupported(u32),
}

/// What the innermost recognised protocol of a frame is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Found {
    Udp,
    /// UDP to or from port 53
    Dns,
    Tcp,
    Icmp,
    Other,
}

/// Classification of a frame and where its application payload lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessedFrame {
    pub found: Found,
    pub port_src: u16,
    pub port_dst: u16,
    /// Offset of the application payload from the start of the frame
    pub app_offset: usize,
    pub app_length: usize,
}

impl PreprocessedFrame {
    fn other() -> Self {
        Self {
            found: Found::Other,
            port_src: 0,
            port_dst: 0,
            app_offset: 0,
            app_length: 0,
        }
    }

    pub fn is_udp(&self) -> bool {
        matches!(self.found, Found::Udp | Found::Dns)
    }

    /// Application payload bytes of `frame`
    pub fn app_payload<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        let start = self.app_offset.min(frame.len());
        let end = (self.app_offset + self.app_length).min(frame.len());
        &frame[start..end]
    }
}

/// Classify `frame` and locate its application payload.
///
/// Returns `None` when the headers are truncated or malformed.
pub fn preprocess_frame(frame: &[u8], link_type: LinkType) -> Option<PreprocessedFrame> {
    match link_type {
        LinkType::Ethernet => {
            let ethernet = EthernetPacket::new(frame)?;
            parse_ethertype(frame, ETHERNET_HEADER_LEN, ethernet.get_ethertype())
        }
        LinkType::LinuxSll => {
            let header = frame.get(..LINUX_SLL_HEADER_LEN)?;
            let ethertype = EtherType(u16::from_be_bytes([header[14], header[15]]));
            parse_ethertype(frame, LINUX_SLL_HEADER_LEN, ethertype)
        }
        LinkType::RawIp => match frame.first()? >> 4 {
            4 => parse_ipv4(frame, 0),
            6 => parse_ipv6(frame, 0),
            _ => None,
        },
        LinkType::Unsupported(_) => None,
    }
}

fn parse_ethertype(
    frame: &[u8],
    mut offset: usize,
    mut ethertype: EtherType,
) -> Option<PreprocessedFrame> {
    while ethertype == EtherTypes::Vlan {
        let vlan = VlanPacket::new(frame.get(offset..)?)?;
        ethertype = vlan.get_ethertype();
        offset += VLAN_HEADER_LEN;
    }

    match ethertype {
        EtherTypes::Ipv4 => parse_ipv4(frame, offset),
        EtherTypes::Ipv6 => parse_ipv6(frame, offset),
        _ => Some(PreprocessedFrame::other()),
    }
}

fn parse_ipv4(frame: &[u8], offset: usize) -> Option<PreprocessedFrame> {
    let ipv4 = Ipv4Packet::new(frame.get(offset..)?)?;
    if ipv4.get_version() != 4 {
        return None;
    }

    let header_len = ipv4.get_header_length() as usize * 4;
    let total_len = ipv4.get_total_length() as usize;
    if header_len < 20 || total_len < header_len {
        return None;
    }

    // Only the first fragment carries the transport header
    if ipv4.get_fragment_offset() != 0 {
        return Some(PreprocessedFrame::other());
    }

    let end = (offset + total_len).min(frame.len());
    parse_transport(frame, offset + header_len, end, ipv4.get_next_level_protocol())
}

fn parse_ipv6(frame: &[u8], offset: usize) -> Option<PreprocessedFrame> {
    let ipv6 = Ipv6Packet::new(frame.get(offset..)?)?;
    if ipv6.get_version() != 6 {
        return None;
    }

    let start = offset + IPV6_HEADER_LEN;
    let end = (start + ipv6.get_payload_length() as usize).min(frame.len());
    parse_transport(frame, start, end, ipv6.get_next_header())
}

fn parse_transport(
    frame: &[u8],
    start: usize,
    end: usize,
    protocol: IpNextHeaderProtocol,
) -> Option<PreprocessedFrame> {
    let segment = frame.get(start..end)?;

    match protocol {
        IpNextHeaderProtocols::Udp => {
            let udp = UdpPacket::new(segment)?;
            let udp_len = udp.get_length() as usize;
            if udp_len < UDP_HEADER_LEN {
                return None;
            }

            let port_src = udp.get_source();
            let port_dst = udp.get_destination();
            let found = if port_src == 53 || port_dst == 53 {
                Found::Dns
            } else {
                Found::Udp
            };

            Some(PreprocessedFrame {
                found,
                port_src,
                port_dst,
                app_offset: start + UDP_HEADER_LEN,
                app_length: (udp_len - UDP_HEADER_LEN).min(segment.len() - UDP_HEADER_LEN),
            })
        }
        IpNextHeaderProtocols::Tcp => {
            let tcp = TcpPacket::new(segment)?;
            let header_len = (tcp.get_data_offset() as usize * 4).min(segment.len());
            Some(PreprocessedFrame {
                found: Found::Tcp,
                port_src: tcp.get_source(),
                port_dst: tcp.get_destination(),
                app_offset: start + header_len,
                app_length: segment.len() - header_len,
            })
        }
        IpNextHeaderProtocols::Icmp | IpNextHeaderProtocols::Icmpv6 => Some(PreprocessedFrame {
            found: Found::Icmp,
            ..PreprocessedFrame::other()
        }),
        _ => Some(PreprocessedFrame::other()),
    }
}
