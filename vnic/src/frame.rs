// Header summary of Ethernet frames crossing the NIC
//
// Parses Ethernet, IPv4 and UDP/TCP headers with smoltcp::wire and logs the
// interesting fields on every transmit and receive.

use core::fmt;
use smoltcp::wire::{
    EthernetFrame, EthernetProtocol, IpProtocol, Ipv4Address, Ipv4Packet, TcpPacket, UdpPacket,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetSummary {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub ethertype: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Summary {
    pub version: u8,
    /// Header length in bytes
    pub header_len: u8,
    pub dscp: u8,
    pub ecn: u8,
    pub total_len: u16,
    pub ident: u16,
    pub dont_frag: bool,
    pub more_frags: bool,
    /// Fragment offset in bytes
    pub frag_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Address,
    pub dst: Ipv4Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp {
        src_port: u16,
        dst_port: u16,
        /// Header plus data length
        len: u16,
        checksum: u16,
    },
    Tcp {
        src_port: u16,
        dst_port: u16,
        window: u16,
        checksum: u16,
        seq: u32,
        ack: u32,
    },
}

/// How far parsing got before it had to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// All headers and the payload were found
    Complete,
    /// The frame ended inside a header
    Truncated,
    /// Not IPv4 past the Ethernet header
    NotIpv4,
    /// Not UDP or TCP past the IPv4 header
    OtherTransport,
}

/// Decoded headers of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSummary {
    pub len: usize,
    pub ethernet: Option<EthernetSummary>,
    pub ipv4: Option<Ipv4Summary>,
    pub transport: Option<Transport>,
    pub payload_len: Option<usize>,
    pub stop: Stop,
}

impl FrameSummary {
    pub fn parse(data: &[u8]) -> Self {
        let mut summary = FrameSummary {
            len: data.len(),
            ethernet: None,
            ipv4: None,
            transport: None,
            payload_len: None,
            stop: Stop::Truncated,
        };

        let eth = match EthernetFrame::new_checked(data) {
            Ok(eth) => eth,
            Err(_) => return summary,
        };
        summary.ethernet = Some(EthernetSummary {
            dst: eth.dst_addr().0,
            src: eth.src_addr().0,
            ethertype: u16::from(eth.ethertype()),
        });
        if eth.ethertype() != EthernetProtocol::Ipv4 {
            summary.stop = Stop::NotIpv4;
            return summary;
        }

        let ip = match Ipv4Packet::new_checked(eth.payload()) {
            Ok(ip) => ip,
            Err(_) => return summary,
        };
        summary.ipv4 = Some(Ipv4Summary {
            version: ip.version(),
            header_len: ip.header_len(),
            dscp: ip.dscp(),
            ecn: ip.ecn(),
            total_len: ip.total_len(),
            ident: ip.ident(),
            dont_frag: ip.dont_frag(),
            more_frags: ip.more_frags(),
            frag_offset: ip.frag_offset(),
            ttl: ip.hop_limit(),
            protocol: u8::from(ip.next_header()),
            checksum: ip.checksum(),
            src: ip.src_addr(),
            dst: ip.dst_addr(),
        });

        match ip.next_header() {
            IpProtocol::Udp => {
                let udp = match UdpPacket::new_checked(ip.payload()) {
                    Ok(udp) => udp,
                    Err(_) => return summary,
                };
                summary.transport = Some(Transport::Udp {
                    src_port: udp.src_port(),
                    dst_port: udp.dst_port(),
                    len: udp.len(),
                    checksum: udp.checksum(),
                });
                summary.payload_len = Some(udp.payload().len());
            }
            IpProtocol::Tcp => {
                let tcp = match TcpPacket::new_checked(ip.payload()) {
                    Ok(tcp) => tcp,
                    Err(_) => return summary,
                };
                summary.transport = Some(Transport::Tcp {
                    src_port: tcp.src_port(),
                    dst_port: tcp.dst_port(),
                    window: tcp.window_len(),
                    checksum: tcp.checksum(),
                    seq: tcp.seq_number().0 as u32,
                    ack: tcp.ack_number().0 as u32,
                });
                summary.payload_len = Some(tcp.payload().len());
            }
            _ => {
                summary.stop = Stop::OtherTransport;
                return summary;
            }
        }

        summary.stop = Stop::Complete;
        summary
    }
}

struct Mac<'a>(&'a [u8; 6]);

impl fmt::Display for Mac<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "len {}", self.len)?;

        if let Some(eth) = &self.ethernet {
            write!(
                f,
                " | {} -> {} type 0x{:04X}",
                Mac(&eth.src),
                Mac(&eth.dst),
                eth.ethertype
            )?;
        }

        if let Some(ip) = &self.ipv4 {
            write!(
                f,
                " | IPv{} hl {} tot {} id 0x{:04X} off {} ttl {} proto {} csum 0x{:04X} {} -> {}",
                ip.version,
                ip.header_len,
                ip.total_len,
                ip.ident,
                ip.frag_offset,
                ip.ttl,
                ip.protocol,
                ip.checksum,
                ip.src,
                ip.dst
            )?;
        }

        match &self.transport {
            Some(Transport::Udp {
                src_port,
                dst_port,
                len,
                checksum,
            }) => write!(
                f,
                " | UDP {} -> {} len {} csum 0x{:04X}",
                src_port, dst_port, len, checksum
            )?,
            Some(Transport::Tcp {
                src_port,
                dst_port,
                window,
                checksum,
                seq,
                ack,
            }) => write!(
                f,
                " | TCP {} -> {} win {} csum 0x{:04X} seq {} ack {}",
                src_port, dst_port, window, checksum, seq, ack
            )?,
            None => {}
        }

        match (self.stop, self.payload_len) {
            (Stop::Complete, Some(payload)) => write!(f, " | payload {}", payload),
            (Stop::Truncated, _) => write!(f, " | truncated"),
            (Stop::NotIpv4, _) => write!(f, " | non-IP"),
            (Stop::OtherTransport, _) => write!(f, " | non-UDP/TCP"),
            (Stop::Complete, None) => Ok(()),
        }
    }
}

/// Log a one-line header summary of `data` at debug level
pub fn log_frame(ifname: &str, direction: &str, data: &[u8]) {
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("{}: {} {}", ifname, direction, FrameSummary::parse(data));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    const ETH_HDR: [u8; 14] = [
        0x02, 0x00, 0x00, 0x00, 0x00, 0x02, // dst
        0x02, 0x00, 0x00, 0x00, 0x00, 0x01, // src
        0x08, 0x00, // IPv4
    ];

    fn ipv4_header(protocol: u8, total_len: u16) -> [u8; 20] {
        let len = total_len.to_be_bytes();
        [
            0x45, 0x00, len[0], len[1], // version/ihl, tos, total length
            0x12, 0x34, 0x40, 0x00, // id, DF
            64, protocol, 0xab, 0xcd, // ttl, protocol, checksum
            10, 0, 0, 1, // src
            10, 0, 0, 2, // dst
        ]
    }

    /// Ethernet + IPv4 + UDP frame carrying `payload`
    pub(crate) fn udp_frame(payload: &[u8]) -> Vec<u8> {
        let udp_len = 8 + payload.len() as u16;
        let mut frame = ETH_HDR.to_vec();
        frame.extend_from_slice(&ipv4_header(17, 20 + udp_len));
        frame.extend_from_slice(&1234u16.to_be_bytes());
        frame.extend_from_slice(&53u16.to_be_bytes());
        frame.extend_from_slice(&udp_len.to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(payload);
        frame
    }

    fn tcp_frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = ETH_HDR.to_vec();
        frame.extend_from_slice(&ipv4_header(6, 40 + payload.len() as u16));
        frame.extend_from_slice(&80u16.to_be_bytes());
        frame.extend_from_slice(&40000u16.to_be_bytes());
        frame.extend_from_slice(&1000u32.to_be_bytes()); // seq
        frame.extend_from_slice(&2000u32.to_be_bytes()); // ack
        frame.extend_from_slice(&[0x50, 0x18]); // data offset 5, PSH|ACK
        frame.extend_from_slice(&512u16.to_be_bytes()); // window
        frame.extend_from_slice(&[0x11, 0x22, 0x00, 0x00]); // checksum, urgent
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn test_parse_udp() {
        let data = udp_frame(b"ping");
        let summary = FrameSummary::parse(&data);

        assert_eq!(summary.stop, Stop::Complete);
        assert_eq!(summary.len, 46);
        let eth = summary.ethernet.unwrap();
        assert_eq!(eth.src, [0x02, 0, 0, 0, 0, 0x01]);
        assert_eq!(eth.ethertype, 0x0800);

        let ip = summary.ipv4.unwrap();
        assert_eq!(ip.version, 4);
        assert_eq!(ip.header_len, 20);
        assert_eq!(ip.total_len, 32);
        assert_eq!(ip.ident, 0x1234);
        assert!(ip.dont_frag);
        assert_eq!(ip.ttl, 64);
        assert_eq!(ip.protocol, 17);
        assert_eq!(ip.checksum, 0xabcd);
        assert_eq!(ip.src, Ipv4Address::new(10, 0, 0, 1));

        assert_eq!(
            summary.transport,
            Some(Transport::Udp {
                src_port: 1234,
                dst_port: 53,
                len: 12,
                checksum: 0
            })
        );
        assert_eq!(summary.payload_len, Some(4));
    }

    #[test]
    fn test_parse_tcp() {
        let data = tcp_frame(b"GET /");
        let summary = FrameSummary::parse(&data);

        assert_eq!(summary.stop, Stop::Complete);
        assert_eq!(
            summary.transport,
            Some(Transport::Tcp {
                src_port: 80,
                dst_port: 40000,
                window: 512,
                checksum: 0x1122,
                seq: 1000,
                ack: 2000
            })
        );
        assert_eq!(summary.payload_len, Some(5));
    }

    #[test]
    fn test_truncated_ethernet() {
        let summary = FrameSummary::parse(&[0u8; 10]);
        assert_eq!(summary.stop, Stop::Truncated);
        assert!(summary.ethernet.is_none());
    }

    #[test]
    fn test_truncated_ipv4() {
        let data = udp_frame(b"ping");
        let summary = FrameSummary::parse(&data[..24]);
        assert_eq!(summary.stop, Stop::Truncated);
        assert!(summary.ethernet.is_some());
        assert!(summary.ipv4.is_none());
    }

    #[test]
    fn test_non_ip() {
        let mut data = ETH_HDR.to_vec();
        data[12] = 0x08;
        data[13] = 0x06; // ARP
        data.extend_from_slice(&[0u8; 28]);
        let summary = FrameSummary::parse(&data);
        assert_eq!(summary.stop, Stop::NotIpv4);
        assert_eq!(summary.ethernet.unwrap().ethertype, 0x0806);
    }

    #[test]
    fn test_other_transport() {
        let mut data = ETH_HDR.to_vec();
        data.extend_from_slice(&ipv4_header(1, 28)); // ICMP
        data.extend_from_slice(&[0u8; 8]);
        let summary = FrameSummary::parse(&data);
        assert_eq!(summary.stop, Stop::OtherTransport);
        assert!(summary.ipv4.is_some());
        assert!(summary.transport.is_none());
    }

    #[test]
    fn test_display_line() {
        let line = FrameSummary::parse(&udp_frame(b"ping")).to_string();
        assert!(line.starts_with("len 46 | 02:00:00:00:00:01 -> 02:00:00:00:00:02 type 0x0800"));
        assert!(line.contains("10.0.0.1 -> 10.0.0.2"));
        assert!(line.contains("UDP 1234 -> 53 len 12"));
        assert!(line.ends_with("payload 4"));
    }
}
