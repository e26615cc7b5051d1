//! ICMP Echo / Echo Reply / Time Exceeded construction and parsing, built on
//! `pnet`'s packet abstractions. ICMPv6 checksums are left at zero: the
//! kernel fills them in on send for `IPPROTO_ICMPV6` raw sockets.

use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpPacket, IcmpTypes};
use pnet::packet::icmpv6::Icmpv6Types;

use crate::icmp::Mode;

/// Minimum size of an Echo Request/Reply header (type, code, checksum, id, seq).
pub const ECHO_HEADER_LEN: usize = 8;

/// A decoded reply relevant to probe correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Echo Reply carrying the identifier/sequence of the original request.
    EchoReply { ident: u16, seq: u16 },
    /// Time Exceeded carrying the identifier/sequence of the original request.
    TimeExceeded { ident: u16, seq: u16 },
}

/// Builds an ICMP (v4) Echo Request of `ident`/`seq` with a `payload_len`
/// zero-filled payload, checksum computed.
pub fn build_echo_request_v4(ident: u16, seq: u16, payload_len: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; ECHO_HEADER_LEN + payload_len];
    {
        let mut packet = MutableEchoRequestPacket::new(&mut buffer)
            .expect("buffer is at least ECHO_HEADER_LEN bytes");
        packet.set_icmp_type(IcmpTypes::EchoRequest);
        packet.set_icmp_code(icmp::echo_request::IcmpCodes::NoCode);
        packet.set_identifier(ident);
        packet.set_sequence_number(seq);
    }
    let checksum = icmp::checksum(&IcmpPacket::new(&buffer).expect("valid icmp packet"));
    buffer[2..4].copy_from_slice(&checksum.to_be_bytes());
    buffer
}

/// Builds an ICMPv6 Echo Request. The kernel computes the checksum (it needs
/// the pseudo-header's source/destination, unavailable here), so it is left 0.
pub fn build_echo_request_v6(ident: u16, seq: u16, payload_len: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; ECHO_HEADER_LEN + payload_len];
    buffer[0] = Icmpv6Types::EchoRequest.0;
    buffer[1] = 0;
    buffer[4..6].copy_from_slice(&ident.to_be_bytes());
    buffer[6..8].copy_from_slice(&seq.to_be_bytes());
    buffer
}

/// Decodes an ICMPv4 message already stripped of its IPv4 header. Returns
/// `None` for any type we don't correlate against (malformed/foreign reply,
/// per §7, is silently dropped by the caller).
pub fn decode_v4(buf: &[u8]) -> Option<Reply> {
    let packet = IcmpPacket::new(buf)?;
    match packet.get_icmp_type() {
        IcmpTypes::EchoReply => {
            let echo = EchoReplyPacket::new(buf)?;
            Some(Reply::EchoReply {
                ident: echo.get_identifier(),
                seq: echo.get_sequence_number(),
            })
        }
        IcmpTypes::TimeExceeded => decode_time_exceeded(buf, Mode::V4),
        _ => None,
    }
}

/// Decodes an ICMPv6 message. Unlike IPv4, the kernel has already stripped
/// the IPv6 header by the time it reaches a raw `AF_INET6` socket.
pub fn decode_v6(buf: &[u8]) -> Option<Reply> {
    if buf.len() < ECHO_HEADER_LEN {
        return None;
    }
    match buf[0] {
        t if t == Icmpv6Types::EchoReply.0 => Some(Reply::EchoReply {
            ident: u16::from_be_bytes([buf[4], buf[5]]),
            seq: u16::from_be_bytes([buf[6], buf[7]]),
        }),
        t if t == Icmpv6Types::TimeExceeded.0 => decode_time_exceeded(buf, Mode::V6),
        _ => None,
    }
}

/// Time Exceeded carries a truncated copy of the offending packet. Per §4.G,
/// the original identifier/sequence sit at a fixed offset past our own ICMP
/// header plus the embedded IP header: `8 (icmp) + 20 (ipv4)` for v4, or
/// `8 (icmp) + 40 (ipv6)` for v6, then another 8 bytes into the original
/// ICMP Echo header to its id/seq fields.
fn decode_time_exceeded(buf: &[u8], mode: Mode) -> Option<Reply> {
    let embedded_ip_header_len = match mode {
        Mode::V4 => 20,
        Mode::V6 => 40,
    };
    let orig_icmp_offset = ECHO_HEADER_LEN + embedded_ip_header_len;
    if buf.len() < orig_icmp_offset + ECHO_HEADER_LEN {
        return None;
    }
    let ident = u16::from_be_bytes([buf[orig_icmp_offset + 4], buf[orig_icmp_offset + 5]]);
    let seq = u16::from_be_bytes([buf[orig_icmp_offset + 6], buf[orig_icmp_offset + 7]]);
    Some(Reply::TimeExceeded { ident, seq })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_request_v4_round_trips_through_checksum() {
        let packet = build_echo_request_v4(0x1234, 7, 16);
        let view = IcmpPacket::new(&packet).unwrap();
        assert_eq!(view.get_icmp_type(), IcmpTypes::EchoRequest);
        assert_eq!(icmp::checksum(&view), view.get_checksum());
    }

    #[test]
    fn decodes_echo_reply_v4() {
        let mut packet = build_echo_request_v4(42, 9, 8);
        packet[0] = IcmpTypes::EchoReply.0;
        match decode_v4(&packet) {
            Some(Reply::EchoReply { ident, seq }) => {
                assert_eq!(ident, 42);
                assert_eq!(seq, 9);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn decodes_time_exceeded_v4() {
        let original = build_echo_request_v4(99, 5, 8);
        let mut buf = vec![0u8; ECHO_HEADER_LEN + 20 + original.len()];
        buf[0] = IcmpTypes::TimeExceeded.0;
        buf[ECHO_HEADER_LEN + 20..].copy_from_slice(&original);
        match decode_v4(&buf) {
            Some(Reply::TimeExceeded { ident, seq }) => {
                assert_eq!(ident, 99);
                assert_eq!(seq, 5);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn decodes_echo_reply_v6() {
        let mut packet = build_echo_request_v6(7, 3, 8);
        packet[0] = Icmpv6Types::EchoReply.0;
        match decode_v6(&packet) {
            Some(Reply::EchoReply { ident, seq }) => {
                assert_eq!(ident, 7);
                assert_eq!(seq, 3);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_buffer() {
        assert!(decode_v4(&[0u8; 4]).is_none());
        assert!(decode_v6(&[0u8; 4]).is_none());
    }
}
