//! Component A: a non-blocking raw ICMP socket.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::errors::ProbeError;
use crate::icmp::Mode;

/// A raw ICMPv4 or ICMPv6 datagram socket, set non-blocking at construction.
pub struct IcmpSocket {
    mode: Mode,
    inner: Socket,
}

impl IcmpSocket {
    /// Opens a raw socket for `mode`. Requires `CAP_NET_RAW` (or root).
    pub fn open(mode: Mode) -> Result<Self, ProbeError> {
        let (domain, protocol) = match mode {
            Mode::V4 => (Domain::IPV4, Protocol::ICMPV4),
            Mode::V6 => (Domain::IPV6, Protocol::ICMPV6),
        };
        let inner = Socket::new(domain, Type::RAW, Some(protocol))
            .map_err(|source| ProbeError::Socket { mode, source })?;
        inner
            .set_nonblocking(true)
            .map_err(|source| ProbeError::Socket { mode, source })?;
        Ok(Self { mode, inner })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }

    /// Sets the per-send TTL (IPv4) or hop limit (IPv6) before a send.
    pub fn set_ttl(&self, ttl: u32) -> Result<(), ProbeError> {
        let result = match self.mode {
            Mode::V4 => self.inner.set_ttl(ttl),
            Mode::V6 => self.inner.set_unicast_hops_v6(ttl),
        };
        result.map_err(|source| ProbeError::Socket { mode: self.mode, source })
    }

    /// Sends `bytes` to `addr`. Errors are transient per §7 and left for the
    /// caller to record as a probe-local failure rather than aborting the loop.
    pub fn send(&self, addr: SocketAddr, bytes: &[u8]) -> std::io::Result<usize> {
        self.inner.send_to(bytes, &SockAddr::from(addr))
    }

    /// Reads one datagram into `buf`. `WouldBlock` means "nothing pending".
    pub fn recv(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        let mut uninit = vec![std::mem::MaybeUninit::new(0u8); buf.len()];
        let (n, from) = self.inner.recv_from(&mut uninit)?;
        for i in 0..n {
            buf[i] = unsafe { uninit[i].assume_init() };
        }
        let peer = from
            .as_socket()
            .ok_or_else(|| std::io::Error::other("unsupported socket address family"))?;
        Ok((n, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_v4_requires_privilege_or_succeeds() {
        match IcmpSocket::open(Mode::V4) {
            Ok(sock) => assert_eq!(sock.mode(), Mode::V4),
            Err(ProbeError::Socket { mode, .. }) => assert_eq!(mode, Mode::V4),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
