//! Thin collaborators the engines depend on but which contain no significant
//! engineering of their own (§1): hostname resolution and local outbound
//! address discovery.

use std::net::{IpAddr, SocketAddr, UdpSocket};

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::Resolver;

use crate::errors::ProbeError;

/// Resolves `host` to a usable address. IPv4 is preferred; IPv6 is allowed
/// when no A record exists, unless `force_v6` requests IPv6 outright (and
/// `force_v4` the reverse).
pub fn resolve_host(host: &str, force_v4: bool, force_v6: bool) -> Result<IpAddr, ProbeError> {
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Ok(addr);
    }

    let resolver = Resolver::new(ResolverConfig::default(), ResolverOpts::default())
        .map_err(|_| ProbeError::Resolve { host: host.to_string() })?;
    let response = resolver
        .lookup_ip(host)
        .map_err(|_| ProbeError::Resolve { host: host.to_string() })?;

    let mut first_v6 = None;
    for addr in response.iter() {
        match addr {
            IpAddr::V4(_) if !force_v6 => return Ok(addr),
            IpAddr::V6(_) if first_v6.is_none() => first_v6 = Some(addr),
            _ => {}
        }
    }
    if force_v4 {
        return Err(ProbeError::Resolve { host: host.to_string() });
    }
    first_v6.ok_or_else(|| ProbeError::Resolve { host: host.to_string() })
}

/// Discovers the local outbound address for reaching `target` by connecting
/// a UDP socket (no datagram is ever sent) — the traditional "dial trick".
pub fn local_outbound_addr(target: IpAddr) -> std::io::Result<IpAddr> {
    let bind_addr: SocketAddr = match target {
        IpAddr::V4(_) => "0.0.0.0:0".parse().unwrap(),
        IpAddr::V6(_) => "[::]:0".parse().unwrap(),
    };
    let socket = UdpSocket::bind(bind_addr)?;
    socket.connect(SocketAddr::new(target, 9))?;
    Ok(socket.local_addr()?.ip())
}
