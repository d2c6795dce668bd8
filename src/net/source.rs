//! Route-selected source address probe
//!
//! Fallback for the endpoint advertiser when STUN is unreachable: ask the
//! kernel which source IPv6 it would pick for a well-known public
//! destination. A `connect` on a UDP socket performs route selection without
//! emitting any traffic, and the chosen source then shows up as the socket's
//! local address.

use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use tokio::net::UdpSocket;

/// Cloudflare's public DNS resolver; never actually contacted
const PROBE_TARGET: SocketAddrV6 = SocketAddrV6::new(
    Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1111),
    53,
    0,
    0,
);

/// Returns the kernel-selected source IPv6 for internet-bound traffic
///
/// The throwaway socket is dropped before returning. Errors propagate so the
/// advertiser can fall through to its last-resort choice.
pub async fn chosen_source_address() -> crate::Result<Ipv6Addr> {
    let sock = UdpSocket::bind("[::]:0").await?;
    sock.connect(SocketAddr::V6(PROBE_TARGET)).await?;

    match sock.local_addr()? {
        SocketAddr::V6(local) => Ok(*local.ip()),
        SocketAddr::V4(v4) => Err(format!("source probe selected IPv4 address {}", v4).into()),
    }
}
