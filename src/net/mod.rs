//! UDP socket plumbing shared by the control and peer channels

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, SocketAddrV6};
use tokio::net::UdpSocket;

pub mod source;
pub mod stun;

/// Binds an IPv6-only UDP socket with address reuse enabled
///
/// Both the control socket and the peer socket go through here so they get
/// the same bind-time options: SO_REUSEADDR, IPV6_V6ONLY, and nonblocking
/// mode for the tokio reactor. The returned socket closes on drop.
///
/// Must be called from within a tokio runtime.
pub fn bind_udp6(addr: SocketAddrV6) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_only_v6(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::V6(addr).into())?;
    UdpSocket::from_std(socket.into())
}

/// Reads the bound local address of a socket as a V6 socket address
///
/// Every socket in this crate is bound via [`bind_udp6`], so a V4 answer
/// indicates a programming error rather than a runtime condition.
pub fn local_addr_v6(sock: &UdpSocket) -> crate::Result<SocketAddrV6> {
    match sock.local_addr()? {
        SocketAddr::V6(v6) => Ok(v6),
        SocketAddr::V4(v4) => Err(format!("socket unexpectedly bound to IPv4 {}", v4).into()),
    }
}
