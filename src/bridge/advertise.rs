//! Endpoint advertiser
//!
//! Composes the shareable `[ipv6]:port` string the controller displays after
//! a peer socket is created. In local mode the bound loopback address is the
//! endpoint. In public mode the bound address is the wildcard, so the
//! advertiser works down a fallback chain: the STUN-observed mapping of the
//! peer socket, then the route-selected source address paired with the bound
//! port, then the bound address as a last resort. None of the fallbacks are
//! surfaced as errors.

use crate::bridge::session::{PeerMode, Session};
use crate::codec::endpoint;
use crate::net::{self, source, stun};
use std::net::SocketAddrV6;
use tokio::net::UdpSocket;

/// Builds the endpoint text to hand to the remote side
///
/// Runs on the peer socket itself so a STUN answer reflects the NAT binding
/// that peer traffic will actually use. Only fails when the peer socket is
/// missing or its bound address cannot be read.
pub async fn build_shareable_endpoint(session: &Session) -> crate::Result<String> {
    let sock = session.peer.as_ref().ok_or("peer socket not ready")?;
    let bound = net::local_addr_v6(sock)?;

    if session.mode() == PeerMode::Local {
        return Ok(endpoint::format_endpoint(&bound));
    }

    match stun_mapped(&session.stun_server, sock).await {
        Ok(mapped) => return Ok(endpoint::format_endpoint(&mapped)),
        Err(e) => tracing::warn!("STUN discovery failed, falling back: {:#}", e),
    }

    match source::chosen_source_address().await {
        Ok(ip) => {
            // the bound address is the wildcard; remote peers need the
            // route-selected source paired with the bound port
            let guess = SocketAddrV6::new(ip, bound.port(), 0, 0);
            Ok(endpoint::format_endpoint(&guess))
        }
        Err(e) => {
            tracing::warn!("source probe failed, advertising bound address: {}", e);
            Ok(endpoint::format_endpoint(&bound))
        }
    }
}

async fn stun_mapped(server: &str, sock: &UdpSocket) -> anyhow::Result<SocketAddrV6> {
    let server = stun::resolve_server(server).await?;
    stun::query_mapped_address(sock, server).await
}
