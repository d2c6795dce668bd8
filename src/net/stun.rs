//! STUN client for NAT traversal and public address discovery
//!
//! Implements the one transaction the bridge needs from RFC 5389: an IPv6
//! Binding Request on a caller-supplied socket, returning the mapped
//! address from the XOR-MAPPED-ADDRESS (or legacy MAPPED-ADDRESS) attribute
//! of the success response.
//!
//! The transaction deliberately runs on the same socket the peer traffic
//! will use: the point is to observe the exact NAT binding that socket has,
//! not the binding some throwaway probe socket would get.

use anyhow::{Context, Result};
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::time::Duration;
use tokio::net::{UdpSocket, lookup_host};
use tokio::time::{Instant, timeout_at};

/// STUN server queried when advertising a public endpoint
pub const DEFAULT_SERVER: &str = "stun.cloudflare.com:3478";

const BINDING_REQUEST: u16 = 0x0001;
const BINDING_SUCCESS: u16 = 0x0101;
const MAGIC_COOKIE: u32 = 0x2112A442;
const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const FAMILY_IPV6: u8 = 0x02;

/// STUN message header: type(2) + length(2) + cookie(4) + transaction id(12)
const HEADER_LEN: usize = 20;
const TXID_LEN: usize = 12;

/// One datagram is plenty for a Binding Success response
const RESPONSE_BUFSZ: usize = 1500;

const MAX_ATTEMPTS: u32 = 3;
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolves a `host:port` STUN server string to an IPv6 socket address
///
/// The bridge speaks IPv6 only, so IPv4 DNS results are skipped.
pub async fn resolve_server(server: &str) -> Result<SocketAddrV6> {
    let addrs = lookup_host(server)
        .await
        .with_context(|| format!("failed to resolve STUN server {}", server))?;

    addrs
        .filter_map(|addr| match addr {
            SocketAddr::V6(v6) => Some(v6),
            SocketAddr::V4(_) => None,
        })
        .next()
        .with_context(|| format!("no IPv6 address resolved for STUN server {}", server))
}

/// Performs a Binding transaction and returns the mapped address
///
/// Sends up to three requests, waiting 2 seconds per attempt on `sock`.
/// Datagrams that fail validation (wrong cookie, wrong transaction id,
/// wrong message type, truncated attributes) are dropped and the wait
/// continues within the attempt's remaining budget, since unrelated peer
/// traffic can land on this socket while the transaction is in flight.
///
/// # Arguments
/// * `sock` - The socket whose NAT mapping is wanted (the peer socket)
/// * `server` - Resolved STUN server address
///
/// # Returns
/// * `Ok(SocketAddrV6)` - The server-observed address and port
/// * `Err` - All attempts timed out or failed
pub async fn query_mapped_address(sock: &UdpSocket, server: SocketAddrV6) -> Result<SocketAddrV6> {
    let txid: [u8; TXID_LEN] = rand::random();
    let request = build_binding_request(&txid);
    let mut resp = [0u8; RESPONSE_BUFSZ];

    for attempt in 1..=MAX_ATTEMPTS {
        tracing::debug!("STUN binding attempt {}/{} to {}", attempt, MAX_ATTEMPTS, server);

        if let Err(e) = sock.send_to(&request, SocketAddr::V6(server)).await {
            tracing::debug!("STUN request send failed: {}", e);
            continue;
        }

        let deadline = Instant::now() + ATTEMPT_TIMEOUT;
        while let Ok(received) = timeout_at(deadline, sock.recv_from(&mut resp)).await {
            let (len, from) = match received {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("recv failed during STUN wait: {}", e);
                    break;
                }
            };

            if let Some(mapped) = parse_binding_response(&resp[..len], &txid) {
                tracing::info!("STUN mapped address {} via {}", mapped, server);
                return Ok(mapped);
            }
            tracing::trace!("ignoring non-matching datagram ({} bytes) from {}", len, from);
        }
    }

    anyhow::bail!(
        "no valid STUN binding response from {} after {} attempts",
        server,
        MAX_ATTEMPTS
    )
}

/// Builds the 20-byte Binding Request: no attributes, length zero
fn build_binding_request(txid: &[u8; TXID_LEN]) -> [u8; HEADER_LEN] {
    let mut req = [0u8; HEADER_LEN];
    req[0..2].copy_from_slice(&BINDING_REQUEST.to_be_bytes());
    // bytes 2..4 stay zero: message length
    req[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
    req[8..20].copy_from_slice(txid);
    req
}

/// Validates a response and extracts the IPv6 mapping, if any
///
/// Validation order: length, cookie, message type, attribute region bounds,
/// transaction id. The attribute walk keeps the first XOR-MAPPED-ADDRESS it
/// sees and returns immediately; a legacy MAPPED-ADDRESS is only consulted
/// when no XOR attribute appears anywhere in the response.
fn parse_binding_response(buf: &[u8], txid: &[u8; TXID_LEN]) -> Option<SocketAddrV6> {
    if buf.len() < HEADER_LEN {
        return None;
    }

    let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
    let msg_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);

    if cookie != MAGIC_COOKIE {
        return None;
    }
    if msg_type != BINDING_SUCCESS {
        return None;
    }
    if HEADER_LEN + msg_len > buf.len() {
        return None;
    }
    if &buf[8..HEADER_LEN] != txid {
        return None;
    }

    let attrs = &buf[HEADER_LEN..HEADER_LEN + msg_len];
    let mut pos = 0usize;
    let mut legacy: Option<(Ipv6Addr, u16)> = None;

    while pos + 4 <= attrs.len() {
        let attr_type = u16::from_be_bytes([attrs[pos], attrs[pos + 1]]);
        let attr_len = u16::from_be_bytes([attrs[pos + 2], attrs[pos + 3]]) as usize;
        pos += 4;
        if pos + attr_len > attrs.len() {
            // truncated attribute: nothing after it can be trusted
            break;
        }
        let value = &attrs[pos..pos + attr_len];

        if attr_type == ATTR_XOR_MAPPED_ADDRESS && attr_len >= 20 && value[1] == FAMILY_IPV6 {
            let port = u16::from_be_bytes([value[2], value[3]]) ^ (MAGIC_COOKIE >> 16) as u16;

            let mut key = [0u8; 16];
            key[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            key[4..].copy_from_slice(txid);

            let mut octets = [0u8; 16];
            octets.copy_from_slice(&value[4..20]);
            for (byte, k) in octets.iter_mut().zip(&key) {
                *byte ^= k;
            }

            // well-formed replies carry exactly one XOR-MAPPED-ADDRESS
            return Some(SocketAddrV6::new(Ipv6Addr::from(octets), port, 0, 0));
        }

        if attr_type == ATTR_MAPPED_ADDRESS
            && attr_len >= 20
            && value[1] == FAMILY_IPV6
            && legacy.is_none()
        {
            let port = u16::from_be_bytes([value[2], value[3]]);
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&value[4..20]);
            legacy = Some((Ipv6Addr::from(octets), port));
        }

        pos += (attr_len + 3) & !3;
    }

    legacy.map(|(ip, port)| SocketAddrV6::new(ip, port, 0, 0))
}
