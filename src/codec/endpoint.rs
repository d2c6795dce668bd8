//! Endpoint text codec
//!
//! Parses and emits the canonical `[<ipv6>]:<port>` form the controller
//! displays to the user and the `SETPEER-` command carries back. Emission is
//! always fully expanded (eight lowercase four-hex-digit groups, no zero
//! compression) so the string survives being read aloud or retyped; parsing
//! accepts any IPv6 textual form the standard library recognizes between the
//! brackets.

use crate::codec::errors::EndpointError;
use std::net::{Ipv6Addr, SocketAddrV6};

/// Formats a socket address as fully expanded endpoint text
///
/// Example: `[::1]:9000` becomes
/// `[0000:0000:0000:0000:0000:0000:0000:0001]:9000`.
pub fn format_endpoint(addr: &SocketAddrV6) -> String {
    let seg = addr.ip().segments();
    format!(
        "[{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}]:{}",
        seg[0],
        seg[1],
        seg[2],
        seg[3],
        seg[4],
        seg[5],
        seg[6],
        seg[7],
        addr.port()
    )
}

/// Parses endpoint text into a socket address
///
/// Requires a leading `[`, a `]` immediately followed by `:`, and a decimal
/// port in 1..=65535. The bracket contents go through the standard
/// text-to-binary routine, so both compressed (`::1`) and expanded forms are
/// accepted. flowinfo and scope_id are always zero.
///
/// # Returns
/// * `Ok(SocketAddrV6)` on the canonical shape
/// * `Err` on any other shape
pub fn parse_endpoint(text: &str) -> crate::Result<SocketAddrV6> {
    let inner = text.strip_prefix('[').ok_or(EndpointError::BadShape)?;
    let close = inner.find(']').ok_or(EndpointError::BadShape)?;
    let (ip_text, rest) = inner.split_at(close);
    let port_text = rest.strip_prefix("]:").ok_or(EndpointError::BadShape)?;

    let port: u16 = port_text
        .parse()
        .ok()
        .filter(|p| *p > 0)
        .ok_or(EndpointError::BadPort)?;

    let ip: Ipv6Addr = ip_text.parse().map_err(|_| EndpointError::BadAddress)?;
    Ok(SocketAddrV6::new(ip, port, 0, 0))
}
