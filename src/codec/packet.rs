//! Typed-datagram codec for the bridge protocol
//!
//! Every UDP datagram on both the controller channel and the peer channel
//! carries an 8-byte ASCII type tag followed by an opaque payload:
//!
//! ```text
//! +--------+--------+--------+--------+--------+--------+--------+--------+----
//! |                      Type tag (8 bytes, '-' padded)           | payload...
//! +--------+--------+--------+--------+--------+--------+--------+--------+----
//! ```
//!
//! The tag is compared byte-exact over all 8 bytes. The payload is opaque to
//! the codec; dispatchers decide whether to treat it as UTF-8 text or raw
//! bytes.

use crate::codec::errors::PacketError;
use bytes::{Bytes, BytesMut};

/// Type tag length in bytes
pub const TAG_LEN: usize = 8;

/// Maximum datagram size on the wire, tag included
///
/// Matches the receive buffer on both sockets. The bridge never fragments;
/// a payload that does not fit in a single datagram is an encode error.
pub const MAX_DATAGRAM: usize = 8192;

/// Packet type identifiers
///
/// In-memory form of the nine 8-byte wire tags. Controller-to-bridge command
/// tags and bridge-to-controller notice tags share this one table because the
/// wire format is identical in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Chat or file-transfer payload, relayed verbatim (`MSG-----`)
    Msg,
    /// Session termination from either side (`EXIT----`)
    Exit,
    /// Human-readable notice to the controller (`INFO----`)
    Info,
    /// Bridge announces its control port, once at startup (`CTLPORT-`)
    CtlPort,
    /// Bridge announces the shareable endpoint text (`MYENDP--`)
    MyEndpoint,
    /// Controller requests a loopback peer socket (`MKLOCAL-`)
    MakeLocal,
    /// Controller requests a wildcard peer socket (`MKPUB---`)
    MakePublic,
    /// Controller supplies the remote peer endpoint (`SETPEER-`)
    SetPeer,
    /// Liveness datagram: hole punch or keepalive (`PING----`)
    Ping,
}

impl PacketType {
    /// Returns the 8-byte wire tag for this packet type
    pub const fn tag(&self) -> &'static [u8; TAG_LEN] {
        match self {
            PacketType::Msg => b"MSG-----",
            PacketType::Exit => b"EXIT----",
            PacketType::Info => b"INFO----",
            PacketType::CtlPort => b"CTLPORT-",
            PacketType::MyEndpoint => b"MYENDP--",
            PacketType::MakeLocal => b"MKLOCAL-",
            PacketType::MakePublic => b"MKPUB---",
            PacketType::SetPeer => b"SETPEER-",
            PacketType::Ping => b"PING----",
        }
    }
}

impl TryFrom<&[u8; TAG_LEN]> for PacketType {
    type Error = PacketError;

    /// Converts a wire tag to a PacketType
    ///
    /// # Returns
    /// * `Ok(PacketType)` if the tag is one of the nine known constants
    /// * `Err(PacketError::UnknownType)` otherwise
    fn try_from(tag: &[u8; TAG_LEN]) -> Result<Self, Self::Error> {
        match tag {
            b"MSG-----" => Ok(PacketType::Msg),
            b"EXIT----" => Ok(PacketType::Exit),
            b"INFO----" => Ok(PacketType::Info),
            b"CTLPORT-" => Ok(PacketType::CtlPort),
            b"MYENDP--" => Ok(PacketType::MyEndpoint),
            b"MKLOCAL-" => Ok(PacketType::MakeLocal),
            b"MKPUB---" => Ok(PacketType::MakePublic),
            b"SETPEER-" => Ok(PacketType::SetPeer),
            b"PING----" => Ok(PacketType::Ping),
            _ => Err(PacketError::UnknownType),
        }
    }
}

/// Encodes a typed datagram: 8-byte tag followed by the payload
///
/// # Arguments
/// * `kind` - Packet type providing the wire tag
/// * `payload` - Opaque payload bytes, may be empty
///
/// # Returns
/// * `Ok(Bytes)` - Complete datagram ready for `send_to`
/// * `Err` - If tag plus payload exceed [`MAX_DATAGRAM`]
pub fn encode(kind: PacketType, payload: &[u8]) -> crate::Result<Bytes> {
    if TAG_LEN + payload.len() > MAX_DATAGRAM {
        return Err(PacketError::Oversize.into());
    }

    let mut buf = BytesMut::with_capacity(TAG_LEN + payload.len());
    buf.extend_from_slice(kind.tag());
    buf.extend_from_slice(payload);
    Ok(buf.freeze())
}

/// Decodes a received datagram into its raw tag and payload
///
/// Splits at offset 8. The tag is returned raw rather than as a
/// [`PacketType`] so each dispatcher can apply its own unknown-tag policy
/// (the control dispatcher answers, the peer dispatcher discards).
///
/// # Returns
/// * `Ok((tag, payload))` - Payload may be empty for an 8-byte datagram
/// * `Err` - If the buffer is shorter than the tag
pub fn decode(buf: &[u8]) -> crate::Result<(&[u8; TAG_LEN], &[u8])> {
    if buf.len() < TAG_LEN {
        return Err(PacketError::TooShort.into());
    }

    let (tag, payload) = buf.split_at(TAG_LEN);
    let tag: &[u8; TAG_LEN] = tag.try_into().map_err(|_| PacketError::TooShort)?;
    Ok((tag, payload))
}
