//! Peer dispatcher
//!
//! Handles typed packets arriving on the peer socket. Chat payloads are
//! relayed to the controller untouched, an exit from the remote side tears
//! the session down, and liveness pings are absorbed. Anything else is
//! discarded without an answer; the peer channel never argues with
//! strangers. Source addresses are not checked, matching the connectionless
//! flow of the protocol.

use crate::bridge::session::Session;
use crate::codec::packet::{PacketType, TAG_LEN};

/// Dispatches one decoded peer datagram
pub async fn handle_peer_packet(session: &mut Session, tag: &[u8; TAG_LEN], payload: &[u8]) {
    let kind = match PacketType::try_from(tag) {
        Ok(kind) => kind,
        Err(_) => {
            tracing::trace!("discarding peer datagram with unknown tag");
            return;
        }
    };

    match kind {
        PacketType::Msg => {
            // relayed verbatim; the controller owns the payload format
            session.notify(PacketType::Msg, payload).await;
        }

        PacketType::Exit => {
            tracing::info!("remote peer ended the session");
            session
                .notify_info("The remote peer ended the session. Closing this bridge.")
                .await;
            session.should_exit = true;
        }

        PacketType::Ping => {
            tracing::trace!("peer liveness ping");
        }

        _ => {
            tracing::trace!("discarding unexpected {:?} on peer socket", kind);
        }
    }
}
