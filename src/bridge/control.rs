//! Control dispatcher
//!
//! Handles typed packets arriving on the control socket. Every command gets
//! an answer the controller can show the user: `MYENDP--` plus an `INFO----`
//! on mode setup, an `INFO----` diagnostic on precondition or parse
//! failures, and an `INFO----` "unknown" notice for tags the bridge does not
//! accept as commands. The control channel is loopback-only and trusted; no
//! sender filtering is applied.

use crate::bridge::advertise;
use crate::bridge::session::Session;
use crate::codec::endpoint;
use crate::codec::packet::{PacketType, TAG_LEN};

/// Dispatches one decoded control datagram
pub async fn handle_control_packet(session: &mut Session, tag: &[u8; TAG_LEN], payload: &[u8]) {
    let kind = match PacketType::try_from(tag) {
        Ok(kind) => kind,
        Err(_) => {
            tracing::debug!(
                "unknown control tag {:?}",
                String::from_utf8_lossy(tag)
            );
            session
                .notify_info("Unknown control packet type received.")
                .await;
            return;
        }
    };

    match kind {
        PacketType::MakeLocal => {
            let bind = session.open_local_peer_socket();
            finish_peer_socket_setup(
                session,
                bind,
                "Local loopback peer socket created. Give the displayed port to the other terminal.",
                "Failed to create local peer socket.",
            )
            .await;
        }

        PacketType::MakePublic => {
            let bind = session.open_public_peer_socket();
            finish_peer_socket_setup(
                session,
                bind,
                "Public peer socket created. Exchange the displayed [ipv6]:port text with the other device.",
                "Failed to create public peer socket.",
            )
            .await;
        }

        PacketType::SetPeer => save_remote_peer(session, payload).await,

        PacketType::Msg => forward_chat(session, payload).await,

        PacketType::Exit => handle_exit(session).await,

        // tags the bridge itself emits, or peer-only liveness; a controller
        // sending these is out of protocol
        PacketType::Info | PacketType::CtlPort | PacketType::MyEndpoint | PacketType::Ping => {
            session
                .notify_info("Unknown control packet type received.")
                .await;
        }
    }
}

/// Advertises the fresh peer socket, or reports the failure
///
/// Covers both halves of mode setup: the bind that already happened and the
/// endpoint advertisement. Either failing leaves the controller with a
/// single failure notice and the session without a usable peer socket
/// claim.
async fn finish_peer_socket_setup(
    session: &mut Session,
    bind: std::io::Result<()>,
    ok_text: &str,
    fail_text: &str,
) {
    if let Err(e) = bind {
        tracing::warn!("peer socket bind failed: {}", e);
        session.notify_info(fail_text).await;
        return;
    }

    match advertise::build_shareable_endpoint(session).await {
        Ok(endpoint_text) => {
            session
                .notify(PacketType::MyEndpoint, endpoint_text.as_bytes())
                .await;
            session.notify_info(ok_text).await;
        }
        Err(e) => {
            tracing::warn!("failed to build shareable endpoint: {}", e);
            session.notify_info(fail_text).await;
        }
    }
}

async fn save_remote_peer(session: &mut Session, payload: &[u8]) {
    if !session.peer_socket_ready() {
        session
            .notify_info(
                "Create the peer socket first (local or public) before setting the remote peer.",
            )
            .await;
        return;
    }

    let parsed = std::str::from_utf8(payload)
        .ok()
        .and_then(|text| endpoint::parse_endpoint(text).ok());

    let remote = match parsed {
        Some(remote) => remote,
        None => {
            session
                .notify_info("Remote peer endpoint text was invalid. Expected [ipv6]:port.")
                .await;
            return;
        }
    };

    session.set_remote_peer(remote);
    tracing::info!("remote peer set to {}", remote);
    session
        .notify_info("Remote peer endpoint saved. You can now chat.")
        .await;
}

async fn forward_chat(session: &mut Session, payload: &[u8]) {
    if !session.peer_socket_ready() || !session.remote_peer_ready() {
        session.notify_info("Peer session is not configured yet.").await;
        return;
    }

    if let Err(e) = session.send_to_peer(PacketType::Msg, payload).await {
        tracing::warn!("chat forward to remote peer failed: {}", e);
        session
            .notify_info("Failed to send chat packet to remote peer.")
            .await;
    }
}

async fn handle_exit(session: &mut Session) {
    if session.peer_socket_ready() && session.remote_peer_ready() {
        // best effort; the remote may already be gone
        if let Err(e) = session.send_to_peer(PacketType::Exit, b"").await {
            tracing::debug!("exit notice to remote peer failed: {}", e);
        }
    }

    session
        .notify_info("Local user requested exit. Closing this bridge.")
        .await;
    session.should_exit = true;
}
