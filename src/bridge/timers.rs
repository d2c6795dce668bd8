//! Timer driver: hole-punch bursts and keepalives
//!
//! Invoked after every event-loop wake. Does nothing until both the peer
//! socket and the remote endpoint are ready. The initial punch burst opens
//! the NAT path right after `SETPEER-`; the keepalive keeps it open for the
//! rest of the session. The two schedules are independent, so one wake may
//! emit both datagrams.

use crate::bridge::session::Session;
use crate::bridge::{INITIAL_PUNCH_INTERVAL, KEEPALIVE_INTERVAL};
use crate::codec::packet::PacketType;
use std::time::Instant;

/// Emits any punch or keepalive datagram that has come due
///
/// Send failures are logged and the schedule advances anyway; UDP gives no
/// delivery guarantee and the next emission is at most one interval away.
pub async fn drive(session: &mut Session) {
    if !session.peer_socket_ready() || !session.remote_peer_ready() {
        return;
    }

    let now = Instant::now();

    if session.punches_left > 0 {
        let due = match session.last_punch {
            None => true,
            Some(last) => now.duration_since(last) >= INITIAL_PUNCH_INTERVAL,
        };

        if due {
            if let Err(e) = session.send_to_peer(PacketType::Ping, b"hello").await {
                tracing::warn!("hole punch send failed: {}", e);
            }
            session.last_punch = Some(now);
            session.punches_left -= 1;
            tracing::debug!("hole punch sent, {} left", session.punches_left);
        }
    }

    let keepalive_due = match session.last_keepalive {
        None => true,
        Some(last) => now.duration_since(last) >= KEEPALIVE_INTERVAL,
    };

    if keepalive_due {
        if let Err(e) = session.send_to_peer(PacketType::Ping, b"keepalive").await {
            tracing::warn!("keepalive send failed: {}", e);
        }
        session.last_keepalive = Some(now);
        tracing::trace!("keepalive sent");
    }
}
