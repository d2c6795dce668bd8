//! Session state for one bridge run
//!
//! A single [`Session`] value is owned by the bootstrap and borrowed mutably
//! by the dispatchers and the timer driver. The readiness flags of the wire
//! protocol are derived from the option fields rather than stored, which
//! keeps the state invariants true by construction:
//!
//! - a saved remote peer implies an open peer socket (closing the socket
//!   clears the remote),
//! - an open peer socket implies a mode of Local or Public and vice versa,
//! - recreating the peer socket drops the remote and cancels pending
//!   punches.

use crate::bridge::INITIAL_PUNCH_COUNT;
use crate::codec::packet::{self, PacketType};
use crate::net;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::time::Instant;
use tokio::net::UdpSocket;

/// Peer socket mode
///
/// Selected by the controller. Local binds the peer socket to the loopback
/// for two bridges on one machine; Public binds the wildcard so the socket
/// can reach (and be reached from) the internet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerMode {
    /// No peer socket yet
    None,
    /// Peer socket bound to `[::1]:0`
    Local,
    /// Peer socket bound to `[::]:0`
    Public,
}

/// All mutable state of a bridge run
pub struct Session {
    /// Loopback socket for controller traffic; outlives every peer socket
    pub(crate) control: UdpSocket,

    /// Remote-facing socket; present iff `mode != None`
    pub(crate) peer: Option<UdpSocket>,

    pub(crate) mode: PeerMode,

    /// The controller's receive endpoint, `[::1]:<argument port>`
    pub(crate) controller_addr: SocketAddrV6,

    /// Saved remote peer endpoint; `Some` once `SETPEER-` succeeded
    pub(crate) remote_peer: Option<SocketAddrV6>,

    /// STUN server consulted when advertising a public endpoint
    pub(crate) stun_server: String,

    /// When the last keepalive ping went out; `None` means never
    pub(crate) last_keepalive: Option<Instant>,

    /// When the last hole-punch ping went out; `None` means never
    pub(crate) last_punch: Option<Instant>,

    /// Remaining initial hole-punch emissions
    pub(crate) punches_left: u32,

    /// Set by a dispatcher once either side requested termination
    pub(crate) should_exit: bool,
}

impl Session {
    pub fn new(control: UdpSocket, controller_addr: SocketAddrV6, stun_server: String) -> Self {
        Session {
            control,
            peer: None,
            mode: PeerMode::None,
            controller_addr,
            remote_peer: None,
            stun_server,
            last_keepalive: None,
            last_punch: None,
            punches_left: 0,
            should_exit: false,
        }
    }

    /// True iff the peer socket exists and is bound
    pub fn peer_socket_ready(&self) -> bool {
        self.peer.is_some()
    }

    /// True iff a valid remote endpoint has been saved
    pub fn remote_peer_ready(&self) -> bool {
        self.remote_peer.is_some()
    }

    pub fn mode(&self) -> PeerMode {
        self.mode
    }

    /// Binds a fresh loopback peer socket, replacing any existing one
    pub fn open_local_peer_socket(&mut self) -> std::io::Result<()> {
        self.open_peer_socket(PeerMode::Local, SocketAddrV6::new(Ipv6Addr::LOCALHOST, 0, 0, 0))
    }

    /// Binds a fresh wildcard peer socket, replacing any existing one
    pub fn open_public_peer_socket(&mut self) -> std::io::Result<()> {
        self.open_peer_socket(
            PeerMode::Public,
            SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0),
        )
    }

    fn open_peer_socket(&mut self, mode: PeerMode, bind_addr: SocketAddrV6) -> std::io::Result<()> {
        // any recreation invalidates the saved remote and pending punches
        self.close_peer_socket();

        let sock = net::bind_udp6(bind_addr)?;
        tracing::info!("peer socket bound on {} ({:?} mode)", sock.local_addr()?, mode);
        self.peer = Some(sock);
        self.mode = mode;
        Ok(())
    }

    /// Closes the peer socket, if open, and resets the peer session
    ///
    /// The socket itself closes on drop. Mode returns to None and the saved
    /// remote and punch schedule are cleared so no timer fires against a
    /// socket that no longer exists.
    pub fn close_peer_socket(&mut self) {
        self.peer = None;
        self.mode = PeerMode::None;
        self.remote_peer = None;
        self.punches_left = 0;
    }

    /// Saves the remote endpoint and schedules the initial punch burst
    pub fn set_remote_peer(&mut self, remote: SocketAddrV6) {
        self.remote_peer = Some(remote);
        self.schedule_punches();
    }

    /// Arms the initial hole-punch burst and restarts the keepalive window
    pub fn schedule_punches(&mut self) {
        self.punches_left = INITIAL_PUNCH_COUNT;
        self.last_punch = None;
        self.last_keepalive = Some(Instant::now());
    }

    /// Sends a typed packet to the controller
    ///
    /// The controller is local, so a send failure here has no recovery
    /// path; it is logged and the bridge carries on.
    pub async fn notify(&self, kind: PacketType, payload: &[u8]) {
        let pkt = match packet::encode(kind, payload) {
            Ok(pkt) => pkt,
            Err(e) => {
                tracing::error!("failed to encode {:?} notice: {}", kind, e);
                return;
            }
        };

        if let Err(e) = self
            .control
            .send_to(&pkt, SocketAddr::V6(self.controller_addr))
            .await
        {
            tracing::error!("failed to send {:?} to controller: {}", kind, e);
        }
    }

    /// Sends a human-readable `INFO----` notice to the controller
    pub async fn notify_info(&self, text: &str) {
        self.notify(PacketType::Info, text.as_bytes()).await;
    }

    /// Sends a typed packet to the saved remote peer
    ///
    /// # Returns
    /// * `Err` - If the session is not configured or the send failed;
    ///   callers decide whether that warrants a controller notice
    pub async fn send_to_peer(&self, kind: PacketType, payload: &[u8]) -> crate::Result<()> {
        let sock = self.peer.as_ref().ok_or("peer socket not ready")?;
        let remote = self.remote_peer.ok_or("remote peer not set")?;

        let pkt = packet::encode(kind, payload)?;
        sock.send_to(&pkt, SocketAddr::V6(remote)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_session() -> Session {
        let control = net::bind_udp6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 0, 0, 0)).unwrap();
        Session::new(
            control,
            SocketAddrV6::new(Ipv6Addr::LOCALHOST, 40000, 0, 0),
            "stun.invalid:3478".to_string(),
        )
    }

    #[tokio::test]
    async fn test_fresh_session_is_idle() {
        let session = test_session().await;
        assert!(!session.peer_socket_ready());
        assert!(!session.remote_peer_ready());
        assert_eq!(session.mode(), PeerMode::None);
        assert_eq!(session.punches_left, 0);
        assert!(!session.should_exit);
    }

    #[tokio::test]
    async fn test_open_local_peer_socket() {
        let mut session = test_session().await;
        session.open_local_peer_socket().unwrap();

        assert!(session.peer_socket_ready());
        assert_eq!(session.mode(), PeerMode::Local);
        assert!(!session.remote_peer_ready());

        let local = net::local_addr_v6(session.peer.as_ref().unwrap()).unwrap();
        assert_eq!(*local.ip(), Ipv6Addr::LOCALHOST);
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn test_open_public_peer_socket() {
        let mut session = test_session().await;
        session.open_public_peer_socket().unwrap();

        assert!(session.peer_socket_ready());
        assert_eq!(session.mode(), PeerMode::Public);

        let local = net::local_addr_v6(session.peer.as_ref().unwrap()).unwrap();
        assert_eq!(*local.ip(), Ipv6Addr::UNSPECIFIED);
    }

    #[tokio::test]
    async fn test_set_remote_peer_schedules_punches() {
        let mut session = test_session().await;
        session.open_local_peer_socket().unwrap();
        session.set_remote_peer(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 12345, 0, 0));

        assert!(session.remote_peer_ready());
        assert_eq!(session.punches_left, INITIAL_PUNCH_COUNT);
        assert!(session.last_punch.is_none());
        assert!(session.last_keepalive.is_some());
    }

    #[tokio::test]
    async fn test_reopening_socket_clears_remote_and_punches() {
        let mut session = test_session().await;
        session.open_local_peer_socket().unwrap();
        session.set_remote_peer(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 12345, 0, 0));

        session.open_public_peer_socket().unwrap();

        assert!(session.peer_socket_ready());
        assert!(!session.remote_peer_ready());
        assert_eq!(session.punches_left, 0);
        assert_eq!(session.mode(), PeerMode::Public);
    }

    #[tokio::test]
    async fn test_close_peer_socket_resets_everything() {
        let mut session = test_session().await;
        session.open_local_peer_socket().unwrap();
        session.set_remote_peer(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 12345, 0, 0));

        session.close_peer_socket();

        assert!(!session.peer_socket_ready());
        assert!(!session.remote_peer_ready());
        assert_eq!(session.mode(), PeerMode::None);
        assert_eq!(session.punches_left, 0);
    }

    #[tokio::test]
    async fn test_send_to_peer_requires_configuration() {
        let session = test_session().await;
        assert!(session.send_to_peer(PacketType::Msg, b"hi").await.is_err());
    }
}
