//! Event loop and bootstrap
//!
//! One task services the whole bridge: a biased `select!` over the control
//! socket, the peer socket (when present), and a 250 ms tick. Control
//! traffic is served before peer traffic, and the timer driver runs after
//! every wake, so timer latency is bounded by the tick regardless of load.
//! The handler for `MKPUB---` performs STUN inline and can stall the loop
//! for a few seconds; mode switches are rare and the controller initiated
//! it, so the stall is accepted.

use crate::bridge::session::Session;
use crate::bridge::{TICK_INTERVAL, control, peer, timers};
use crate::codec::packet::{self, MAX_DATAGRAM, PacketType};
use crate::net;
use std::io;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use tokio::net::UdpSocket;
use tokio::time::{MissedTickBehavior, interval};

/// What a loop iteration woke up for
enum Wake {
    Control(io::Result<(usize, SocketAddr)>),
    Peer(io::Result<(usize, SocketAddr)>),
    Tick,
}

/// Runs a bridge until either side requests exit
///
/// Binds the control socket, announces the chosen port and a startup notice
/// to the controller listening on `[::1]:<controller_port>`, then services
/// the event loop.
///
/// # Returns
/// * `Ok(())` - A dispatcher saw `EXIT----` from either side
/// * `Err` - Control socket bind failure or a fatal receive error
pub async fn run(controller_port: u16, stun_server: String) -> crate::Result<()> {
    let controller_addr = SocketAddrV6::new(Ipv6Addr::LOCALHOST, controller_port, 0, 0);

    let control_sock = net::bind_udp6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 0, 0, 0))?;
    let control_port = net::local_addr_v6(&control_sock)?.port();
    tracing::info!(
        "control socket bound on [::1]:{}, controller at {}",
        control_port,
        controller_addr
    );

    let mut session = Session::new(control_sock, controller_addr, stun_server);
    session
        .notify(PacketType::CtlPort, control_port.to_string().as_bytes())
        .await;
    session
        .notify_info("Bridge started. Choose local or public mode.")
        .await;

    let result = run_loop(&mut session).await;

    // peer socket goes first; the control socket outlives it and closes
    // when the session drops
    session.close_peer_socket();
    tracing::info!("bridge shut down");
    result
}

async fn run_loop(session: &mut Session) -> crate::Result<()> {
    let mut tick = interval(TICK_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut control_buf = vec![0u8; MAX_DATAGRAM];
    let mut peer_buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let wake = {
            let peer_sock = session.peer.as_ref();
            tokio::select! {
                biased;

                res = session.control.recv_from(&mut control_buf) => Wake::Control(res),
                res = recv_when_open(peer_sock, &mut peer_buf), if peer_sock.is_some() => Wake::Peer(res),
                _ = tick.tick() => Wake::Tick,
            }
        };

        match wake {
            Wake::Control(Ok((len, _from))) => {
                // shorter than a tag: dropped silently
                if let Ok((tag, payload)) = packet::decode(&control_buf[..len]) {
                    control::handle_control_packet(session, tag, payload).await;
                }
            }

            Wake::Peer(Ok((len, _from))) => {
                if let Ok((tag, payload)) = packet::decode(&peer_buf[..len]) {
                    peer::handle_peer_packet(session, tag, payload).await;
                }
            }

            Wake::Control(Err(e)) => {
                tracing::error!("control socket receive failed: {}", e);
                return Err(e.into());
            }

            Wake::Peer(Err(e)) => {
                tracing::error!("peer socket receive failed: {}", e);
                return Err(e.into());
            }

            Wake::Tick => {}
        }

        timers::drive(session).await;

        if session.should_exit {
            return Ok(());
        }
    }
}

/// Receives on the peer socket when one exists
///
/// The select guard keeps this branch disabled while the socket is absent;
/// the pending future only exists to keep the branch type total.
async fn recv_when_open(
    sock: Option<&UdpSocket>,
    buf: &mut [u8],
) -> io::Result<(usize, SocketAddr)> {
    match sock {
        Some(sock) => sock.recv_from(buf).await,
        None => std::future::pending().await,
    }
}
