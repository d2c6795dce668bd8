//! Bridge core: session state, dispatchers, timer driver, and the event loop
//!
//! The bridge owns two UDP sockets. The control socket talks to the local
//! controller process over `[::1]`; the peer socket talks to the remote
//! bridge. One task multiplexes both and drives the timers; all session
//! state lives on that task, so nothing here needs a lock.

use std::time::Duration;

pub mod advertise;
pub mod control;
pub mod peer;
pub mod runner;
pub mod session;
pub mod timers;

/// Loop tick bounding timer latency and exit latency
pub(crate) const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Keepalive interval while a peer session is up
///
/// One liveness ping per window keeps the NAT binding warm. Typical home
/// router UDP mappings expire after 30-60 seconds of silence.
pub(crate) const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Number of hole-punch datagrams sent right after the remote is set
pub(crate) const INITIAL_PUNCH_COUNT: u32 = 5;

/// Spacing between the initial hole-punch datagrams
pub(crate) const INITIAL_PUNCH_INTERVAL: Duration = Duration::from_millis(500);
