use clap::Parser;
use std::process::ExitCode;

use rustbridge::bridge::runner;
use rustbridge::net::stun;
use rustbridge::utils;

/// IPv6 UDP chat bridge driven by a loopback controller
///
/// The controller spawns this binary with the UDP port it is already
/// listening on. The bridge binds its own loopback control socket, reports
/// the chosen port back as a `CTLPORT-` packet, and then follows the
/// controller's commands until either side exits.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port the controller is receiving on at ::1
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    controller_port: u16,

    /// STUN server consulted when advertising a public endpoint
    #[arg(long, default_value = stun::DEFAULT_SERVER)]
    stun_server: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // clap exits 2 on usage errors by default; the controller contract is
    // status 1 for anything that keeps the bridge from starting
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    if let Err(e) = utils::init_tracing() {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(1);
    }

    tracing::info!(
        "starting bridge for controller port {}",
        args.controller_port
    );

    match runner::run(args.controller_port, args.stun_server).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("bridge terminated with error: {}", e);
            ExitCode::from(1)
        }
    }
}
