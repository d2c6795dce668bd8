use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber for a bridge process
///
/// Diagnostics go to stderr: stdout belongs to whatever spawned the bridge,
/// and the controller only ever reads the UDP control channel. `RUST_LOG`
/// overrides the INFO default.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    // Windows consoles render ANSI color codes as garbage characters
    let use_ansi = !cfg!(target_os = "windows");

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_ansi(use_ansi)
            .with_writer(std::io::stderr)
            .finish(),
    )?;
    Ok(())
}
