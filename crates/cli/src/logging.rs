//! Structured logging setup (§6.4).

/// Installs a `tracing-subscriber` formatter honoring `RUST_LOG`, defaulting
/// to `info` when unset.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
