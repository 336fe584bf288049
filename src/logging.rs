use tracing_subscriber::EnvFilter;

/// Initialise logging for the overlay.
///
/// With `debug` enabled every save/restore step is logged and `RUST_LOG`
/// may override the level; otherwise the level is fixed at `info`. A host
/// that already installed a global subscriber keeps it. Returns whether this
/// call installed the subscriber.
pub fn init(debug: bool) -> bool {
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
