//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g. `RUST_LOG=tilestream=debug`
/// to see per-fragment and per-tile events.
///
/// # Example
/// ```no_run
/// tilestream::core::logging::init();
/// log::info!("Loader started");
/// ```
pub fn init() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    )
    .format_timestamp_millis()
    .init();
}
