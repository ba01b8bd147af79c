//! Logging setup. A thin wrapper around `env_logger` so `main` has one
//! call to make and the format stays consistent if it ever needs to change.

/// Initializes the global logger from `RUST_LOG`, with millisecond
/// timestamps. Safe to call more than once; only the first call wins.
pub fn init() {
    let _ = env_logger::builder().format_timestamp_millis().try_init();
}
