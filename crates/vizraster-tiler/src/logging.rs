//! Logging setup for applications embedding the tiler.
//!
//! The library only emits `tracing` events; nothing is printed until a
//! subscriber is installed, for example with [`init_logging`].

use tracing_subscriber::EnvFilter;

/// Install a formatted stderr subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `default_level`
/// (e.g. `"info"` or `"vizraster_tiler=debug"`). Returns `false` when a
/// global subscriber was already installed, in which case nothing changes.
pub fn init_logging(default_level: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
