//! Logging bootstrap.
//!
//! Library crates log through the `log` facade only; hosts call [`init`]
//! once at startup to wire the facade to `env_logger`.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for a prism host.
///
/// Honors `RUST_LOG` when set, defaulting to `info` otherwise. Safe to call
/// more than once; later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        if std::env::var_os("RUST_LOG").is_none() {
            builder.filter_level(log::LevelFilter::Info);
        }
        // try_init: a host embedding several engines may already have a logger.
        let _ = builder.try_init();
        log::debug!("logging initialized");
    });
}
