//! Logger bootstrap.
//!
//! Binaries and integration tests call [`init`] once at startup to install the
//! `env_logger` backend behind the `log` facade.  Repeated calls are no-ops, so
//! every test can call it without coordinating.
//!
//! # Example
//!
//! ```rust
//! backlot::logging::init();
//! log::info!("pipeline starting");
//! ```

use std::sync::Once;

static INIT: Once = Once::new();

/// Install `env_logger` as the global logger.
///
/// Respects the usual `RUST_LOG` filter variable.  Safe to call from multiple
/// tests or threads; only the first call installs anything, and an already
/// installed logger from the host process is left in place.
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::try_init();
    });
}
