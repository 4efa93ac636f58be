#![forbid(unsafe_code)]

//! `tracing` subscriber setup.
//!
//! The engine only emits `tracing` spans and events. Applications that do
//! not install their own subscriber can use [`init`]:
//!
//! - `action.resolve` (debug) wraps each resolution, with per-core `trace!`
//! - semaphore grants, queueing and releases log at debug
//! - `undo.execute`, `undo.undo` and `undo.redo` (info) wrap history
//!   operations; failed command effects log at warn

use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn,lmenu_actions=info,lmenu_runtime=info";

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `filter`. Returns `false` if a global
/// subscriber was already installed.
pub fn init(filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}

/// [`init`] with [`DEFAULT_FILTER`].
pub fn init_default() -> bool {
    init(DEFAULT_FILTER)
}

/// Subscriber for tests: output goes through the test harness capture.
pub fn init_for_tests(filter: &str) -> bool {
    fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init()
        .is_ok()
}
