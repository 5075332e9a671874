//! Process-wide `logtest` capture.
//!
//! `logtest::Logger::start` installs the global logger and panics when called
//! twice in one test binary; this installs it once and hands out handles.

use std::sync::Once;

use logtest::Logger;

/// Returns a handle to the shared `logtest` event queue, installing the
/// global logger on first use.
pub fn capture_logs() -> Logger {
    static START: Once = Once::new();
    START.call_once(|| {
        Logger::start();
    });
    Logger
}
