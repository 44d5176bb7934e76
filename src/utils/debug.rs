//! Debug log sink.
//!
//! Debug output is switched on and off at runtime by the `isDebug` flag of the
//! app settings document. Warnings and errors are never gated.

use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_MODE: AtomicBool = AtomicBool::new(false);

/// Switches debug output. Returns the previous mode.
pub fn set_debug_mode(enabled: bool) -> bool {
    let previous = DEBUG_MODE.swap(enabled, Ordering::Relaxed);
    if previous != enabled {
        log::info!(
            "🐛 Debug mode is now {}",
            if enabled { "ENABLED" } else { "DISABLED" }
        );
    }
    previous
}

pub fn is_debug_mode() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

/// Logs at info level with a `[DEBUG]` prefix, only while debug mode is on.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)+) => {
        if $crate::utils::debug::is_debug_mode() {
            log::info!("[DEBUG] {}", format_args!($($arg)+));
        }
    };
}
