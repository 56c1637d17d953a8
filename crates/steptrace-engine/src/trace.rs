//! Dispatch trace helpers.

use std::sync::OnceLock;

pub(crate) fn trace_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("STEPTRACE_TRACE").is_some())
}

pub(crate) fn trace_dispatch(message: &str) {
    if trace_enabled() {
        eprintln!("[steptrace-engine][dispatch] {message}");
    }
}
