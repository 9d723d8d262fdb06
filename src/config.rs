//! Runtime configuration.
//!
//! Thread-local settings with `set_*`/getter pairs and a reset hook for
//! tests. Dev warnings are on by default; embedders that have finished
//! integrating can turn them off, which also lets `Dep::notify` skip its
//! deterministic subscriber sort.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::CoreError;

/// Global error sink invoked when no `errorCaptured` hook claims an error.
pub type ErrorHandler = Rc<dyn Fn(&CoreError, &str)>;

thread_local! {
    /// Suppress all warning output (recording still happens).
    static SILENT: Cell<bool> = const { Cell::new(false) };

    /// Dev-mode assertions and deterministic notify ordering.
    static DEV_WARNINGS: Cell<bool> = const { Cell::new(true) };

    /// Optional global error handler.
    static ERROR_HANDLER: RefCell<Option<ErrorHandler>> = const { RefCell::new(None) };
}

/// Suppress warning output.
pub fn set_silent(silent: bool) {
    SILENT.with(|s| s.set(silent));
}

pub fn silent() -> bool {
    SILENT.with(|s| s.get())
}

/// Enable or disable dev-mode warnings and ordering checks.
pub fn set_dev_warnings(enabled: bool) {
    DEV_WARNINGS.with(|d| d.set(enabled));
}

pub fn dev_warnings() -> bool {
    DEV_WARNINGS.with(|d| d.get())
}

/// Install a global error handler. Errors that no `errorCaptured` hook
/// claims end up here instead of the log.
pub fn set_error_handler(handler: Option<ErrorHandler>) {
    ERROR_HANDLER.with(|h| *h.borrow_mut() = handler);
}

pub fn with_error_handler(f: impl FnOnce(Option<&ErrorHandler>)) {
    ERROR_HANDLER.with(|h| f(h.borrow().as_ref()));
}

/// Reset all config state (for testing).
pub fn reset_config() {
    SILENT.with(|s| s.set(false));
    DEV_WARNINGS.with(|d| d.set(true));
    ERROR_HANDLER.with(|h| *h.borrow_mut() = None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        reset_config();
        assert!(!silent());
        assert!(dev_warnings());
    }

    #[test]
    fn test_toggle() {
        reset_config();
        set_silent(true);
        set_dev_warnings(false);
        assert!(silent());
        assert!(!dev_warnings());
        reset_config();
        assert!(!silent());
    }
}
