//! Dev warning channel.
//!
//! Warnings go to `tracing` and into a thread-local record that tests can
//! inspect and reset, the same way other engine registries expose their
//! state for testing.

use std::cell::RefCell;

use crate::config;

thread_local! {
    static RECORDED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Emit a dev warning.
pub fn warn(msg: impl Into<String>) {
    let msg = msg.into();
    if !config::silent() {
        tracing::warn!(target: "spark_dom", "{msg}");
    }
    RECORDED.with(|r| r.borrow_mut().push(msg));
}

/// All warnings recorded since the last reset (for testing).
pub fn recorded_warnings() -> Vec<String> {
    RECORDED.with(|r| r.borrow().clone())
}

/// Count of recorded warnings containing `needle` (for testing).
pub fn warning_count_containing(needle: &str) -> usize {
    RECORDED.with(|r| r.borrow().iter().filter(|m| m.contains(needle)).count())
}

/// Clear the warning record (for testing).
pub fn reset_warnings() {
    RECORDED.with(|r| r.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_reset() {
        reset_warnings();
        warn("something odd");
        warn("something else");
        assert_eq!(recorded_warnings().len(), 2);
        assert_eq!(warning_count_containing("odd"), 1);
        reset_warnings();
        assert!(recorded_warnings().is_empty());
    }
}
