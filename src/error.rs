//! Error routing for user callbacks.
//!
//! The core never lets a user error cross a hook boundary. Every user
//! function (lifecycle hook, watcher handler, computed getter, render
//! function, data factory) is invoked through
//! [`invoke_with_error_handling`], which routes failures through the
//! `errorCaptured` chain of ancestor components, then the globally
//! configured handler, then the log.

use std::rc::Rc;

use thiserror::Error;

use crate::config;
use crate::instance::Component;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    /// A user callback signalled failure.
    #[error("{0}")]
    Callback(String),

    /// A render function failed.
    #[error("render error: {0}")]
    Render(String),

    /// A watch expression could not be parsed.
    #[error("invalid watch expression: {0}")]
    Expression(String),
}

impl CoreError {
    pub fn msg(message: impl Into<String>) -> Self {
        CoreError::Callback(message.into())
    }
}

/// Route an error: walk the owner's ancestor chain looking for an
/// `errorCaptured` hook; a hook returning `Ok(false)` claims the error and
/// stops propagation. Unclaimed errors go to the global handler or the log.
pub fn handle_error(err: &CoreError, vm: Option<&Rc<Component>>, info: &str) {
    let mut cursor = vm.cloned();
    while let Some(current) = cursor {
        let hooks = current.options().error_captured.clone();
        for hook in &hooks {
            match hook(&current, err, info) {
                Ok(false) => return,
                Ok(true) => {}
                // An error inside errorCaptured is reported globally too,
                // then propagation continues with the original error.
                Err(nested) => global_handle_error(&nested, "errorCaptured hook"),
            }
        }
        cursor = current.parent();
    }
    global_handle_error(err, info);
}

fn global_handle_error(err: &CoreError, info: &str) {
    let mut handled = false;
    config::with_error_handler(|handler| {
        if let Some(handler) = handler {
            handler(err, info);
            handled = true;
        }
    });
    if !handled {
        tracing::error!(target: "spark_dom", "error in {info}: {err}");
    }
}

/// Invoke a fallible user function; on error, route it and return `None`.
pub fn invoke_with_error_handling<T>(
    vm: Option<&Rc<Component>>,
    info: &str,
    f: impl FnOnce() -> Result<T>,
) -> Option<T> {
    match f() {
        Ok(v) => Some(v),
        Err(err) => {
            handle_error(&err, vm, info);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_invoke_ok() {
        let out = invoke_with_error_handling(None, "test", || Ok(42));
        assert_eq!(out, Some(42));
    }

    #[test]
    fn test_invoke_err_goes_to_global_handler() {
        config::reset_config();
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        config::set_error_handler(Some(Rc::new(move |err, info| {
            seen_clone.borrow_mut().push(format!("{info}: {err}"));
        })));

        let out: Option<()> =
            invoke_with_error_handling(None, "unit", || Err(CoreError::msg("boom")));
        assert!(out.is_none());
        assert_eq!(seen.borrow().as_slice(), &["unit: boom".to_string()]);
        config::reset_config();
    }
}
