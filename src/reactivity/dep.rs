//! Dep - subscription broker for a single reactive quantity.
//!
//! Every reactive key and every observed container owns a `Dep`. Watchers
//! subscribe during getter evaluation via the process-global target stack;
//! writes call `notify` to wake every subscriber.
//!
//! Ownership runs one way: a watcher holds its deps strongly, a dep holds
//! its subscribers weakly. Tearing a watcher down drops the strong edges
//! and the weak back-edges are pruned on the next touch.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::config;

use super::watcher::Watcher;

thread_local! {
    static DEP_UID: Cell<u64> = const { Cell::new(0) };

    /// Stack of optional target watchers. The top is the watcher currently
    /// evaluating; `None` entries suppress dependency capture (lifecycle
    /// hooks, data factories).
    static TARGET_STACK: RefCell<Vec<Option<Rc<Watcher>>>> = const { RefCell::new(Vec::new()) };
}

// =============================================================================
// Target stack
// =============================================================================

/// Push a target watcher (or `None` to suppress capture).
pub fn push_target(watcher: Option<Rc<Watcher>>) {
    TARGET_STACK.with(|s| s.borrow_mut().push(watcher));
}

/// Pop the current target. Must balance every `push_target`.
pub fn pop_target() {
    TARGET_STACK.with(|s| {
        s.borrow_mut().pop();
    });
}

/// The watcher currently collecting dependencies, if any.
pub fn target() -> Option<Rc<Watcher>> {
    TARGET_STACK.with(|s| s.borrow().last().cloned().flatten())
}

/// Reset the target stack (for testing).
pub fn reset_target_stack() {
    TARGET_STACK.with(|s| s.borrow_mut().clear());
}

// =============================================================================
// Dep
// =============================================================================

pub struct Dep {
    pub id: u64,
    subs: RefCell<Vec<Weak<Watcher>>>,
}

impl Dep {
    pub fn new() -> Rc<Dep> {
        let id = DEP_UID.with(|uid| {
            let id = uid.get();
            uid.set(id + 1);
            id
        });
        Rc::new(Dep {
            id,
            subs: RefCell::new(Vec::new()),
        })
    }

    /// Register the current target watcher as depending on this dep.
    pub fn depend(self: &Rc<Self>) {
        if let Some(watcher) = target() {
            watcher.add_dep(self.clone());
        }
    }

    /// Add a subscriber. Callers guarantee no duplicates per
    /// `(Dep, Watcher)` pair; `Watcher::add_dep` enforces it with its id
    /// sets.
    pub fn add_sub(&self, watcher: &Rc<Watcher>) {
        self.subs.borrow_mut().push(Rc::downgrade(watcher));
    }

    /// Remove a subscriber by watcher id. Dead weak refs are pruned along
    /// the way.
    pub fn remove_sub(&self, watcher_id: u64) {
        self.subs.borrow_mut().retain(|weak| match weak.upgrade() {
            Some(w) => w.id != watcher_id,
            None => false,
        });
    }

    /// Wake every subscriber.
    ///
    /// Takes a snapshot first so subscriber mutation during iteration is
    /// tolerated. With dev warnings on, the snapshot is sorted by id so
    /// sync watchers fire in the same order the scheduler would use;
    /// production skips the sort.
    pub fn notify(&self) {
        let mut snapshot: Vec<Rc<Watcher>> = self
            .subs
            .borrow()
            .iter()
            .filter_map(|weak| weak.upgrade())
            .collect();
        if config::dev_warnings() {
            snapshot.sort_by_key(|w| w.id);
        }
        for watcher in snapshot {
            watcher.update();
        }
    }

    /// Live subscriber count (for testing and invariant checks).
    pub fn sub_count(&self) -> usize {
        self.subs
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether the given watcher id is subscribed (for testing).
    pub fn has_sub(&self, watcher_id: u64) -> bool {
        self.subs
            .borrow()
            .iter()
            .any(|weak| weak.upgrade().is_some_and(|w| w.id == watcher_id))
    }
}

/// Reset the dep id counter (for testing).
pub fn reset_dep_uid() {
    DEP_UID.with(|uid| uid.set(0));
}
