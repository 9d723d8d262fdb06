//! Scheduler - batches dirtied watchers into one flush per tick.
//!
//! Writes queue their subscribers here; the first queued watcher in a tick
//! schedules a single flush on the microtask queue. The flush sorts by
//! watcher id, which yields the ordering guarantees the rest of the system
//! leans on: parents before children, user watchers before the same
//! instance's render watcher.
//!
//! The microtask queue itself is drained by the embedding event loop via
//! [`flush_microtasks`], once per turn of whatever loop hosts the runtime.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::instance::lifecycle::{call_activated_hook, call_updated_hook};
use crate::instance::Component;
use crate::warn::warn;

use super::watcher::Watcher;

/// A watcher re-queued more than this many times in one flush is an
/// infinite update loop.
pub const MAX_UPDATE_COUNT: u32 = 100;

thread_local! {
    static QUEUE: RefCell<Vec<Rc<Watcher>>> = const { RefCell::new(Vec::new()) };
    static HAS: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
    static CIRCULAR: RefCell<HashMap<u64, u32>> = RefCell::new(HashMap::new());
    static ACTIVATED: RefCell<Vec<Rc<Component>>> = const { RefCell::new(Vec::new()) };
    static WAITING: Cell<bool> = const { Cell::new(false) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
    static INDEX: Cell<usize> = const { Cell::new(0) };

    static PENDING_TICKS: RefCell<Vec<Box<dyn FnOnce()>>> = const { RefCell::new(Vec::new()) };
}

// =============================================================================
// Microtask queue
// =============================================================================

/// Defer a callback to the next microtask drain.
pub fn next_tick(cb: Box<dyn FnOnce()>) {
    PENDING_TICKS.with(|ticks| ticks.borrow_mut().push(cb));
}

/// Drain the microtask queue, including callbacks queued mid-drain.
///
/// The embedding loop calls this once per tick; tests call it to advance
/// the world.
pub fn flush_microtasks() {
    loop {
        let callbacks = PENDING_TICKS.with(|ticks| std::mem::take(&mut *ticks.borrow_mut()));
        if callbacks.is_empty() {
            break;
        }
        for cb in callbacks {
            cb();
        }
    }
}

// =============================================================================
// Watcher queue
// =============================================================================

/// Queue a watcher for the next flush. Duplicate ids are coalesced; a
/// watcher queued during the flush is spliced in so ascending-id order
/// still holds for the remainder.
pub fn queue_watcher(watcher: Rc<Watcher>) {
    let id = watcher.id;
    let is_new = HAS.with(|has| has.borrow_mut().insert(id));
    if !is_new {
        return;
    }
    if !FLUSHING.with(|f| f.get()) {
        QUEUE.with(|queue| queue.borrow_mut().push(watcher));
    } else {
        // Insert after the current index, at the first position whose id
        // exceeds ours.
        QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            let index = INDEX.with(|i| i.get());
            let mut at = queue.len();
            while at > index + 1 && queue[at - 1].id > id {
                at -= 1;
            }
            queue.insert(at, watcher);
        });
    }
    let needs_schedule = WAITING.with(|w| {
        if w.get() {
            false
        } else {
            w.set(true);
            true
        }
    });
    if needs_schedule {
        next_tick(Box::new(flush_scheduler_queue));
    }
}

/// Flush the queue: sort by id, run each watcher, tolerate growth, detect
/// infinite loops, then fire `updated`/`activated` callbacks in reverse
/// order and reset.
pub fn flush_scheduler_queue() {
    FLUSHING.with(|f| f.set(true));
    QUEUE.with(|queue| queue.borrow_mut().sort_by_key(|w| w.id));

    loop {
        let index = INDEX.with(|i| i.get());
        let watcher = QUEUE.with(|queue| queue.borrow().get(index).cloned());
        let Some(watcher) = watcher else { break };

        watcher.call_before();
        HAS.with(|has| has.borrow_mut().remove(&watcher.id));
        watcher.run();

        // Re-queued by its own side effects: count laps.
        let requeued = HAS.with(|has| has.borrow().contains(&watcher.id));
        if requeued {
            let over_limit = CIRCULAR.with(|circular| {
                let mut circular = circular.borrow_mut();
                let laps = circular.entry(watcher.id).or_insert(0);
                *laps += 1;
                *laps > MAX_UPDATE_COUNT
            });
            if over_limit {
                warn(if watcher.user {
                    "You may have an infinite update loop in a watcher callback"
                } else {
                    "You may have an infinite update loop in a component render function"
                });
                break;
            }
        }
        INDEX.with(|i| i.set(index + 1));
    }

    let updated: Vec<Rc<Watcher>> = QUEUE.with(|queue| queue.borrow().clone());
    let activated = ACTIVATED.with(|a| std::mem::take(&mut *a.borrow_mut()));
    reset_scheduler_state();

    // Reverse document order: children settle before their parents.
    for vm in activated.iter().rev() {
        call_activated_hook(vm);
    }
    for watcher in updated.iter().rev() {
        if watcher.is_render {
            if let Some(vm) = watcher.vm() {
                call_updated_hook(&vm);
            }
        }
    }
}

/// Queue a component whose `activated` hook should fire after the flush
/// (keep-alive style embedders push here).
pub fn queue_activated_component(vm: Rc<Component>) {
    ACTIVATED.with(|a| a.borrow_mut().push(vm));
}

fn reset_scheduler_state() {
    INDEX.with(|i| i.set(0));
    QUEUE.with(|queue| queue.borrow_mut().clear());
    HAS.with(|has| has.borrow_mut().clear());
    CIRCULAR.with(|circular| circular.borrow_mut().clear());
    WAITING.with(|w| w.set(false));
    FLUSHING.with(|f| f.set(false));
}

/// Reset all scheduler state including pending microtasks (for testing).
pub fn reset_scheduler() {
    reset_scheduler_state();
    ACTIVATED.with(|a| a.borrow_mut().clear());
    PENDING_TICKS.with(|ticks| ticks.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::observer::observe_value;
    use crate::reactivity::watcher::WatcherOptions;
    use crate::value::{obj, Value};
    use crate::warn;

    fn setup() {
        reset_scheduler();
        warn::reset_warnings();
    }

    #[test]
    fn test_writes_coalesce_into_one_flush() {
        setup();
        let state = obj([("a", Value::Num(1.0))]);
        observe_value(&state);
        let o = state.as_obj().unwrap().clone();

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let o2 = o.clone();
        let _w = Watcher::create(
            None,
            Box::new(move || o2.get("a")),
            Box::new(move |_, _| runs_clone.set(runs_clone.get() + 1)),
            WatcherOptions::default(),
            None,
            false,
        );

        o.set("a", Value::Num(2.0));
        o.set("a", Value::Num(3.0));
        o.set("a", Value::Num(4.0));
        assert_eq!(runs.get(), 0);
        flush_microtasks();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_flush_runs_in_id_order() {
        setup();
        let state = obj([("a", Value::Num(1.0))]);
        observe_value(&state);
        let o = state.as_obj().unwrap().clone();

        let order = Rc::new(RefCell::new(Vec::new()));

        let o1 = o.clone();
        let order1 = order.clone();
        let _w1 = Watcher::create(
            None,
            Box::new(move || o1.get("a")),
            Box::new(move |_, _| order1.borrow_mut().push("first")),
            WatcherOptions::default(),
            None,
            false,
        );
        let o2 = o.clone();
        let order2 = order.clone();
        let _w2 = Watcher::create(
            None,
            Box::new(move || o2.get("a")),
            Box::new(move |_, _| order2.borrow_mut().push("second")),
            WatcherOptions::default(),
            None,
            false,
        );

        o.set("a", Value::Num(2.0));
        flush_microtasks();
        assert_eq!(order.borrow().as_slice(), &["first", "second"]);
    }

    #[test]
    fn test_infinite_loop_guard_warns_once() {
        setup();
        let state = obj([("a", Value::Num(0.0))]);
        observe_value(&state);
        let o = state.as_obj().unwrap().clone();

        let o_read = o.clone();
        let o_write = o.clone();
        let _w = Watcher::create(
            None,
            Box::new(move || o_read.get("a")),
            Box::new(move |new, _| {
                // Assign to our own dependency: classic infinite loop.
                let next = new.as_num().unwrap_or(0.0) + 1.0;
                o_write.set("a", Value::Num(next));
            }),
            WatcherOptions {
                user: true,
                ..Default::default()
            },
            None,
            false,
        );

        o.set("a", Value::Num(1.0));
        flush_microtasks();
        assert_eq!(warn::warning_count_containing("infinite update loop"), 1);
    }

    #[test]
    fn test_next_tick_order() {
        setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let log1 = log.clone();
        let log2 = log.clone();
        next_tick(Box::new(move || log1.borrow_mut().push(1)));
        next_tick(Box::new(move || log2.borrow_mut().push(2)));
        flush_microtasks();
        assert_eq!(log.borrow().as_slice(), &[1, 2]);
    }
}
