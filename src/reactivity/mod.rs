//! The reactivity graph.
//!
//! Three cooperating pieces:
//! - [`dep`]: subscription brokers and the target-watcher stack
//! - [`observer`]: wrapping state so reads are tracked and writes notify
//! - [`watcher`]: subscribers that re-evaluate a getter on change
//! - [`scheduler`]: batching dirtied watchers into one flush per tick

pub mod dep;
pub mod observer;
pub mod scheduler;
pub mod watcher;

pub use dep::{pop_target, push_target, Dep};
pub use observer::{define_reactive, del, observe_root, observe_value, set, Observer};
pub use scheduler::{flush_microtasks, next_tick, queue_watcher, MAX_UPDATE_COUNT};
pub use watcher::{traverse, Watcher, WatcherOptions};
