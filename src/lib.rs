//! This crate provides the [Repeater], a periodic trigger which invokes a user-supplied
//! zero-argument action on a fixed interval, running on a dedicated background thread, until it
//! is explicitly stopped or dropped.
//!
//! In addition to the plain periodic behavior, the current wait can be *interrupted* from any
//! thread via [Repeater::interrupt]. An interrupt ends the current countdown immediately and
//! restarts it, with a construction-time policy deciding whether the interrupted cycle still
//! executes the action or is skipped. This is useful for patterns like "poll every 30 seconds,
//! but poll right now if something relevant just happened" without accumulating extra timers.
//!
//! The whole crate is a single small state machine around a timed, interruptible wait. There is
//! exactly one worker thread per [Repeater] instance, spawned at construction and joined when the
//! handle is dropped. Dropping the handle always stops the worker and waits for it to finish, so
//! no invocation of the action can outlive the handle.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use repeater::Repeater;
//!
//! let count = Arc::new(AtomicUsize::new(0));
//! let count_for_action = count.clone();
//! let repeater = Repeater::new(Duration::from_millis(50), false, move || {
//!     count_for_action.fetch_add(1, Ordering::SeqCst);
//! })
//! .expect("spawning the worker thread failed");
//!
//! std::thread::sleep(Duration::from_millis(120));
//! drop(repeater);
//! assert!(count.load(Ordering::SeqCst) >= 1);
//! ```
//!
//! # Notes on the action and scheduling
//!
//! The action is an opaque [FnMut] closure moved into the worker thread at construction. It is
//! always invoked on the worker thread, never on the caller's thread, and never concurrently
//! with itself. The interval measures the spacing between wait starts, not between action
//! completions, so a slow action delays subsequent cycles.
//!
//! A panicking action does not kill the periodic behavior: the worker catches the unwind,
//! reports it through the [log] facade and carries on with the next cycle. See the
//! [Repeater::new] documentation for the rationale behind this policy.
pub mod repeater;

pub use crate::repeater::Repeater;

/// Error returned when the background worker thread could not be spawned at construction.
///
/// This is the only way construction can fail; it maps directly to the operating system
/// refusing to create a thread, e.g. under resource exhaustion.
#[derive(Debug, thiserror::Error)]
#[error("failed to spawn repeater worker thread: {0}")]
pub struct SpawnError(#[from] std::io::Error);
