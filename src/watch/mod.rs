// src/watch/mod.rs

//! Debounced per-target filesystem watching.
//!
//! - [`session`] is the pure debounce state machine: it turns file
//!   events, timer expiry and rebuild completion into effects, and is
//!   unit-testable without timers or a filesystem.
//! - [`watcher`] is the IO shell: it wires `notify` into the session
//!   loop, runs rebuilds through the scheduler, and enforces the
//!   single-rebuild-in-flight invariant per target.

pub mod session;
pub mod watcher;

pub use session::{SessionEffect, WatchSession};
pub use watcher::{arm, RebuildOutcome, WatchHandle};
