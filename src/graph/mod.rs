// src/graph/mod.rs

//! Task graph representation and execution.
//!
//! - [`node`] defines the immutable [`TaskNode`] tree and its
//!   `leaf` / `series` / `parallel` constructors.
//! - [`record`] holds the ephemeral per-run status record.
//! - [`scheduler`] executes a node tree to completion with
//!   series/parallel semantics and first-error reporting.

pub mod node;
pub mod record;
pub mod scheduler;

pub use node::{leaf, parallel, series, Mode, NodeKind, TaskNode};
pub use record::{RunRecord, TaskStatus};
pub use scheduler::Scheduler;
