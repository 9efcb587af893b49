// src/serve/mod.rs

//! Backend server supervision and live reload.
//!
//! - [`supervisor`] owns the server process exclusively and models its
//!   lifecycle as an explicit state machine
//!   (Stopped/Starting/Running/Crashed), serializing start/restart/
//!   shutdown through an actor mailbox.
//! - [`reload`] is the fire-and-forget notification sink for connected
//!   clients.

pub mod reload;
pub mod supervisor;

pub use reload::{BroadcastReloadNotifier, LogReloadNotifier, ReloadNotifier};
pub use supervisor::{spawn_supervisor, ServerState, SupervisorHandle, SupervisorSettings};
