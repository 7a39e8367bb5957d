// src/proc/mod.rs

//! Managed external processes.
//!
//! - [`command`] owns the per-command lifecycle: spawn via `/bin/sh -c` in a
//!   fresh process group, line-buffered readers for both streams, restart
//!   with graceful-then-forceful escalation, and idempotent group kill.
//! - [`classify`] decides, per tool name, whether a line is user-facing
//!   output or an error.
//! - [`group`] wraps the POSIX process-group signalling primitives.

pub mod classify;
pub mod command;
pub mod group;

pub use classify::{OutputFilter, Route};
pub use command::{CommandSpec, CommandState, ManagedCommand, ProcStatus};
pub use group::{ProcessGroup, signal_pid};
