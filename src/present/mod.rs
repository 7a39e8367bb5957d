// src/present/mod.rs

//! Presentation boundary.
//!
//! The supervisor core only produces tagged text lines and per-command
//! state; what renders them is a consumer choice. This module ships the
//! headless sink (plain stdout/stderr); an interactive front-end consumes
//! the same channels and [`crate::proc::CommandState`] snapshots through
//! the library API. The core behaves identically either way.

pub mod headless;

use std::sync::Arc;

use crate::proc::{CommandState, ManagedCommand};

/// Snapshot the externally visible state of every command, in pipeline
/// order. Front-ends use this for tab lists and status markers.
pub fn fleet_state(commands: &[Arc<ManagedCommand>]) -> Vec<CommandState> {
    commands.iter().map(|cmd| cmd.state()).collect()
}
