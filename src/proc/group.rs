// src/proc/group.rs

//! Process-group signalling.
//!
//! Every managed command is launched with its own process group id so the
//! whole group (the shell, the tool, and anything the tool spawned) can be
//! signalled together. "Process already gone" (`ESRCH`) is success for every
//! operation here: these are best-effort teardown paths that race with
//! natural exit.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::{Pid, getpgid};

/// Capability handle for signalling one process group.
#[derive(Debug, Clone, Copy)]
pub struct ProcessGroup {
    pgid: Pid,
}

impl ProcessGroup {
    /// Resolve the process group of `pid`.
    ///
    /// Returns `Ok(None)` if the process is already gone.
    pub fn of(pid: u32) -> Result<Option<ProcessGroup>> {
        match getpgid(Some(Pid::from_raw(pid as i32))) {
            Ok(pgid) => Ok(Some(ProcessGroup { pgid })),
            Err(Errno::ESRCH) => Ok(None),
            Err(err) => {
                Err(anyhow::Error::new(err).context(format!("getting process group of pid {pid}")))
            }
        }
    }

    /// Send `sig` to the entire group.
    pub fn signal(&self, sig: Signal) -> Result<()> {
        match killpg(self.pgid, sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(err) => Err(anyhow::Error::new(err))
                .with_context(|| format!("sending {sig} to process group {}", self.pgid)),
        }
    }

    /// SIGKILL the entire group.
    pub fn force_kill(&self) -> Result<()> {
        self.signal(Signal::SIGKILL)
    }
}

/// Send `sig` directly to a single process, treating "already gone" as
/// success. Covers the case where the group lookup raced with natural exit.
pub fn signal_pid(pid: u32, sig: Signal) -> Result<()> {
    match kill(Pid::from_raw(pid as i32), sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => {
            Err(anyhow::Error::new(err)).with_context(|| format!("sending {sig} to pid {pid}"))
        }
    }
}
