// src/bus/event.rs

use std::fmt;

/// The kind of an [`Event`].
///
/// Payload semantics depend on the kind: a file path for `FileChanged`, a
/// command name for `CommandDone` and `Restart` (empty = all commands), a
/// message for `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FileChanged,
    Restart,
    Refresh,
    Stop,
    CommandDone,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::FileChanged => "file_changed",
            EventKind::Restart => "restart",
            EventKind::Refresh => "refresh",
            EventKind::Stop => "stop",
            EventKind::CommandDone => "command_done",
            EventKind::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single published event. Immutable once published; events have no
/// identity beyond their content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub payload: String,
}

impl Event {
    pub fn file_changed(path: impl Into<String>) -> Self {
        Self {
            kind: EventKind::FileChanged,
            payload: path.into(),
        }
    }

    /// Ask for a restart of the named command; an empty name restarts every
    /// command.
    pub fn restart(name: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Restart,
            payload: name.into(),
        }
    }

    pub fn refresh() -> Self {
        Self {
            kind: EventKind::Refresh,
            payload: String::new(),
        }
    }

    pub fn stop() -> Self {
        Self {
            kind: EventKind::Stop,
            payload: String::new(),
        }
    }

    pub fn command_done(name: impl Into<String>) -> Self {
        Self {
            kind: EventKind::CommandDone,
            payload: name.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            payload: message.into(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.payload)
    }
}
