// src/proc/classify.rs

//! Per-tool output classification.
//!
//! A lot of tools misuse stdout and stderr, so raw stream origin is not
//! enough to tell user-facing output from actual errors. Each tool name maps
//! to a small rule set deciding, line by line, which public channel a line
//! belongs on. Downstream restart triggers and error highlighting depend on
//! this, so the rules are part of the supervisor contract, not cosmetics.
//!
//! Unrecognized tool names pass stdout/stderr through unchanged.

use regex::Regex;
use tracing::warn;

/// Which public channel a line should be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Output,
    Error,
}

#[derive(Debug, Clone)]
enum Rules {
    /// Compiler-style failure markers show up on stderr; the rest of stderr
    /// is informational.
    Templ { failure: Option<Regex> },
    /// Errors are misreported on stdout and matched by marker; stderr is
    /// genuine errors.
    Application { markers: Option<Regex> },
    /// Everything, both streams, is informational.
    Tailwind,
    Passthrough,
}

/// Line classifier for one tool name.
#[derive(Debug, Clone)]
pub struct OutputFilter {
    rules: Rules,
}

impl OutputFilter {
    /// Build the filter for a logical tool name.
    pub fn for_tool(name: &str) -> Self {
        let rules = match name {
            "templ" => Rules::Templ {
                failure: compile(r"\(✗\)"),
            },
            "application" => Rules::Application {
                markers: compile("ERROR|Failed to open tcp listener"),
            },
            "tailwind" => Rules::Tailwind,
            _ => Rules::Passthrough,
        };
        Self { rules }
    }

    /// Decide which public channel `line` belongs on.
    pub fn route(&self, line: &str, from_stderr: bool) -> Route {
        match &self.rules {
            Rules::Templ { failure } => {
                if from_stderr && matches(failure, line) {
                    Route::Error
                } else {
                    Route::Output
                }
            }
            Rules::Application { markers } => {
                if from_stderr {
                    Route::Error
                } else if matches(markers, line) {
                    Route::Error
                } else {
                    Route::Output
                }
            }
            Rules::Tailwind => Route::Output,
            Rules::Passthrough => {
                if from_stderr {
                    Route::Error
                } else {
                    Route::Output
                }
            }
        }
    }
}

fn matches(re: &Option<Regex>, line: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(line))
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(
                pattern = %pattern,
                error = %err,
                "invalid classifier pattern; passing lines through"
            );
            None
        }
    }
}
