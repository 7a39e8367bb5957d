// src/pipeline/triggers.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled glob patterns for one pipeline edge.
///
/// The watcher publishes absolute paths, so edge patterns are written in
/// `**/`-prefixed form (e.g. `**/*.templ`, `**/sqlc.yaml`) and matched
/// against the full changed path.
#[derive(Clone)]
pub struct EdgeTrigger {
    set: GlobSet,
}

impl fmt::Debug for EdgeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeTrigger").finish_non_exhaustive()
    }
}

impl EdgeTrigger {
    /// Compile a set of glob patterns into one edge trigger.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
            builder.add(glob);
        }
        let set = builder.build().context("building edge trigger globset")?;
        Ok(Self { set })
    }

    /// True if the changed path should fire this edge.
    pub fn matches(&self, path: &str) -> bool {
        self.set.is_match(path)
    }
}
