// src/watch/mod.rs

//! File watching.
//!
//! Turns filesystem writes under the project root into `file_changed`
//! events on the bus. The watcher registers directories recursively at
//! startup, skipping the configured ignore-directories outright; it does
//! not pick up directories created afterwards (known limitation, kept to
//! avoid unbounded watch-handle growth).

pub mod watcher;

pub use watcher::{WatcherHandle, spawn_watcher};
