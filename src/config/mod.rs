// src/config/mod.rs

//! Configuration loading and validation.
//!
//! The config surface is consumed read-only by the supervisor: tool version
//! strings (empty = disabled), template/stylesheet paths, ignored
//! directories, the debounce window, and the shutdown grace period.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{AppSection, ConfigFile, ToolsSection};
