// src/config/validate.rs

use anyhow::{Result, anyhow};

use crate::config::model::ConfigFile;

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - `[app].port` is non-zero
/// - `[tools].debounce_ms` is at least 1
/// - the compiler settings (`build_dir`, `main_pkg`) are non-empty
/// - tailwind, when enabled, has input/output paths
///
/// It does **not** check that the configured tool versions exist; the
/// commands themselves will fail at spawn/run time and surface that.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_app(cfg)?;
    validate_tools(cfg)?;
    Ok(())
}

fn validate_app(cfg: &ConfigFile) -> Result<()> {
    if cfg.app.port == 0 {
        return Err(anyhow!("[app].port must be non-zero"));
    }
    Ok(())
}

fn validate_tools(cfg: &ConfigFile) -> Result<()> {
    let tools = &cfg.tools;

    if tools.debounce_ms == 0 {
        return Err(anyhow!("[tools].debounce_ms must be >= 1 (got 0)"));
    }

    if tools.build_dir.is_empty() {
        return Err(anyhow!("[tools].build_dir must not be empty"));
    }

    if tools.main_pkg.is_empty() {
        return Err(anyhow!("[tools].main_pkg must not be empty"));
    }

    if tools.tailwind_enabled() {
        if tools.tailwind_input.is_empty() {
            return Err(anyhow!(
                "[tools].tailwind_input must not be empty when tailwind is enabled"
            ));
        }
        if tools.tailwind_output.is_empty() {
            return Err(anyhow!(
                "[tools].tailwind_output must not be empty when tailwind is enabled"
            ));
        }
    }

    for dir in tools.ignore_dirs.iter() {
        if dir.is_empty() {
            return Err(anyhow!("[tools].ignore_dirs must not contain empty entries"));
        }
    }

    Ok(())
}
