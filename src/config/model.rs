// src/config/model.rs

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [app]
/// port = 3000
/// shutdown_grace_secs = 2
///
/// [tools]
/// templ = "v0.2.543"
/// tailwind = "3.4.1"
/// sqlc = ""
/// tailwind_input = "assets/css/input.css"
/// tailwind_output = "assets/css/style.css"
/// ignore_dirs = ["build", "node_modules", ".git"]
/// debounce_ms = 300
/// ```
///
/// All sections are optional and have reasonable defaults. An empty version
/// string disables the corresponding tool.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    /// Application-level settings from `[app]`.
    #[serde(default)]
    pub app: AppSection,

    /// Build-tool settings from `[tools]`.
    #[serde(default)]
    pub tools: ToolsSection,
}

/// `[app]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// Port the supervised application listens on; forwarded to the templ
    /// proxy command line.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Grace period, in seconds, between a graceful-terminate request and a
    /// forceful kill. Also the sleep between kill retries during restart.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_grace_secs() -> u64 {
    2
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// `[tools]` section.
///
/// Version strings gate each optional tool: an empty string means the tool
/// is disabled and no command is created for it.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// templ version, e.g. `"v0.2.543"`. Empty = disabled.
    #[serde(default)]
    pub templ: String,

    /// tailwindcss version, e.g. `"3.4.1"`. Empty = disabled.
    #[serde(default)]
    pub tailwind: String,

    /// sqlc version, e.g. `"1.25.0"`. Empty = disabled.
    #[serde(default)]
    pub sqlc: String,

    /// Whether the templ proxy should open a browser tab on startup.
    #[serde(default)]
    pub open_browser: bool,

    /// Input stylesheet for the tailwind compiler.
    #[serde(default = "default_tailwind_input")]
    pub tailwind_input: String,

    /// Output stylesheet written by the tailwind compiler. Changes to this
    /// file trigger a templ proxy notification.
    #[serde(default = "default_tailwind_output")]
    pub tailwind_output: String,

    /// Directories (relative to the project root) that the file watcher
    /// skips entirely.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Debounce window in milliseconds shared by all pipeline edges.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Directory the compiler writes the application binary into.
    #[serde(default = "default_build_dir")]
    pub build_dir: String,

    /// Package path handed to the compiler.
    #[serde(default = "default_main_pkg")]
    pub main_pkg: String,
}

fn default_tailwind_input() -> String {
    "assets/css/input.css".to_string()
}

fn default_tailwind_output() -> String {
    "assets/css/style.css".to_string()
}

fn default_ignore_dirs() -> Vec<String> {
    vec![
        "build".to_string(),
        "node_modules".to_string(),
        ".git".to_string(),
    ]
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_build_dir() -> String {
    "build".to_string()
}

fn default_main_pkg() -> String {
    "./cmd/server".to_string()
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            templ: String::new(),
            tailwind: String::new(),
            sqlc: String::new(),
            open_browser: false,
            tailwind_input: default_tailwind_input(),
            tailwind_output: default_tailwind_output(),
            ignore_dirs: default_ignore_dirs(),
            debounce_ms: default_debounce_ms(),
            build_dir: default_build_dir(),
            main_pkg: default_main_pkg(),
        }
    }
}

impl ToolsSection {
    /// Whether the templ proxy is enabled.
    pub fn templ_enabled(&self) -> bool {
        !self.templ.is_empty()
    }

    /// Whether the tailwind compiler is enabled.
    pub fn tailwind_enabled(&self) -> bool {
        !self.tailwind.is_empty()
    }

    /// Whether the sqlc generator is enabled.
    pub fn sqlc_enabled(&self) -> bool {
        !self.sqlc.is_empty()
    }
}
