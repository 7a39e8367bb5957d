// tests/config.rs

use std::error::Error;
use std::io::Write;

use devloop::config::{ConfigFile, load_and_validate, load_from_path, validate};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn empty_config_gets_defaults() -> TestResult {
    let cfg: ConfigFile = toml::from_str("")?;

    assert_eq!(cfg.app.port, 3000);
    assert_eq!(cfg.app.shutdown_grace_secs, 2);
    assert!(!cfg.tools.templ_enabled());
    assert!(!cfg.tools.tailwind_enabled());
    assert!(!cfg.tools.sqlc_enabled());
    assert_eq!(cfg.tools.debounce_ms, 300);
    assert_eq!(cfg.tools.build_dir, "build");
    assert!(cfg.tools.ignore_dirs.contains(&"node_modules".to_string()));

    Ok(())
}

#[test]
fn full_config_round_trips_through_loader() -> TestResult {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"
[app]
port = 8080
shutdown_grace_secs = 1

[tools]
templ = "v0.2.543"
tailwind = "3.4.1"
sqlc = "1.25.0"
open_browser = true
tailwind_input = "web/input.css"
tailwind_output = "web/style.css"
ignore_dirs = ["build", "vendor"]
debounce_ms = 150
build_dir = "out"
main_pkg = "./cmd/web"
"#
    )?;

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.app.port, 8080);
    assert!(cfg.tools.templ_enabled());
    assert_eq!(cfg.tools.tailwind_output, "web/style.css");
    assert_eq!(cfg.tools.ignore_dirs, vec!["build", "vendor"]);
    assert_eq!(cfg.tools.debounce_ms, 150);
    assert_eq!(cfg.tools.build_dir, "out");

    Ok(())
}

#[test]
fn missing_config_file_is_an_error() {
    assert!(load_from_path("/definitely/not/here/Devloop.toml").is_err());
}

#[test]
fn zero_debounce_window_fails_validation() -> TestResult {
    let mut cfg = ConfigFile::default();
    cfg.tools.debounce_ms = 0;
    assert!(validate::validate_config(&cfg).is_err());
    Ok(())
}

#[test]
fn tailwind_without_paths_fails_validation() -> TestResult {
    let mut cfg = ConfigFile::default();
    cfg.tools.tailwind = "3.4.1".to_string();
    cfg.tools.tailwind_output = String::new();
    assert!(validate::validate_config(&cfg).is_err());
    Ok(())
}
