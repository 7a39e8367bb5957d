// src/pipeline/orchestrator.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::bus::{EventBus, EventKind, on_subscription};
use crate::config::ConfigFile;
use crate::pipeline::debounce::Debouncer;
use crate::pipeline::shutdown;
use crate::pipeline::triggers::EdgeTrigger;
use crate::proc::{CommandSpec, ManagedCommand};
use crate::watch::{WatcherHandle, spawn_watcher};

/// The concrete build pipeline: zero or more optional tool commands, the
/// compiler, and the application, wired together through debounced
/// event-bus edges.
///
/// The dependency structure is fixed: file changes feed the optional tools
/// and the compiler; the application restarts only after the compiler
/// reports completion, or directly on its own config/env changes.
pub struct Pipeline {
    commands: Vec<Arc<ManagedCommand>>,
    bus: EventBus,
    out_tx: mpsc::Sender<String>,
    grace: Duration,
    _watcher: WatcherHandle,
}

impl Pipeline {
    /// Construct every configured command and subscribe the rebuild/restart
    /// edges. Also starts the file watcher over `root`. Every edge listener
    /// is registered before this returns, so events published afterwards
    /// cannot be missed. Nothing is executed yet; call [`Pipeline::start`].
    pub async fn build(
        root: impl AsRef<Path>,
        cfg: &ConfigFile,
        bus: &EventBus,
        errors_tx: mpsc::Sender<anyhow::Error>,
        out_tx: mpsc::Sender<String>,
    ) -> Result<Pipeline> {
        let window = Duration::from_millis(cfg.tools.debounce_ms);
        let grace = Duration::from_secs(cfg.app.shutdown_grace_secs);

        let watcher = spawn_watcher(root.as_ref(), &cfg.tools.ignore_dirs, bus.clone())
            .context("cannot create file watcher")?;

        let mut commands: Vec<Arc<ManagedCommand>> = Vec::new();

        // templ runs its own watch loop and spawns subprocesses, so it is
        // created as a long-running group-kill command.
        let templ = if cfg.tools.templ_enabled() {
            let templ = ManagedCommand::new(
                CommandSpec {
                    name: "templ".to_string(),
                    full_command: format!(
                        "go run github.com/a-h/templ/cmd/templ@{} generate --watch --proxy=\"http://127.0.0.1:{}\" --open-browser={}",
                        cfg.tools.templ, cfg.app.port, cfg.tools.open_browser
                    ),
                    requires_group_kill: true,
                    run_at_start: true,
                },
                bus.clone(),
                errors_tx.clone(),
                grace,
            );

            // Notify the templ proxy whenever the compiled stylesheet lands.
            let notify_command = format!(
                "go run github.com/a-h/templ/cmd/templ@{} generate --notify-proxy",
                cfg.tools.templ
            );
            let debouncer = {
                let templ = Arc::clone(&templ);
                Debouncer::new(window, move |message: String| {
                    let templ = Arc::clone(&templ);
                    let notify_command = notify_command.clone();
                    async move {
                        templ.output_line(message).await;
                        if let Err(err) = notify_proxy(&templ, notify_command).await {
                            templ.error_line(err.to_string()).await;
                        }
                    }
                })
            };
            let stylesheet = EdgeTrigger::new(&[format!("**/{}", cfg.tools.tailwind_output)])?;
            let sub = bus.subscribe().await;
            tokio::spawn(on_subscription(sub, EventKind::FileChanged, move |ev| {
                if stylesheet.matches(&ev.payload) {
                    debouncer.trigger("stylesheet changed, notifying proxy".to_string());
                }
                true
            }));

            commands.push(Arc::clone(&templ));
            Some(templ)
        } else {
            debug!("templ disabled in config");
            None
        };

        if cfg.tools.tailwind_enabled() {
            let tailwind = ManagedCommand::new(
                CommandSpec {
                    name: "tailwind".to_string(),
                    full_command: format!(
                        "npx tailwindcss@{} -i {} -o {}",
                        cfg.tools.tailwind, cfg.tools.tailwind_input, cfg.tools.tailwind_output
                    ),
                    requires_group_kill: false,
                    run_at_start: true,
                },
                bus.clone(),
                errors_tx.clone(),
                grace,
            );

            let debouncer = restart_debouncer(&tailwind, window);
            let templ_sources = EdgeTrigger::new(&["**/*.templ".to_string()])?;
            let tailwind_config = EdgeTrigger::new(&["**/tailwind.config*".to_string()])?;
            let sub = bus.subscribe().await;
            tokio::spawn(on_subscription(sub, EventKind::FileChanged, move |ev| {
                if templ_sources.matches(&ev.payload) {
                    debouncer.trigger("templ file change detected, rerunning command".to_string());
                } else if tailwind_config.matches(&ev.payload) {
                    debouncer
                        .trigger("tailwind configuration changed, rerunning command".to_string());
                }
                true
            }));

            commands.push(tailwind);
        } else {
            debug!("tailwind disabled in config");
        }

        if cfg.tools.sqlc_enabled() {
            let sqlc = ManagedCommand::new(
                CommandSpec {
                    name: "sqlc".to_string(),
                    full_command: format!(
                        "go run github.com/sqlc-dev/sqlc/cmd/sqlc@{} generate",
                        cfg.tools.sqlc
                    ),
                    requires_group_kill: false,
                    run_at_start: true,
                },
                bus.clone(),
                errors_tx.clone(),
                grace,
            );

            let debouncer = restart_debouncer(&sqlc, window);
            let sql_sources = EdgeTrigger::new(&["**/*.sql".to_string()])?;
            let sqlc_config = EdgeTrigger::new(&["**/sqlc.yaml".to_string()])?;
            let sub = bus.subscribe().await;
            tokio::spawn(on_subscription(sub, EventKind::FileChanged, move |ev| {
                if sql_sources.matches(&ev.payload) {
                    debouncer.trigger("SQL file change detected, rerunning command".to_string());
                } else if sqlc_config.matches(&ev.payload) {
                    debouncer.trigger("sqlc configuration changed, rerunning command".to_string());
                }
                true
            }));

            commands.push(sqlc);
        } else {
            debug!("sqlc disabled in config");
        }

        // The compiler always exists. When templ is running, its notify
        // cycle triggers the first build, so only auto-start without it.
        let compiler = ManagedCommand::new(
            CommandSpec {
                name: "go".to_string(),
                full_command: format!(
                    "go build -o {}/main {}",
                    cfg.tools.build_dir, cfg.tools.main_pkg
                ),
                requires_group_kill: false,
                run_at_start: templ.is_none(),
            },
            bus.clone(),
            errors_tx.clone(),
            grace,
        );
        {
            let debouncer = restart_debouncer(&compiler, window);
            let go_sources = EdgeTrigger::new(&["**/*.go".to_string()])?;
            let sub = bus.subscribe().await;
            tokio::spawn(on_subscription(sub, EventKind::FileChanged, move |ev| {
                if go_sources.matches(&ev.payload) {
                    debouncer.trigger("go file change detected, rerunning command".to_string());
                }
                true
            }));
        }
        commands.push(compiler);

        // The application never auto-starts; it waits for the first
        // successful compile.
        let application = ManagedCommand::new(
            CommandSpec {
                name: "application".to_string(),
                full_command: format!("{}/main", cfg.tools.build_dir),
                requires_group_kill: true,
                run_at_start: false,
            },
            bus.clone(),
            errors_tx.clone(),
            grace,
        );
        let app_debouncer = restart_debouncer(&application, window);
        {
            let debouncer = app_debouncer.clone();
            let sub = bus.subscribe().await;
            tokio::spawn(on_subscription(sub, EventKind::CommandDone, move |ev| {
                if ev.payload == "go" {
                    debouncer.trigger("application rebuilt, restarting".to_string());
                }
                true
            }));
        }
        {
            let app_config =
                EdgeTrigger::new(&["**/config.toml".to_string(), "**/.env".to_string()])?;
            let sub = bus.subscribe().await;
            tokio::spawn(on_subscription(sub, EventKind::FileChanged, move |ev| {
                if app_config.matches(&ev.payload) {
                    app_debouncer.trigger("configuration changed, restarting".to_string());
                }
                true
            }));
        }
        commands.push(application);

        // Restart events from the presentation layer: a named command, or
        // every command when the payload is empty.
        {
            let fleet = commands.clone();
            let sub = bus.subscribe().await;
            tokio::spawn(on_subscription(sub, EventKind::Restart, move |ev| {
                for cmd in fleet.iter() {
                    if !ev.payload.is_empty() && cmd.name() != ev.payload {
                        continue;
                    }
                    let cmd = Arc::clone(cmd);
                    tokio::spawn(async move {
                        if let Err(err) = cmd.restart().await {
                            cmd.error_line(err.to_string()).await;
                        }
                    });
                }
                true
            }));
        }

        Ok(Pipeline {
            commands,
            bus: bus.clone(),
            out_tx,
            grace,
            _watcher: watcher,
        })
    }

    /// All managed commands, in pipeline order.
    pub fn commands(&self) -> &[Arc<ManagedCommand>] {
        &self.commands
    }

    /// Look up a command by logical name.
    pub fn command(&self, name: &str) -> Option<&Arc<ManagedCommand>> {
        self.commands.iter().find(|cmd| cmd.name() == name)
    }

    /// Launch every command flagged run-at-start and install the shutdown
    /// path. The returned receiver resolves once the fleet has been torn
    /// down after an interrupt or a published `stop` event.
    pub async fn start(&self) -> crate::errors::Result<oneshot::Receiver<()>> {
        for cmd in &self.commands {
            if !cmd.run_at_start() {
                continue;
            }
            cmd.start().await?;
        }

        Ok(shutdown::install(
            self.bus.clone(),
            self.commands.clone(),
            self.grace,
            self.out_tx.clone(),
        )
        .await)
    }
}

/// Debouncer whose action reruns `cmd`, reporting restart failures on the
/// command's own error channel.
fn restart_debouncer(cmd: &Arc<ManagedCommand>, window: Duration) -> Debouncer<String> {
    let cmd = Arc::clone(cmd);
    Debouncer::new(window, move |message: String| {
        let cmd = Arc::clone(&cmd);
        async move {
            cmd.output_line(message).await;
            if let Err(err) = cmd.restart().await {
                cmd.error_line(err.to_string()).await;
            }
        }
    })
}

/// Run the one-shot proxy notification, piping its output into the templ
/// command's channels.
async fn notify_proxy(
    templ: &Arc<ManagedCommand>,
    full_command: String,
) -> crate::errors::Result<()> {
    let notify = ManagedCommand::attached_to(
        CommandSpec {
            name: "notify".to_string(),
            full_command,
            requires_group_kill: false,
            run_at_start: false,
        },
        templ,
    );
    templ.output_line("notifying templ of stylesheet change").await;
    notify.start().await
}
