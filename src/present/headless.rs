// src/present/headless.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::bus::EventBus;
use crate::proc::ManagedCommand;

/// Spawn the headless presentation sink: every line the supervisor and its
/// commands produce is written to stdout/stderr with a `[source]` tag.
///
/// - `[system]` — supervisor lines from the shared output channel
/// - `[error]` — asynchronous errors from the shared error channel
/// - `[<command>]` — per-command output and error lines
///
/// Bus events are logged at debug level rather than printed.
pub fn spawn(
    bus: &EventBus,
    commands: &[Arc<ManagedCommand>],
    mut out_rx: mpsc::Receiver<String>,
    mut errors_rx: mpsc::Receiver<anyhow::Error>,
) {
    let summary = super::fleet_state(commands)
        .into_iter()
        .map(|st| st.name)
        .collect::<Vec<_>>()
        .join(", ");
    println!("[system] supervising: {summary}");

    let bus = bus.clone();
    tokio::spawn(async move {
        let mut sub = bus.subscribe().await;
        loop {
            tokio::select! {
                maybe = out_rx.recv() => match maybe {
                    Some(line) if !line.is_empty() => println!("[system] {line}"),
                    Some(_) => {}
                    None => break,
                },
                maybe = errors_rx.recv() => match maybe {
                    Some(err) => eprintln!("[error] {err:#}"),
                    None => break,
                },
                maybe = sub.next() => match maybe {
                    Some(ev) => debug!(event = %ev, "bus event"),
                    None => break,
                },
            }
        }
    });

    for cmd in commands {
        // Commands attached to another command's channels have no receivers
        // of their own.
        let (Some(mut out), Some(mut err)) = (cmd.take_output(), cmd.take_errors()) else {
            continue;
        };
        let name = cmd.name().to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe = out.recv() => match maybe {
                        Some(line) if !line.is_empty() => println!("[{name}] {line}"),
                        Some(_) => {}
                        None => {
                            println!("[{name}] output channel closed");
                            break;
                        }
                    },
                    maybe = err.recv() => match maybe {
                        Some(line) if !line.is_empty() => eprintln!("[{name}] {line}"),
                        Some(_) => {}
                        None => {
                            println!("[{name}] error channel closed");
                            break;
                        }
                    },
                }
            }
        });
    }
}
