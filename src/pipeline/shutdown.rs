// src/pipeline/shutdown.rs

//! Fleet shutdown path.
//!
//! SIGINT, SIGTERM, and published `stop` events all converge on the same
//! teardown: one grace sleep, then a forceful kill of every managed command
//! and its process group. The per-command graceful escalation has already
//! happened by the time `kill` runs, so this is the final sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::warn;

use crate::bus::{EventBus, EventKind, on_subscription};
use crate::proc::ManagedCommand;

/// Install interrupt handling over the whole fleet. Returns a receiver that
/// resolves after teardown completes. The stop-event listener is registered
/// before this returns.
pub async fn install(
    bus: EventBus,
    commands: Vec<Arc<ManagedCommand>>,
    grace: Duration,
    out_tx: mpsc::Sender<String>,
) -> oneshot::Receiver<()> {
    let (done_tx, done_rx) = oneshot::channel();
    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

    // A published stop event feeds the same path as an OS signal.
    let sub = bus.subscribe().await;
    tokio::spawn(on_subscription(sub, EventKind::Stop, move |_| {
        let _ = stop_tx.try_send(());
        true
    }));

    tokio::spawn(async move {
        wait_for_shutdown(&mut stop_rx).await;

        let _ = out_tx.send("received shutdown signal".to_string()).await;

        // Give the subprocesses the grace period before the sweep.
        sleep(grace).await;

        for cmd in &commands {
            cmd.kill().await;
        }

        let _ = done_tx.send(());
    });

    done_rx
}

async fn wait_for_shutdown(stop_rx: &mut mpsc::Receiver<()>) {
    match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
        (Ok(mut sigint), Ok(mut sigterm)) => {
            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
                _ = stop_rx.recv() => {}
            }
        }
        (int_res, term_res) => {
            for err in [int_res.err(), term_res.err()].into_iter().flatten() {
                warn!(error = %err, "cannot install signal handler; relying on stop events");
            }
            let _ = stop_rx.recv().await;
        }
    }
}
