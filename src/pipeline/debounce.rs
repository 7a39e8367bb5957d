// src/pipeline/debounce.rs

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

/// Per-edge trigger debouncer.
///
/// Collapses bursts of triggers arriving within `window` of each other into
/// a single action, invoked once the window elapses with no further
/// triggers. The payload of the **last** trigger in a burst is the one the
/// action receives; side effects of the discarded intermediate triggers are
/// not retracted.
///
/// Created once per pipeline edge and kept for the process lifetime.
#[derive(Clone)]
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Create a debouncer running `action` on its own task.
    pub fn new<F, Fut>(window: Duration, mut action: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();

        tokio::spawn(async move {
            while let Some(first) = rx.recv().await {
                let mut latest = first;
                loop {
                    match timeout(window, rx.recv()).await {
                        // Another trigger inside the window: re-arm.
                        Ok(Some(value)) => latest = value,
                        // All handles dropped mid-burst; nothing left to do.
                        Ok(None) => return,
                        // Quiet window elapsed.
                        Err(_) => break,
                    }
                }
                action(latest).await;
            }
        });

        Self { tx }
    }

    /// Record a trigger. Never blocks.
    pub fn trigger(&self, value: T) {
        let _ = self.tx.send(value);
    }
}
