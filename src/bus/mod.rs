// src/bus/mod.rs

//! The process-wide publish/subscribe event bus.
//!
//! Producers (file watcher, managed commands, orchestrator) publish typed
//! [`Event`]s; any number of dynamically registered listeners receive every
//! event published after their subscription, in publication order.
//!
//! A single broadcast task owns the listener registry and forwards each
//! event to every listener in turn. The registry is append-only: there is no
//! unsubscribe, listeners either live for the process lifetime or stop
//! reading (the broadcast task skips closed channels). A listener that stays
//! alive but never reads will stall delivery to subsequent listeners once
//! its buffer fills; this is a known limitation of the sequential broadcast
//! design, kept as-is rather than papered over with timeouts.

pub mod event;

pub use event::{Event, EventKind};

use tokio::sync::mpsc;
use tracing::debug;

enum BusMessage {
    Publish(Event),
    Register(mpsc::Sender<Event>),
}

/// Handle to the event bus. Cheap to clone; all clones feed the same
/// broadcast task.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<BusMessage>,
}

/// A registered listener. Receives every event published after the
/// subscription was created; no replay of past events.
pub struct Subscription {
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event, or `None` once the bus has shut down.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl EventBus {
    /// Create a new bus and spawn its broadcast task.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::channel::<BusMessage>(64);

        tokio::spawn(async move {
            let mut listeners: Vec<mpsc::Sender<Event>> = Vec::new();
            while let Some(msg) = rx.recv().await {
                match msg {
                    BusMessage::Register(listener) => listeners.push(listener),
                    BusMessage::Publish(event) => {
                        for listener in &listeners {
                            // Delivery is sequential per event; a dropped
                            // listener is skipped, a slow one blocks here.
                            let _ = listener.send(event.clone()).await;
                        }
                    }
                }
            }
            debug!("event bus broadcast task ended");
        });

        Self { tx }
    }

    /// Publish an event. Never blocks beyond handing the event to the
    /// broadcast task.
    pub async fn publish(&self, event: Event) {
        let _ = self.tx.send(BusMessage::Publish(event)).await;
    }

    /// Register a new listener and return its subscription.
    pub async fn subscribe(&self) -> Subscription {
        let (listener_tx, listener_rx) = mpsc::channel(1);
        let _ = self.tx.send(BusMessage::Register(listener_tx)).await;
        Subscription { rx: listener_rx }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Invoke `f` for every event of the specified kind.
///
/// If `f` returns `false`, the handler stops and its subscription is
/// dropped. This runs on the current task; wrap in `tokio::spawn` to react
/// in the background.
pub async fn on_event<F>(bus: EventBus, kind: EventKind, f: F)
where
    F: FnMut(Event) -> bool + Send + 'static,
{
    let sub = bus.subscribe().await;
    on_subscription(sub, kind, f).await;
}

/// Like [`on_event`], but over an already-created subscription.
///
/// Subscribing first and then spawning this loop guarantees the listener is
/// registered before any event published afterwards, since registrations
/// and publishes flow through the same broadcast channel in order.
pub async fn on_subscription<F>(mut sub: Subscription, kind: EventKind, mut f: F)
where
    F: FnMut(Event) -> bool + Send + 'static,
{
    while let Some(event) = sub.next().await {
        if event.kind == kind && !f(event) {
            return;
        }
    }
}
