// src/serve/reload.rs

use tokio::sync::broadcast;
use tracing::{debug, info};

/// Fire-and-forget live-reload sink. The supervisor calls this after a
/// successful restart (plus settle delay); `serve` calls it directly
/// for rebuilds that don't touch the server.
pub trait ReloadNotifier: Send + Sync {
    fn clients_changed(&self);
}

/// Fallback notifier that only logs.
#[derive(Debug, Default)]
pub struct LogReloadNotifier;

impl ReloadNotifier for LogReloadNotifier {
    fn clients_changed(&self) {
        info!("live-reload: clients notified");
    }
}

/// Broadcast-channel notifier. The live-reload transport (whatever
/// pushes the signal to browsers) subscribes; with no subscribers the
/// signal is simply dropped.
#[derive(Debug)]
pub struct BroadcastReloadNotifier {
    tx: broadcast::Sender<()>,
}

impl BroadcastReloadNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl ReloadNotifier for BroadcastReloadNotifier {
    fn clients_changed(&self) {
        let subscribers = self.tx.send(()).unwrap_or(0);
        debug!(subscribers, "live-reload notification sent");
    }
}
