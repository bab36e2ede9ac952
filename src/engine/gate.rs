// Demand gate: parks the orchestrator while no client is connected

use tokio::sync::watch;

/// Open while at least one client is registered. Only the client registry flips it.
pub struct DemandGate {
    tx: watch::Sender<bool>,
}

impl Default for DemandGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DemandGate {
    /// Starts closed.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves immediately if open, otherwise once the gate opens.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|open| *open).await;
    }

    pub(crate) fn open(&self) {
        self.set(true);
    }

    pub(crate) fn close(&self) {
        self.set(false);
    }

    fn set(&self, open: bool) {
        self.tx.send_if_modified(|state| {
            if *state == open {
                false
            } else {
                *state = open;
                true
            }
        });
    }
}
