// Client registry and broadcaster

use super::gate::DemandGate;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// One serialized batch, shared by every client it is sent to.
pub type Batch = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Connected dashboard clients. Registering the first client opens the demand gate;
/// unregistering the last closes it.
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, mpsc::Sender<Batch>>>,
    next_id: AtomicU64,
    gate: DemandGate,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            gate: DemandGate::new(),
        }
    }

    pub fn gate(&self) -> &DemandGate {
        &self.gate
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, mpsc::Sender<Batch>>> {
        // Map stays consistent even if a holder panicked.
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, sender: mpsc::Sender<Batch>) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut clients = self.lock();
        clients.insert(id, sender);
        if clients.len() == 1 {
            self.gate.open();
            debug!(client = %id, "first client registered, demand gate open");
        }
        id
    }

    /// Removing an unknown id is a no-op.
    pub fn unregister(&self, id: ClientId) {
        let mut clients = self.lock();
        if clients.remove(&id).is_some() && clients.is_empty() {
            self.gate.close();
            debug!(client = %id, "last client unregistered, demand gate closed");
        }
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Queue `message` for every registered client without waiting on any of them.
    /// Returns how many clients accepted it.
    pub fn broadcast(&self, message: Batch) -> usize {
        let clients = self.lock();
        let mut delivered = 0;
        for (id, sender) in clients.iter() {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(client = %id, operation = "broadcast", "client queue full, batch dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(client = %id, operation = "broadcast", "client channel closed");
                }
            }
        }
        delivered
    }
}
