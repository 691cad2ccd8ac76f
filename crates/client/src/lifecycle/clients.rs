//! Registry of open clients and the generation controlling each.

use std::collections::HashMap;

use tokio::sync::RwLock;

/// Open client contexts keyed by client id.
///
/// A client with no controller is not intercepted; its requests go straight
/// to the network.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Option<String>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, optionally already controlled by `controller`.
    pub async fn connect(&self, id: &str, controller: Option<&str>) {
        let mut clients = self.clients.write().await;
        clients.insert(id.to_string(), controller.map(str::to_string));
    }

    /// Forget a client. Returns how many clients remain open.
    pub async fn release(&self, id: &str) -> usize {
        let mut clients = self.clients.write().await;
        clients.remove(id);
        clients.len()
    }

    /// Make `generation` the controller of every open client.
    ///
    /// Returns the number of clients whose controller changed.
    pub async fn claim(&self, generation: &str) -> usize {
        let mut clients = self.clients.write().await;
        let mut claimed = 0;
        for controller in clients.values_mut() {
            if controller.as_deref() != Some(generation) {
                *controller = Some(generation.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    /// Generation controlling a client, if the client is known and controlled.
    pub async fn controller(&self, id: &str) -> Option<String> {
        self.clients.read().await.get(id).cloned().flatten()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
