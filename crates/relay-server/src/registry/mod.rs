//! Connection registry: holds the transport handle once the server is listening
//! and logs client connects/disconnects.

use std::sync::{Arc, OnceLock};

use thiserror::Error;
use uuid::Uuid;

use crate::publisher::{Broadcaster, PublishError};
use crate::relay::{BroadcastMessage, RelayState};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("connection registry already initialized")]
    AlreadyInitialized,
}

/// Write-once holder of the active [`RelayState`].
#[derive(Default)]
pub struct ConnectionRegistry {
    handle: OnceLock<Arc<RelayState>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the transport handle. Called once at startup; later calls are rejected.
    pub fn initialize(&self, handle: Arc<RelayState>) -> Result<(), RegistryError> {
        self.handle
            .set(handle)
            .map_err(|_| RegistryError::AlreadyInitialized)?;
        tracing::info!("connection registry initialized");
        Ok(())
    }

    /// The stored handle, or `None` before [`initialize`](Self::initialize).
    pub fn handle(&self) -> Option<Arc<RelayState>> {
        self.handle.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn connected_clients(&self) -> usize {
        self.handle.get().map_or(0, |h| h.subscriber_count())
    }

    pub fn client_connected(&self, conn_id: Uuid) {
        tracing::info!(%conn_id, clients = self.connected_clients(), "client connected");
    }

    pub fn client_disconnected(&self, conn_id: Uuid) {
        tracing::info!(%conn_id, clients = self.connected_clients(), "client disconnected");
    }
}

impl Broadcaster for ConnectionRegistry {
    fn broadcast(&self, msg: BroadcastMessage) -> Result<usize, PublishError> {
        match self.handle.get() {
            Some(handle) => handle.broadcast(msg),
            None => Err(PublishError::NotReady),
        }
    }
}
