//! HTTP + WebSocket API.

mod routes;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::publisher::EventPublisher;
use crate::registry::{ConnectionRegistry, RegistryError};
use crate::relay::RelayState;

/// Shared app state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub publisher: Arc<EventPublisher>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State with an uninitialized registry; the publisher broadcasts through it.
    pub fn new(config: Arc<Config>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let publisher = Arc::new(EventPublisher::new(registry.clone()));
        Self {
            registry,
            publisher,
            config,
        }
    }

    /// Create the broadcast transport and hand it to the registry.
    /// Call once the listener is bound.
    pub fn start_relay(&self) -> Result<Arc<RelayState>, RegistryError> {
        let relay = Arc::new(if self.config.replay_last_known {
            RelayState::with_replay(
                self.config.broadcast_capacity,
                self.config.replay_max_teams,
            )
        } else {
            RelayState::new(self.config.broadcast_capacity)
        });
        self.registry.initialize(relay.clone())?;
        Ok(relay)
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api_routes())
        .route("/ws", get(routes::ws_handler))
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
