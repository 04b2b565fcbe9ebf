//! Event publisher: builds score/projection events and broadcasts them.

use std::sync::Arc;

use thiserror::Error;

use shared::{Delivery, ProjectionUpdatePayload, ScoreUpdatePayload};

use crate::relay::BroadcastMessage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("relay transport not initialized")]
    NotReady,
    #[error("no connected clients")]
    NoSubscribers,
    #[error("{0} must be a finite number")]
    InvalidValue(&'static str),
}

/// Anything that can fan a message out to every connected client.
/// Returns the number of receivers reached.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, msg: BroadcastMessage) -> Result<usize, PublishError>;
}

/// Publishes score and projection updates through an injected [`Broadcaster`].
#[derive(Clone)]
pub struct EventPublisher {
    broadcaster: Arc<dyn Broadcaster>,
}

impl EventPublisher {
    pub fn new(broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { broadcaster }
    }

    pub fn publish_score_update(
        &self,
        team_id: impl Into<String>,
        new_score: f64,
    ) -> Result<Delivery, PublishError> {
        ensure_finite("newScore", new_score)?;
        let timestamp = now_millis();
        let msg = BroadcastMessage::ScoreUpdate(ScoreUpdatePayload {
            team_id: team_id.into(),
            new_score,
            timestamp,
        });
        self.send(msg, timestamp)
    }

    pub fn publish_projection_update(
        &self,
        team_id: impl Into<String>,
        new_projection: f64,
    ) -> Result<Delivery, PublishError> {
        ensure_finite("newProjection", new_projection)?;
        let timestamp = now_millis();
        let msg = BroadcastMessage::ProjectionUpdate(ProjectionUpdatePayload {
            team_id: team_id.into(),
            new_projection,
            timestamp,
        });
        self.send(msg, timestamp)
    }

    fn send(&self, msg: BroadcastMessage, timestamp: i64) -> Result<Delivery, PublishError> {
        let event = msg.event_name();
        let team_id = msg.team_id().to_string();
        match self.broadcaster.broadcast(msg) {
            Ok(receivers) => {
                tracing::debug!(event, %team_id, receivers, "event broadcast");
                Ok(Delivery {
                    receivers,
                    timestamp,
                })
            }
            Err(e) => {
                tracing::error!(event, %team_id, error = %e, "event dropped");
                Err(e)
            }
        }
    }
}

/// JSON has no NaN/Infinity; serde_json would emit `null`.
fn ensure_finite(field: &'static str, value: f64) -> Result<(), PublishError> {
    if value.is_finite() {
        return Ok(());
    }
    tracing::warn!(field, %value, "rejected non-finite value");
    Err(PublishError::InvalidValue(field))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
