//! Shared wire and domain models.

use serde::{Deserialize, Serialize};

/// Current socket envelope version.
pub const WS_PROTOCOL_VERSION: u8 = 1;

// --- WebSocket envelope ---

/// WebSocket message envelope (version 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEnvelope {
    #[serde(default)]
    pub version: u8,
    pub r#type: String,
    pub payload: serde_json::Value,
}

/// WebSocket event names emitted by the relay.
pub mod ws_types {
    pub const SCORE_UPDATE: &str = "scoreUpdate";
    pub const PROJECTION_UPDATE: &str = "projectionUpdate";
}

/// scoreUpdate payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdatePayload {
    pub team_id: String,
    pub new_score: f64,
    /// Epoch milliseconds, stamped by the relay at publish time.
    pub timestamp: i64,
}

/// projectionUpdate payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionUpdatePayload {
    pub team_id: String,
    pub new_projection: f64,
    /// Epoch milliseconds, stamped by the relay at publish time.
    pub timestamp: i64,
}

// --- Publish DTOs ---

/// POST /api/scores body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishScoreRequest {
    pub team_id: String,
    pub new_score: f64,
}

/// POST /api/projections body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishProjectionRequest {
    pub team_id: String,
    pub new_projection: f64,
}

/// Result of a broadcast that reached at least one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub receivers: usize,
    pub timestamp: i64,
}

/// Publish endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub status: String,
    pub receivers: usize,
    pub timestamp: i64,
}

impl PublishResponse {
    pub const DELIVERED: &'static str = "delivered";
}

impl From<Delivery> for PublishResponse {
    fn from(d: Delivery) -> Self {
        Self {
            status: Self::DELIVERED.to_string(),
            receivers: d.receivers,
            timestamp: d.timestamp,
        }
    }
}

/// GET /api/status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub ready: bool,
    pub connected_clients: usize,
}

// --- CMS domain models ---

/// A team as published by the CMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    pub university: Option<String>,
    pub bid_points: f64,
    pub qualified: bool,
    pub color: Option<String>,
    pub city: Option<String>,
    pub instagram: Option<String>,
    pub logo_url: Option<String>,
}

/// One placement in a competition's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub place: u32,
    pub team_id: String,
}

/// A competition as published by the CMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    /// ISO date (YYYY-MM-DD) as stored in the CMS.
    pub date: Option<String>,
    pub lineup: Vec<String>,
    pub results: Vec<Placement>,
    pub judges: Vec<String>,
    pub tickets_url: Option<String>,
    pub stream_url: Option<String>,
    pub media_urls: Vec<String>,
}
