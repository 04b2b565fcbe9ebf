//! Shared types and models for the scoreboard relay and CLI.

mod models;

// Explicit re-exports (avoids rust-analyzer issues with `pub use models::*`)
pub use models::ws_types;
pub use models::{
    Competition, Delivery, Placement, ProjectionUpdatePayload, PublishProjectionRequest,
    PublishResponse, PublishScoreRequest, RelayStatus, ScoreUpdatePayload, Team, WsEnvelope,
    WS_PROTOCOL_VERSION,
};
