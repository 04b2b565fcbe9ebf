//! WebSocket client for the relay's live event feed.

use anyhow::Result;
use futures_util::StreamExt;
use shared::{ws_types, ProjectionUpdatePayload, ScoreUpdatePayload, WsEnvelope};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Connect, print events, reconnect every 5s. Runs until the process is stopped.
pub async fn run_ws_client(ws_url: &str) -> Result<()> {
    loop {
        match connect_async(ws_url).await {
            Ok((ws, _)) => {
                tracing::info!("Connected to relay at {}", ws_url);
                if let Err(e) = handle_connection(ws).await {
                    tracing::warn!("Connection error: {}", e);
                } else {
                    tracing::info!("Relay closed the connection");
                }
            }
            Err(e) => {
                tracing::warn!("Connect failed: {}, retrying in 5s", e);
            }
        }
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
    }
}

async fn handle_connection(
    mut ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> Result<()> {
    while let Some(msg) = ws.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => break,
            Err(e) => return Err(e.into()),
            _ => continue,
        };

        let envelope: WsEnvelope = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("ignoring malformed frame: {}", e);
                continue;
            }
        };

        match format_event(&envelope) {
            Some(line) => println!("{}", line),
            None => tracing::debug!(event = %envelope.r#type, "ignoring unknown event"),
        }
    }

    Ok(())
}

/// One display line per known event; `None` for unknown types or bad payloads.
pub fn format_event(envelope: &WsEnvelope) -> Option<String> {
    match envelope.r#type.as_str() {
        ws_types::SCORE_UPDATE => {
            let p: ScoreUpdatePayload = serde_json::from_value(envelope.payload.clone()).ok()?;
            Some(format!(
                "[{}] team {} score {}",
                clock(p.timestamp),
                p.team_id,
                p.new_score
            ))
        }
        ws_types::PROJECTION_UPDATE => {
            let p: ProjectionUpdatePayload =
                serde_json::from_value(envelope.payload.clone()).ok()?;
            Some(format!(
                "[{}] team {} projection {}",
                clock(p.timestamp),
                p.team_id,
                p.new_projection
            ))
        }
        _ => None,
    }
}

fn clock(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}
