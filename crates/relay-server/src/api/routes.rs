//! API route handlers.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use shared::{
    PublishProjectionRequest, PublishResponse, PublishScoreRequest, RelayStatus,
};

use crate::api::AppState;
use crate::publisher::PublishError;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/scores", post(publish_score))
        .route("/projections", post(publish_projection))
}

async fn status(State(state): State<AppState>) -> Json<RelayStatus> {
    Json(RelayStatus {
        ready: state.registry.is_ready(),
        connected_clients: state.registry.connected_clients(),
    })
}

// --- Publish ---

async fn publish_score(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PublishScoreRequest>,
) -> Result<Json<PublishResponse>, (StatusCode, String)> {
    authorize_publish(&headers, &state)?;
    let team_id = validate_team_id(&req.team_id)?;
    state
        .publisher
        .publish_score_update(team_id, req.new_score)
        .map(|d| Json(d.into()))
        .map_err(publish_error_response)
}

async fn publish_projection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PublishProjectionRequest>,
) -> Result<Json<PublishResponse>, (StatusCode, String)> {
    authorize_publish(&headers, &state)?;
    let team_id = validate_team_id(&req.team_id)?;
    state
        .publisher
        .publish_projection_update(team_id, req.new_projection)
        .map(|d| Json(d.into()))
        .map_err(publish_error_response)
}

fn validate_team_id(team_id: &str) -> Result<&str, (StatusCode, String)> {
    let trimmed = team_id.trim();
    if trimmed.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "teamId is required".to_string()));
    }
    Ok(trimmed)
}

fn publish_error_response(e: PublishError) -> (StatusCode, String) {
    let status = match e {
        PublishError::InvalidValue(_) => StatusCode::BAD_REQUEST,
        PublishError::NotReady | PublishError::NoSubscribers => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, e.to_string())
}

// --- WebSocket ---

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Subscribe to the relay, replay the last-known snapshot (if enabled), then
/// forward every broadcast until the client goes away. Inbound frames are ignored.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let Some(relay) = state.registry.handle() else {
        tracing::warn!("socket closed: relay not initialized");
        return;
    };

    let conn_id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (mut rx, snapshot) = relay.subscribe_with_snapshot();
    state.registry.client_connected(conn_id);

    for msg in snapshot {
        let json = match msg.to_json() {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(%conn_id, "snapshot serialize failed: {}", e);
                continue;
            }
        };
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            drop(rx);
            state.registry.client_disconnected(conn_id);
            return;
        }
    }

    let ping_every = Duration::from_secs(state.config.ws_ping_interval_secs);
    let mut ping_interval =
        tokio::time::interval_at(tokio::time::Instant::now() + ping_every, ping_every);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                recv = rx.recv() => {
                    let msg = match recv {
                        Ok(m) => m,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(%conn_id, skipped, "client lagging, events skipped");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };
                    let json = match msg.to_json() {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::warn!(%conn_id, event = msg.event_name(), "serialize failed: {}", e);
                            continue;
                        }
                    };
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }

    // Dropping the writer drops its receiver, so the subscriber count is accurate below.
    writer.abort();
    let _ = writer.await;
    state.registry.client_disconnected(conn_id);
}

// --- Auth ---

fn extract_bearer_from_headers(headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").map(String::from))
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "missing authorization".to_string(),
        ))
}

/// Publish endpoints are open unless PUBLISH_API_KEY is configured.
fn authorize_publish(headers: &HeaderMap, state: &AppState) -> Result<(), (StatusCode, String)> {
    let Some(expected) = state.config.publish_api_key.as_deref() else {
        return Ok(());
    };
    let token = extract_bearer_from_headers(headers)?;
    if token != expected {
        return Err((StatusCode::UNAUTHORIZED, "invalid publish api key".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{router, AppState};
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use shared::{ProjectionUpdatePayload, ScoreUpdatePayload, WsEnvelope};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tower::ServiceExt;

    type WsClient = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    fn ready_state(config: Config) -> AppState {
        let state = AppState::new(Arc::new(config));
        state.start_relay().unwrap();
        state
    }

    fn post_json(uri: &str, body: serde_json::Value, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(token) = bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn spawn_server(state: AppState) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> WsClient {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .unwrap();
        ws
    }

    async fn wait_for_clients(state: &AppState, n: usize) {
        for _ in 0..100 {
            if state.registry.connected_clients() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "expected {} clients, have {}",
            n,
            state.registry.connected_clients()
        );
    }

    async fn next_envelope(ws: &mut WsClient) -> WsEnvelope {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for event")
                .expect("socket closed")
                .expect("socket error");
            if let WsMessage::Text(t) = msg {
                return serde_json::from_str(&t).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn status_reports_readiness() {
        let state = AppState::new(Arc::new(Config::default()));
        let app = router(state.clone());
        let req = Request::builder()
            .uri("/api/status")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status: RelayStatus = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(!status.ready);
        assert_eq!(status.connected_clients, 0);

        state.start_relay().unwrap();
        let req = Request::builder()
            .uri("/api/status")
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(req).await.unwrap();
        let status: RelayStatus = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(status.ready);
    }

    #[tokio::test]
    async fn publish_before_relay_start_is_unavailable() {
        let state = AppState::new(Arc::new(Config::default()));
        let req = post_json(
            "/api/scores",
            serde_json::json!({"teamId": "2", "newScore": 95}),
            None,
        );
        let response = router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_string(response).await.contains("not initialized"));
    }

    #[tokio::test]
    async fn publish_with_no_clients_is_dropped() {
        let state = ready_state(Config::default());
        let req = post_json(
            "/api/scores",
            serde_json::json!({"teamId": "2", "newScore": 95}),
            None,
        );
        let response = router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_string(response).await.contains("no connected clients"));
    }

    #[tokio::test]
    async fn publish_score_reaches_subscriber() {
        let state = ready_state(Config::default());
        let mut rx = state.registry.handle().unwrap().subscribe();

        let req = post_json(
            "/api/scores",
            serde_json::json!({"teamId": " 2 ", "newScore": 95}),
            None,
        );
        let response = router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: PublishResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body.status, "delivered");
        assert_eq!(body.receivers, 1);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.event_name(), "scoreUpdate");
        assert_eq!(msg.team_id(), "2");
    }

    #[tokio::test]
    async fn publish_rejects_empty_team_id() {
        let state = ready_state(Config::default());
        let req = post_json(
            "/api/projections",
            serde_json::json!({"teamId": "  ", "newProjection": 1.5}),
            None,
        );
        let response = router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn publish_requires_key_when_configured() {
        let config = Config {
            publish_api_key: Some("secret-key".to_string()),
            ..Config::default()
        };
        let state = ready_state(config);
        let _rx = state.registry.handle().unwrap().subscribe();
        let body = serde_json::json!({"teamId": "1", "newProjection": 182.4});

        let response = router(state.clone())
            .oneshot(post_json("/api/projections", body.clone(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router(state.clone())
            .oneshot(post_json("/api/projections", body.clone(), Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router(state)
            .oneshot(post_json("/api/projections", body, Some("secret-key")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn score_update_reaches_connected_client() {
        let state = ready_state(Config::default());
        let addr = spawn_server(state.clone()).await;

        let mut client = connect(addr).await;
        wait_for_clients(&state, 1).await;

        let before = chrono::Utc::now().timestamp_millis();
        let delivery = state.publisher.publish_score_update("2", 95.0).unwrap();
        assert_eq!(delivery.receivers, 1);

        let env = next_envelope(&mut client).await;
        assert_eq!(env.r#type, "scoreUpdate");
        let p: ScoreUpdatePayload = serde_json::from_value(env.payload).unwrap();
        assert_eq!(p.team_id, "2");
        assert_eq!(p.new_score, 95.0);
        assert!(p.timestamp >= before);
        assert!(p.timestamp - before < 5_000);
    }

    #[tokio::test]
    async fn projection_update_reaches_every_client() {
        let state = ready_state(Config::default());
        let addr = spawn_server(state.clone()).await;

        let mut a = connect(addr).await;
        let mut b = connect(addr).await;
        wait_for_clients(&state, 2).await;

        let delivery = state.publisher.publish_projection_update("1", 182.4).unwrap();
        assert_eq!(delivery.receivers, 2);

        let ea = next_envelope(&mut a).await;
        let eb = next_envelope(&mut b).await;
        assert_eq!(ea.r#type, "projectionUpdate");
        assert_eq!(ea.payload, eb.payload);
        let p: ProjectionUpdatePayload = serde_json::from_value(ea.payload).unwrap();
        assert_eq!(p.team_id, "1");
        assert_eq!(p.new_projection, 182.4);
    }

    #[tokio::test]
    async fn sequential_publishes_arrive_in_order() {
        let state = ready_state(Config::default());
        let addr = spawn_server(state.clone()).await;
        let mut client = connect(addr).await;
        wait_for_clients(&state, 1).await;

        state.publisher.publish_score_update("1", 10.0).unwrap();
        state.publisher.publish_score_update("2", 20.0).unwrap();

        let first: ScoreUpdatePayload =
            serde_json::from_value(next_envelope(&mut client).await.payload).unwrap();
        let second: ScoreUpdatePayload =
            serde_json::from_value(next_envelope(&mut client).await.payload).unwrap();
        assert_eq!((first.team_id.as_str(), first.new_score), ("1", 10.0));
        assert_eq!((second.team_id.as_str(), second.new_score), ("2", 20.0));
    }

    #[tokio::test]
    async fn late_joiner_gets_last_known_when_replay_enabled() {
        let config = Config {
            replay_last_known: true,
            ..Config::default()
        };
        let state = ready_state(config);
        let addr = spawn_server(state.clone()).await;

        assert_eq!(
            state.publisher.publish_score_update("2", 90.0),
            Err(PublishError::NoSubscribers)
        );
        let _ = state.publisher.publish_score_update("2", 95.0);

        let mut client = connect(addr).await;
        let env = next_envelope(&mut client).await;
        assert_eq!(env.r#type, "scoreUpdate");
        let p: ScoreUpdatePayload = serde_json::from_value(env.payload).unwrap();
        assert_eq!(p.new_score, 95.0);
    }

    #[tokio::test]
    async fn disconnect_drops_subscriber() {
        let state = ready_state(Config::default());
        let addr = spawn_server(state.clone()).await;

        let mut client = connect(addr).await;
        wait_for_clients(&state, 1).await;
        client.close(None).await.unwrap();
        wait_for_clients(&state, 0).await;

        assert_eq!(
            state.publisher.publish_score_update("2", 95.0),
            Err(PublishError::NoSubscribers)
        );
    }

    #[test]
    fn invalid_value_maps_to_bad_request() {
        let (status, body) = publish_error_response(PublishError::InvalidValue("newScore"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("newScore"));
        assert_eq!(
            publish_error_response(PublishError::NoSubscribers).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn out_of_range_number_is_rejected() {
        let state = ready_state(Config::default());
        let _rx = state.registry.handle().unwrap().subscribe();
        let req = Request::builder()
            .method("POST")
            .uri("/api/scores")
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"teamId":"2","newScore":1e400}"#))
            .unwrap();
        let response = router(state).oneshot(req).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn replay_then_live_without_duplicates() {
        let config = Config {
            replay_last_known: true,
            ..Config::default()
        };
        let state = ready_state(config);
        let addr = spawn_server(state.clone()).await;
        let _ = state.publisher.publish_score_update("2", 90.0);

        let mut client = connect(addr).await;
        wait_for_clients(&state, 1).await;
        state.publisher.publish_score_update("2", 95.0).unwrap();

        let first: ScoreUpdatePayload =
            serde_json::from_value(next_envelope(&mut client).await.payload).unwrap();
        let second: ScoreUpdatePayload =
            serde_json::from_value(next_envelope(&mut client).await.payload).unwrap();
        assert_eq!(first.new_score, 90.0);
        assert_eq!(second.new_score, 95.0);

        let extra = tokio::time::timeout(Duration::from_millis(200), async {
            loop {
                match client.next().await {
                    Some(Ok(WsMessage::Text(t))) => return Some(t),
                    Some(Ok(_)) => continue,
                    _ => return None,
                }
            }
        })
        .await;
        assert!(extra.is_err(), "unexpected extra frame: {:?}", extra);
    }
}
