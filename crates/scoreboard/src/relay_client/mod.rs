//! Clients for the relay server: live feed and publish trigger.

mod publish;
mod ws;

pub use publish::{publish_projection, publish_score};
pub use ws::{format_event, run_ws_client};

/// Map a relay WebSocket URL to its HTTP base (`ws://host/ws` -> `http://host`).
pub fn http_base_url(ws_url: &str) -> String {
    let http_url = ws_url
        .replace("wss://", "https://")
        .replace("ws://", "http://");
    http_url
        .trim_end_matches('/')
        .trim_end_matches("/ws")
        .to_string()
}
