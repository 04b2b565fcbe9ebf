//! Publish trigger: POST score/projection updates to the relay.

use anyhow::Result;
use shared::{PublishProjectionRequest, PublishResponse, PublishScoreRequest};

pub async fn publish_score(
    base_url: &str,
    api_key: Option<&str>,
    team_id: &str,
    new_score: f64,
) -> Result<PublishResponse> {
    let body = PublishScoreRequest {
        team_id: team_id.to_string(),
        new_score,
    };
    post(base_url, "/api/scores", api_key, &body).await
}

pub async fn publish_projection(
    base_url: &str,
    api_key: Option<&str>,
    team_id: &str,
    new_projection: f64,
) -> Result<PublishResponse> {
    let body = PublishProjectionRequest {
        team_id: team_id.to_string(),
        new_projection,
    };
    post(base_url, "/api/projections", api_key, &body).await
}

async fn post<B: serde::Serialize>(
    base_url: &str,
    path: &str,
    api_key: Option<&str>,
    body: &B,
) -> Result<PublishResponse> {
    let client = reqwest::Client::new();
    let mut req = client
        .post(format!("{}{}", base_url.trim_end_matches('/'), path))
        .json(body);
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }
    let res = req.send().await?;
    if !res.status().is_success() {
        let status = res.status();
        let err: String = res.text().await.unwrap_or_default();
        anyhow::bail!("relay returned {}: {}", status, err);
    }
    Ok(res.json().await?)
}
