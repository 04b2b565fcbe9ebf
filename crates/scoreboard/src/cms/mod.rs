//! Headless-CMS client: teams and competitions collections.
//!
//! Collections come back as `{ "data": [ { "id": .., "attributes": { .. } } ] }`.
//! Mapping is lenient; a field the CMS leaves out becomes `None`, empty or zero.

use serde_json::Value;
use shared::{Competition, Placement, Team};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("{0} is required")]
    MissingConfig(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cms returned {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected response shape: {0}")]
    Shape(&'static str),
}

/// Authenticated reader for the CMS collections.
#[derive(Debug, Clone)]
pub struct CmsClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl CmsClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Reads CMS_BASE_URL and CMS_API_TOKEN.
    pub fn from_env() -> Result<Self, CmsError> {
        let base_url = non_empty_var("CMS_BASE_URL")?;
        let token = non_empty_var("CMS_API_TOKEN")?;
        Ok(Self::new(base_url, token))
    }

    /// Teams, or empty on any failure (logged).
    pub async fn fetch_teams(&self) -> Vec<Team> {
        match self.try_fetch_teams().await {
            Ok(teams) => teams,
            Err(e) => {
                tracing::error!(collection = "teams", "cms fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Competitions, or empty on any failure (logged).
    pub async fn fetch_competitions(&self) -> Vec<Competition> {
        match self.try_fetch_competitions().await {
            Ok(comps) => comps,
            Err(e) => {
                tracing::error!(collection = "competitions", "cms fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn try_fetch_teams(&self) -> Result<Vec<Team>, CmsError> {
        let body = self.get_collection("teams").await?;
        Ok(collection_items(&body)?.iter().map(map_team).collect())
    }

    pub async fn try_fetch_competitions(&self) -> Result<Vec<Competition>, CmsError> {
        let body = self.get_collection("competitions").await?;
        Ok(collection_items(&body)?
            .iter()
            .map(map_competition)
            .collect())
    }

    async fn get_collection(&self, name: &str) -> Result<Value, CmsError> {
        let url = format!("{}/api/{}?populate=*", self.base_url, name);
        let res = self.http.get(&url).bearer_auth(&self.token).send().await?;
        if !res.status().is_success() {
            return Err(CmsError::Status(res.status()));
        }
        Ok(res.json().await?)
    }
}

fn non_empty_var(var: &'static str) -> Result<String, CmsError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(CmsError::MissingConfig(var))
}

fn collection_items(body: &Value) -> Result<&Vec<Value>, CmsError> {
    body.get("data")
        .and_then(Value::as_array)
        .ok_or(CmsError::Shape("missing data array"))
}

/// Entries may carry fields under `attributes` or inline.
fn attributes(item: &Value) -> &Value {
    item.get("attributes").unwrap_or(item)
}

fn id_of(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(attrs: &Value, key: &str) -> Option<String> {
    attrs
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Relation payloads wrap their target(s) in `{ "data": .. }`.
fn relation_items(v: Option<&Value>) -> Vec<&Value> {
    let inner = match v {
        Some(v) => v.get("data").unwrap_or(v),
        None => return Vec::new(),
    };
    match inner {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn media_urls(v: Option<&Value>) -> Vec<String> {
    relation_items(v)
        .into_iter()
        .filter_map(|m| str_field(attributes(m), "url"))
        .collect()
}

pub fn map_team(item: &Value) -> Team {
    let attrs = attributes(item);
    Team {
        id: id_of(item).unwrap_or_default(),
        name: str_field(attrs, "name").unwrap_or_default(),
        university: str_field(attrs, "university"),
        bid_points: attrs
            .get("bidPoints")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        qualified: attrs
            .get("qualified")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        color: str_field(attrs, "color"),
        city: str_field(attrs, "city"),
        instagram: str_field(attrs, "instagram"),
        logo_url: media_urls(attrs.get("logo")).into_iter().next(),
    }
}

pub fn map_competition(item: &Value) -> Competition {
    let attrs = attributes(item);
    let lineup = relation_items(attrs.get("lineup"))
        .into_iter()
        .filter_map(id_of)
        .collect();
    let mut results: Vec<Placement> = attrs
        .get("results")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let place = row.get("place").and_then(Value::as_u64)?;
                    let team_id = relation_items(row.get("team"))
                        .into_iter()
                        .next()
                        .and_then(id_of)?;
                    Some(Placement {
                        place: u32::try_from(place).ok()?,
                        team_id,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    results.sort_by_key(|p| p.place);
    let judges = relation_items(attrs.get("judges"))
        .into_iter()
        .filter_map(|j| match j {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            other => str_field(attributes(other), "name"),
        })
        .collect();

    Competition {
        id: id_of(item).unwrap_or_default(),
        name: str_field(attrs, "name").unwrap_or_default(),
        city: str_field(attrs, "city"),
        date: str_field(attrs, "date"),
        lineup,
        results,
        judges,
        tickets_url: str_field(attrs, "ticketsUrl"),
        stream_url: str_field(attrs, "streamUrl"),
        media_urls: media_urls(attrs.get("media")),
    }
}

/// Highest bid points first; ties broken by name.
pub fn standings(mut teams: Vec<Team>) -> Vec<Team> {
    teams.sort_by(|a, b| {
        b.bid_points
            .total_cmp(&a.bid_points)
            .then_with(|| a.name.cmp(&b.name))
    });
    teams
}

/// Earliest first; undated competitions last.
pub fn schedule(mut comps: Vec<Competition>) -> Vec<Competition> {
    comps.sort_by(|a, b| match (&a.date, &b.date) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    });
    comps
}
