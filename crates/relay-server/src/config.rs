//! Configuration for the relay server.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// When set, publish endpoints require `Authorization: Bearer <key>`.
    pub publish_api_key: Option<String>,
    /// Send each new client the last-known score/projection per team.
    pub replay_last_known: bool,
    /// Upper bound on teams kept in the replay snapshot; the stalest is evicted.
    pub replay_max_teams: usize,
    pub broadcast_capacity: usize,
    pub ws_ping_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            publish_api_key: None,
            replay_last_known: false,
            replay_max_teams: 512,
            broadcast_capacity: 256,
            ws_ping_interval_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let host = get("HOST").unwrap_or(defaults.host);
        let port = parse_var("PORT", get("PORT"), defaults.port)?;
        let publish_api_key = get("PUBLISH_API_KEY");
        let replay_last_known = match get("REPLAY_LAST_KNOWN") {
            Some(v) => parse_bool("REPLAY_LAST_KNOWN", &v)?,
            None => defaults.replay_last_known,
        };
        let replay_max_teams = parse_var(
            "REPLAY_MAX_TEAMS",
            get("REPLAY_MAX_TEAMS"),
            defaults.replay_max_teams,
        )?;
        if replay_max_teams == 0 {
            return Err(ConfigError::Invalid {
                var: "REPLAY_MAX_TEAMS",
                value: "0".to_string(),
            });
        }
        let broadcast_capacity = parse_var(
            "BROADCAST_CAPACITY",
            get("BROADCAST_CAPACITY"),
            defaults.broadcast_capacity,
        )?;
        if broadcast_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "BROADCAST_CAPACITY",
                value: "0".to_string(),
            });
        }
        let ws_ping_interval_secs = parse_var(
            "WS_PING_INTERVAL_SECS",
            get("WS_PING_INTERVAL_SECS"),
            defaults.ws_ping_interval_secs,
        )?;

        Ok(Self {
            host,
            port,
            publish_api_key,
            replay_last_known,
            replay_max_teams,
            broadcast_capacity,
            ws_ping_interval_secs: ws_ping_interval_secs.max(1),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: v }),
        None => Ok(default),
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
        }),
    }
}
