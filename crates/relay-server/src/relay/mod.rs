//! WebSocket relay state and broadcast.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use shared::{ws_types, ProjectionUpdatePayload, ScoreUpdatePayload, WsEnvelope};

use crate::publisher::{Broadcaster, PublishError};

/// Message to broadcast to WebSocket clients.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastMessage {
    ScoreUpdate(ScoreUpdatePayload),
    ProjectionUpdate(ProjectionUpdatePayload),
}

impl BroadcastMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ScoreUpdate(_) => ws_types::SCORE_UPDATE,
            Self::ProjectionUpdate(_) => ws_types::PROJECTION_UPDATE,
        }
    }

    pub fn team_id(&self) -> &str {
        match self {
            Self::ScoreUpdate(p) => &p.team_id,
            Self::ProjectionUpdate(p) => &p.team_id,
        }
    }

    pub fn to_envelope(&self) -> Result<WsEnvelope, serde_json::Error> {
        let payload = match self {
            Self::ScoreUpdate(p) => serde_json::to_value(p)?,
            Self::ProjectionUpdate(p) => serde_json::to_value(p)?,
        };
        Ok(WsEnvelope {
            version: shared::WS_PROTOCOL_VERSION,
            r#type: self.event_name().to_string(),
            payload,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_envelope()?)
    }
}

/// Relay state: broadcast channel for WebSocket messages. This is the
/// transport handle the registry hands out once the server is listening.
pub struct RelayState {
    tx: broadcast::Sender<BroadcastMessage>,
    /// Only present when replay is on. Held across `send` and `subscribe` so a
    /// subscriber never sees an event in both its snapshot and its live feed.
    last_known: Option<Mutex<LastKnown>>,
}

/// Latest score/projection per team, bounded to `max_teams` teams.
struct LastKnown {
    teams: HashMap<String, TeamSnapshot>,
    max_teams: usize,
    clock: u64,
}

#[derive(Default)]
struct TeamSnapshot {
    score: Option<BroadcastMessage>,
    projection: Option<BroadcastMessage>,
    touched: u64,
}

impl LastKnown {
    fn new(max_teams: usize) -> Self {
        Self {
            teams: HashMap::new(),
            max_teams: max_teams.max(1),
            clock: 0,
        }
    }

    fn remember(&mut self, msg: &BroadcastMessage) {
        self.clock += 1;
        if !self.teams.contains_key(msg.team_id()) && self.teams.len() >= self.max_teams {
            self.evict_stalest();
        }
        let entry = self.teams.entry(msg.team_id().to_string()).or_default();
        entry.touched = self.clock;
        match msg {
            BroadcastMessage::ScoreUpdate(_) => entry.score = Some(msg.clone()),
            BroadcastMessage::ProjectionUpdate(_) => entry.projection = Some(msg.clone()),
        }
    }

    fn evict_stalest(&mut self) {
        let stalest = self
            .teams
            .iter()
            .min_by_key(|(_, t)| t.touched)
            .map(|(id, _)| id.clone());
        if let Some(id) = stalest {
            self.teams.remove(&id);
            tracing::debug!(team_id = %id, "replay snapshot full, evicted stalest team");
        }
    }

    /// Ordered by team id, projection before score.
    fn snapshot(&self) -> Vec<BroadcastMessage> {
        let mut ids: Vec<&String> = self.teams.keys().collect();
        ids.sort();
        ids.into_iter()
            .flat_map(|id| {
                let t = &self.teams[id];
                t.projection.iter().chain(t.score.iter()).cloned()
            })
            .collect()
    }
}

impl RelayState {
    /// Live broadcast only; new clients get no snapshot.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            last_known: None,
        }
    }

    /// Live broadcast plus a last-known snapshot for up to `max_teams` teams.
    pub fn with_replay(capacity: usize, max_teams: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            last_known: Some(Mutex::new(LastKnown::new(max_teams))),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.tx.subscribe()
    }

    /// Subscribe and take the snapshot as one step: every event is either in
    /// the snapshot or arrives on the receiver, never both.
    pub fn subscribe_with_snapshot(
        &self,
    ) -> (broadcast::Receiver<BroadcastMessage>, Vec<BroadcastMessage>) {
        let Some(last_known) = &self.last_known else {
            return (self.tx.subscribe(), Vec::new());
        };
        let guard = lock(last_known);
        let rx = self.tx.subscribe();
        (rx, guard.snapshot())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Last-known events for a newly connected client. Empty unless replay is on.
    pub fn snapshot(&self) -> Vec<BroadcastMessage> {
        self.last_known
            .as_ref()
            .map(|lk| lock(lk).snapshot())
            .unwrap_or_default()
    }
}

fn lock(m: &Mutex<LastKnown>) -> MutexGuard<'_, LastKnown> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Broadcaster for RelayState {
    fn broadcast(&self, msg: BroadcastMessage) -> Result<usize, PublishError> {
        let _guard = self.last_known.as_ref().map(|lk| {
            let mut g = lock(lk);
            g.remember(&msg);
            g
        });
        self.tx.send(msg).map_err(|_| PublishError::NoSubscribers)
    }
}
