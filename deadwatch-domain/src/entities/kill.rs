// Kill event entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::ParsedKill;
use crate::value_objects::{PlayerId, ServerId, TenantId};

/// Immutable kill record. Only `processed` and `dispatched` ever change,
/// and only from false to true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillEvent {
    pub id: String,
    pub tenant_id: TenantId,
    pub server_id: ServerId,
    pub killer_id: PlayerId,
    pub killer_name: String,
    pub victim_id: PlayerId,
    pub victim_name: String,
    pub weapon: Option<String>,
    pub headshot: bool,
    pub distance: Option<f64>,
    pub map: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub team_kill: bool,
    pub suicide: bool,
    pub dedup_key: String,
    pub processed: bool,
    pub dispatched: bool,
    pub created_at: DateTime<Utc>,
}

impl KillEvent {
    pub fn from_parsed(
        tenant_id: TenantId,
        server_id: ServerId,
        killer_id: PlayerId,
        victim_id: PlayerId,
        parsed: &ParsedKill,
        now: DateTime<Utc>,
    ) -> Self {
        let suicide = parsed.suicide || killer_id == victim_id;
        let dedup_key = dedup_key(
            &server_id,
            &killer_id,
            &victim_id,
            parsed.weapon.as_deref(),
            parsed.timestamp,
        );
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            server_id,
            killer_id,
            killer_name: parsed.killer_name.clone(),
            victim_id,
            victim_name: parsed.victim_name.clone(),
            weapon: parsed.weapon.clone(),
            headshot: parsed.headshot,
            distance: parsed.distance,
            map: parsed.map.clone(),
            timestamp: parsed.timestamp,
            team_kill: parsed.team_kill && !suicide,
            suicide,
            dedup_key,
            processed: false,
            dispatched: false,
            created_at: now,
        }
    }

    /// Sort key giving timestamp order with a stable tiebreak.
    pub fn order_key(&self) -> String {
        format!("{:020}|{}", self.timestamp.timestamp_millis().max(0), self.id)
    }
}

pub fn dedup_key(
    server_id: &ServerId,
    killer_id: &PlayerId,
    victim_id: &PlayerId,
    weapon: Option<&str>,
    timestamp: DateTime<Utc>,
) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        server_id,
        killer_id,
        victim_id,
        weapon.unwrap_or_default().to_lowercase(),
        timestamp.timestamp()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Recorded,
    Duplicate,
}
