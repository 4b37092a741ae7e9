// Player stat aggregate

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{PlayerId, ServerId, TenantId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaponStats {
    pub kills: u64,
    pub deaths: u64,
    pub headshots: u64,
    pub longest_kill: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStats {
    pub kills: u64,
    pub deaths: u64,
}

/// One per (tenant, server, player).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatAggregate {
    pub tenant_id: TenantId,
    pub server_id: ServerId,
    pub player_id: PlayerId,
    pub display_name: String,
    pub kills: u64,
    pub deaths: u64,
    pub headshots: u64,
    pub suicides: u64,
    pub team_kills: u64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub longest_kill_distance: f64,
    pub playtime_seconds: u64,
    /// Start of the open session, if the player is connected.
    pub session_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub weapons: BTreeMap<String, WeaponStats>,
    #[serde(default)]
    pub maps: BTreeMap<String, MapStats>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl PlayerStatAggregate {
    pub fn new(
        tenant_id: TenantId,
        server_id: ServerId,
        player_id: PlayerId,
        display_name: impl Into<String>,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            server_id,
            player_id,
            display_name: display_name.into(),
            kills: 0,
            deaths: 0,
            headshots: 0,
            suicides: 0,
            team_kills: 0,
            current_streak: 0,
            best_streak: 0,
            longest_kill_distance: 0.0,
            playtime_seconds: 0,
            session_started_at: None,
            weapons: BTreeMap::new(),
            maps: BTreeMap::new(),
            first_seen: seen_at,
            last_seen: seen_at,
        }
    }

    pub fn kd_ratio(&self) -> f64 {
        if self.deaths == 0 {
            self.kills as f64
        } else {
            self.kills as f64 / self.deaths as f64
        }
    }
}
