// Tracked server entity
// Connection parameters are owned by the registry; the pipeline writes
// only the status snapshot and the cumulative stats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ServerId, TenantId};

pub const DEFAULT_SFTP_PORT: u16 = 22;

/// Where a server's log files are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAccess {
    /// A directory under the configured log root.
    #[default]
    Local,
    /// The game host's SFTP service, logged in with the server's credentials.
    Sftp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConnection {
    pub host: String,
    pub port: u16,
    /// Port answering status queries; game port when unset.
    #[serde(default)]
    pub query_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Log directory, relative to the log root or the SFTP login directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
    #[serde(default)]
    pub log_access: LogAccess,
    /// SSH port of the game host; 22 when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sftp_port: Option<u16>,
}

impl ServerConnection {
    pub fn effective_query_port(&self) -> u16 {
        self.query_port.unwrap_or(self.port)
    }

    pub fn effective_sftp_port(&self) -> u16 {
        self.sftp_port.unwrap_or(DEFAULT_SFTP_PORT)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub online: bool,
    pub name: Option<String>,
    pub map: Option<String>,
    pub players_online: u32,
    pub players_max: u32,
    pub version: Option<String>,
    pub last_check: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
    pub restart_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    pub total_kills: u64,
    pub total_deaths: u64,
    pub peak_players: u32,
    pub peak_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedServer {
    pub tenant_id: TenantId,
    pub server_id: ServerId,
    pub display_name: String,
    pub connection: ServerConnection,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub stats: ServerStats,
    pub created_at: DateTime<Utc>,
}

impl TrackedServer {
    pub fn new(
        tenant_id: TenantId,
        server_id: ServerId,
        display_name: impl Into<String>,
        connection: ServerConnection,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            server_id,
            display_name: display_name.into(),
            connection,
            status: ServerStatus::default(),
            stats: ServerStats::default(),
            created_at: now,
        }
    }
}

/// Result of a successful status query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub online: bool,
    pub name: Option<String>,
    pub map: Option<String>,
    pub players_online: u32,
    pub players_max: u32,
    pub version: Option<String>,
}

/// What changed when a poll result was applied to a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTransition {
    pub came_online: bool,
    pub went_offline: bool,
    pub new_peak: bool,
}
