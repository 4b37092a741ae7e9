use deadwatch_domain::{
    IngestMode,
    LogAccess,
    ParserProgress,
    ServerId,
    ServerStats,
    ServerStatus,
    TrackedServer,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct AddServerRequest {
    pub display_name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub query_port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub log_path: Option<String>,
    #[serde(default)]
    pub log_access: LogAccess,
    #[serde(default)]
    pub sftp_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerAdded {
    pub server_id: ServerId,
    pub display_name: String,
    pub ingest_mode: IngestMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerRemoved {
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetStarted {
    pub display_name: String,
    pub ingest_mode: IngestMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BindChannelRequest {
    #[serde(default)]
    pub server_id: Option<String>,
    pub channel_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSummary {
    pub server_id: ServerId,
    pub display_name: String,
    pub online: bool,
    pub players_online: u32,
    pub players_max: u32,
}

impl From<&TrackedServer> for ServerSummary {
    fn from(server: &TrackedServer) -> Self {
        Self {
            server_id: server.server_id.clone(),
            display_name: server.display_name.clone(),
            online: server.status.online,
            players_online: server.status.players_online,
            players_max: server.status.players_max,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStatusView {
    pub server_id: ServerId,
    pub display_name: String,
    pub status: ServerStatus,
    pub stats: ServerStats,
    pub ingest_mode: IngestMode,
    pub auto_tailing_enabled: bool,
    pub batch: Option<ParserProgress>,
    pub batch_stalled: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UndeliveredKills {
    pub undelivered: u64,
}
