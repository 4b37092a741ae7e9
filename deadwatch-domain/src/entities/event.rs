// Normalized log events
// Every raw line from either source kind becomes exactly one variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    Kill(ParsedKill),
    Connection(ConnectionEvent),
    MissionAlert(MissionAlert),
    StatusLine(StatusLine),
    Unrecognized { reason: String },
}

impl GameEvent {
    pub fn unrecognized(reason: impl Into<String>) -> Self {
        GameEvent::Unrecognized {
            reason: reason.into(),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            GameEvent::Kill(_) => "kill",
            GameEvent::Connection(_) => "connection",
            GameEvent::MissionAlert(_) => "mission_alert",
            GameEvent::StatusLine(_) => "status_line",
            GameEvent::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// A kill line as read from the log, before identities are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedKill {
    pub timestamp: DateTime<Utc>,
    pub killer_name: String,
    pub killer_id: Option<String>,
    pub victim_name: String,
    pub victim_id: Option<String>,
    pub weapon: Option<String>,
    pub distance: Option<f64>,
    pub headshot: bool,
    pub team_kill: bool,
    pub map: Option<String>,
    pub suicide: bool,
    pub menu_suicide: bool,
    pub fall_death: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub timestamp: DateTime<Utc>,
    pub player_name: String,
    pub player_id: Option<String>,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Mission,
    HelicopterCrash,
    Airdrop,
    Trader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionAlert {
    pub timestamp: DateTime<Utc>,
    pub kind: AlertKind,
    pub name: Option<String>,
    pub state: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerLifecycle {
    Started,
    Stopping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLine {
    pub timestamp: DateTime<Utc>,
    pub lifecycle: ServerLifecycle,
}
