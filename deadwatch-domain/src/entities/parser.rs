// Parser state, batch progress and ingestion modes

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ServerId, SourceKind, TenantId};

/// Resume position inside a log source: a file and a byte offset in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserCursor {
    pub file: Option<String>,
    pub offset: u64,
}

impl ParserCursor {
    pub fn start_of(file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            offset: 0,
        }
    }

    pub fn end_of(file: impl Into<String>, size: u64) -> Self {
        Self {
            file: Some(file.into()),
            offset: size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserState {
    pub tenant_id: TenantId,
    pub server_id: ServerId,
    pub kind: SourceKind,
    pub cursor: ParserCursor,
    pub auto_tailing_enabled: bool,
    /// Bumped on every reset so a reader holding a stale view cannot
    /// write its cursor back over the rewound one.
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
}

impl ParserState {
    pub fn new(tenant_id: TenantId, server_id: ServerId, kind: SourceKind, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            server_id,
            kind,
            cursor: ParserCursor::default(),
            auto_tailing_enabled: false,
            generation: 0,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserProgress {
    pub tenant_id: TenantId,
    pub server_id: ServerId,
    pub state: ProgressState,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub files_total: u32,
    pub files_done: u32,
    pub bytes_total: u64,
    pub bytes_done: u64,
    pub records_processed: u64,
    pub kills_recorded: u64,
    pub percent_complete: u8,
    pub eta_seconds: Option<u64>,
}

impl ParserProgress {
    pub fn started(
        tenant_id: TenantId,
        server_id: ServerId,
        files_total: u32,
        bytes_total: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            server_id,
            state: ProgressState::Running,
            status: format!("importing {files_total} files"),
            started_at: now,
            updated_at: now,
            files_total,
            files_done: 0,
            bytes_total,
            bytes_done: 0,
            records_processed: 0,
            kills_recorded: 0,
            percent_complete: 0,
            eta_seconds: None,
        }
    }

    /// Recomputes percent and ETA from the byte counters.
    pub fn refresh_estimate(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        if self.bytes_total == 0 {
            self.percent_complete = if self.files_done >= self.files_total { 100 } else { 0 };
            self.eta_seconds = None;
            return;
        }
        let done = self.bytes_done.min(self.bytes_total);
        self.percent_complete = ((done * 100) / self.bytes_total) as u8;
        let elapsed = (now - self.started_at).num_seconds().max(0) as u64;
        self.eta_seconds = if done == 0 {
            None
        } else {
            Some(elapsed * (self.bytes_total - done) / done)
        };
    }

    pub fn is_running(&self) -> bool {
        self.state == ProgressState::Running
    }

    pub fn is_stalled(&self, now: DateTime<Utc>, threshold_seconds: i64) -> bool {
        self.is_running() && (now - self.updated_at).num_seconds() >= threshold_seconds
    }
}

/// Per-server ingestion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    Idle,
    AutoTailing,
    BatchImporting,
    BatchFailed,
}

impl IngestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestMode::Idle => "idle",
            IngestMode::AutoTailing => "auto_tailing",
            IngestMode::BatchImporting => "batch_importing",
            IngestMode::BatchFailed => "batch_failed",
        }
    }
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file exposed by a log source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFile {
    pub name: String,
    pub size: u64,
}
