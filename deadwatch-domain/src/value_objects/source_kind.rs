// Log source kinds

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two per-server log streams the pipeline tails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Server event log (lifecycle, connections, mission alerts).
    Status,
    /// Kill log, one CSV record per line.
    LogTail,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::LogTail, SourceKind::Status];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Status => "status",
            SourceKind::LogTail => "log_tail",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            SourceKind::Status => "log",
            SourceKind::LogTail => "csv",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "status" => Some(SourceKind::Status),
            "log_tail" | "logtail" | "kills" => Some(SourceKind::LogTail),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
