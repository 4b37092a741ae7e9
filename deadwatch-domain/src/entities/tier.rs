// Subscription tiers

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierLevel(pub String);

impl TierLevel {
    pub const SURVIVOR: &'static str = "survivor";
    pub const WARLORD: &'static str = "warlord";
    pub const OVERSEER: &'static str = "overseer";

    pub fn new(level: impl Into<String>) -> Self {
        Self(level.into().trim().to_lowercase())
    }

    pub fn survivor() -> Self {
        Self(Self::SURVIVOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    pub max_servers: u32,
    pub history_days: u32,
    pub batch_processing_allowed: bool,
}

impl TierLimits {
    pub fn builtin(level: &TierLevel) -> Option<Self> {
        let limits = match level.as_str() {
            TierLevel::SURVIVOR => TierLimits {
                max_servers: 1,
                history_days: 7,
                batch_processing_allowed: false,
            },
            TierLevel::WARLORD => TierLimits {
                max_servers: 3,
                history_days: 30,
                batch_processing_allowed: true,
            },
            TierLevel::OVERSEER => TierLimits {
                max_servers: 10,
                history_days: 90,
                batch_processing_allowed: true,
            },
            _ => return None,
        };
        Some(limits)
    }
}
