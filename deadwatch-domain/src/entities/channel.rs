use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ServerId, TenantId};

/// Kill-feed destination. `server_id = None` is the tenant's catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchChannel {
    pub tenant_id: TenantId,
    pub server_id: Option<ServerId>,
    pub channel_id: String,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}
