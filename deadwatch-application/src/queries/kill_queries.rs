use deadwatch_domain::TenantId;

use crate::dtos::UndeliveredKills;
use crate::{AppError, AppState};

/// Diagnostic count of kills still waiting for the kill feed.
pub async fn list_undelivered_kill_count(
    state: &AppState,
    tenant_id: &TenantId,
) -> Result<UndeliveredKills, AppError> {
    let undelivered = state.kills.count_undispatched(tenant_id).await?;
    Ok(UndeliveredKills { undelivered })
}
