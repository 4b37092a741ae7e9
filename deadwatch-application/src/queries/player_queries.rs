use deadwatch_domain::{PlayerId, PlayerStatAggregate, ServerId, TenantId};

use crate::commands::server_commands::require_server;
use crate::{AppError, AppState};

/// Looks a player up by platform id first, then by display name.
pub async fn get_player_stats(
    state: &AppState,
    tenant_id: &TenantId,
    server_id: &ServerId,
    player: &str,
) -> Result<PlayerStatAggregate, AppError> {
    let player = player.trim();
    if player.is_empty() {
        return Err(AppError::BadRequest("player is required".to_string()));
    }
    require_server(state, tenant_id, server_id).await?;

    if let Some(found) = state
        .players
        .get_player(tenant_id, server_id, &PlayerId::from(player))
        .await?
    {
        return Ok(found);
    }
    if let Some(found) = state
        .players
        .find_player_by_name(tenant_id, server_id, player)
        .await?
    {
        return Ok(found);
    }
    if let Some(name_id) = PlayerId::resolve(None, player) {
        if let Some(found) = state.players.get_player(tenant_id, server_id, &name_id).await? {
            return Ok(found);
        }
    }
    Err(AppError::NotFound("player not found".to_string()))
}
