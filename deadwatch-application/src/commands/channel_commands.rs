use chrono::Utc;
use deadwatch_domain::{DispatchChannel, ServerId, TenantId};
use tracing::info;

use super::server_commands::require_server;
use crate::dtos::BindChannelRequest;
use crate::retry::with_retry;
use crate::{AppError, AppState};

/// Creates or replaces the tenant's binding for one server, or its
/// catch-all binding when no server is given.
pub async fn bind_channel(
    state: &AppState,
    tenant_id: &TenantId,
    request: BindChannelRequest,
) -> Result<DispatchChannel, AppError> {
    let channel_id = request.channel_id.trim().to_string();
    if channel_id.is_empty() {
        return Err(AppError::BadRequest("channel is required".to_string()));
    }
    let server_id = request
        .server_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(ServerId::from);
    if let Some(server_id) = &server_id {
        require_server(state, tenant_id, server_id).await?;
    }

    let binding = DispatchChannel {
        tenant_id: tenant_id.clone(),
        server_id,
        channel_id,
        enabled: request.enabled,
        updated_at: Utc::now(),
    };
    with_retry(state.config.store_retry_attempts, "upsert_channel", || {
        state.channels.upsert_channel(&binding)
    })
    .await?;
    info!(
        tenant_id = %tenant_id,
        server_id = ?binding.server_id,
        enabled = binding.enabled,
        "kill feed channel bound"
    );
    Ok(binding)
}

pub async fn unbind_channel(
    state: &AppState,
    tenant_id: &TenantId,
    server_id: Option<&ServerId>,
) -> Result<(), AppError> {
    let removed = with_retry(state.config.store_retry_attempts, "remove_channel", || {
        state.channels.remove_channel(tenant_id, server_id)
    })
    .await?;
    if !removed {
        return Err(AppError::NotFound("channel binding not found".to_string()));
    }
    info!(tenant_id = %tenant_id, server_id = ?server_id, "kill feed channel unbound");
    Ok(())
}
