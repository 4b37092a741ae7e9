use chrono::Utc;
use deadwatch_domain::{ServerId, SourceKind, TenantId};

use crate::commands::server_commands::require_server;
use crate::dtos::{ServerStatusView, ServerSummary};
use crate::{AppError, AppState};

pub async fn list_servers(state: &AppState, tenant_id: &TenantId) -> Result<Vec<ServerSummary>, AppError> {
    let servers = state.servers.list_servers(tenant_id).await?;
    Ok(servers.iter().map(ServerSummary::from).collect())
}

pub async fn get_server_status(
    state: &AppState,
    tenant_id: &TenantId,
    server_id: &ServerId,
) -> Result<ServerStatusView, AppError> {
    let server = require_server(state, tenant_id, server_id).await?;
    let parser = state
        .parser_states
        .get_or_create_parser_state(tenant_id, server_id, SourceKind::LogTail)
        .await?;
    let batch = state.progress.get_progress(tenant_id, server_id).await?;
    let batch_stalled = batch
        .as_ref()
        .map(|progress| progress.is_stalled(Utc::now(), state.config.stalled_batch_seconds))
        .unwrap_or(false);
    let ingest_mode = state.supervisor.mode(tenant_id, server_id).await;

    Ok(ServerStatusView {
        server_id: server.server_id,
        display_name: server.display_name,
        status: server.status,
        stats: server.stats,
        ingest_mode,
        auto_tailing_enabled: parser.auto_tailing_enabled,
        batch,
        batch_stalled,
    })
}
