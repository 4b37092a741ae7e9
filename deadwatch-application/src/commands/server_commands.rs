use std::path::{Component, Path};
use std::time::Duration;

use chrono::Utc;
use deadwatch_domain::{
    IngestMode,
    LogAccess,
    ServerConnection,
    ServerId,
    SourceKind,
    TenantId,
    TrackedServer,
};
use tracing::{error, info, warn};

use crate::dtos::{AddServerRequest, ResetStarted, ServerAdded, ServerRemoved};
use crate::pipeline::start_batch_import;
use crate::retry::with_retry;
use crate::{AppError, AppState};

const MAX_DISPLAY_NAME_LEN: usize = 64;

pub(crate) async fn require_server(
    state: &AppState,
    tenant_id: &TenantId,
    server_id: &ServerId,
) -> Result<TrackedServer, AppError> {
    state
        .servers
        .get_server(tenant_id, server_id)
        .await?
        .ok_or_else(|| AppError::NotFound("server not found".to_string()))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_request(tenant_id: &TenantId, request: AddServerRequest) -> Result<(String, ServerConnection), AppError> {
    if tenant_id.as_str().trim().is_empty() {
        return Err(AppError::BadRequest("tenant is required".to_string()));
    }
    let display_name = request.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(AppError::BadRequest("display name is required".to_string()));
    }
    if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "display name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    let host = request.host.trim().to_string();
    if host.is_empty() {
        return Err(AppError::BadRequest("host is required".to_string()));
    }
    if request.port == 0 || request.query_port == Some(0) || request.sftp_port == Some(0) {
        return Err(AppError::BadRequest("port must be between 1 and 65535".to_string()));
    }
    let log_path = blank_to_none(request.log_path);
    if let Some(path) = &log_path {
        let relative = Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !relative {
            return Err(AppError::BadRequest("log path must be relative to the log root".to_string()));
        }
    }
    let username = blank_to_none(request.username);
    if request.log_access == LogAccess::Sftp && username.is_none() {
        return Err(AppError::BadRequest("sftp log access needs a username".to_string()));
    }

    Ok((
        display_name,
        ServerConnection {
            host,
            port: request.port,
            query_port: request.query_port,
            protocol: blank_to_none(request.protocol),
            username,
            password: request.password.filter(|p| !p.is_empty()),
            log_path,
            log_access: request.log_access,
            sftp_port: request.sftp_port,
        },
    ))
}

/// Registers a server if the tenant's tier has room for it, then starts
/// its ingestion: a historical import when the tier allows batch
/// processing, live tailing otherwise.
pub async fn add_server(
    state: &AppState,
    tenant_id: &TenantId,
    request: AddServerRequest,
) -> Result<ServerAdded, AppError> {
    let (display_name, connection) = validate_request(tenant_id, request)?;
    let limits = state.tier_limits(tenant_id).await?;
    let server = TrackedServer::new(
        tenant_id.clone(),
        ServerId::generate(),
        display_name,
        connection,
        Utc::now(),
    );

    let admitted = with_retry(state.config.store_retry_attempts, "insert_server", || {
        state.servers.insert_server(&server, limits.max_servers)
    })
    .await?;
    if !admitted {
        return Err(AppError::Capacity(format!(
            "server limit reached: your tier allows {} tracked server(s)",
            limits.max_servers
        )));
    }

    match start_ingestion(state, &server, limits.batch_processing_allowed).await {
        Ok(ingest_mode) => {
            info!(
                tenant_id = %tenant_id,
                server_id = %server.server_id,
                server = %server.display_name,
                mode = %ingest_mode,
                "server added"
            );
            Ok(ServerAdded {
                server_id: server.server_id.clone(),
                display_name: server.display_name.clone(),
                ingest_mode,
            })
        }
        Err(err) => {
            error!(server_id = %server.server_id, error = %err, "failed to start ingestion, rolling back");
            state.supervisor.remove(tenant_id, &server.server_id).await;
            if let Err(rollback) = state.servers.remove_server(tenant_id, &server.server_id).await {
                error!(server_id = %server.server_id, error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

async fn start_ingestion(
    state: &AppState,
    server: &TrackedServer,
    batch_allowed: bool,
) -> Result<IngestMode, AppError> {
    let enable = |kind: SourceKind| {
        with_retry(state.config.store_retry_attempts, "set_auto_tailing", move || {
            state
                .parser_states
                .set_auto_tailing(&server.tenant_id, &server.server_id, kind, true)
        })
    };
    enable(SourceKind::Status).await?;
    if batch_allowed {
        start_batch_import(state, server).await?;
        return Ok(IngestMode::BatchImporting);
    }
    enable(SourceKind::LogTail).await?;
    let slot = state
        .supervisor
        .slot(&server.tenant_id, &server.server_id)
        .await;
    state.supervisor.transition(&slot, IngestMode::AutoTailing).await;
    Ok(IngestMode::AutoTailing)
}

/// Cancels everything running for the server and deletes it together with
/// its parser state, progress, players, kills and server-specific binding.
pub async fn remove_server(
    state: &AppState,
    tenant_id: &TenantId,
    server_id: &ServerId,
) -> Result<ServerRemoved, AppError> {
    let server = require_server(state, tenant_id, server_id).await?;

    if let Some(batch) = state.supervisor.remove(tenant_id, server_id).await {
        let wait = Duration::from_secs(state.config.server_task_timeout_seconds.max(1));
        if tokio::time::timeout(wait, batch.wait()).await.is_err() {
            warn!(server_id = %server_id, "batch import did not stop in time, removing anyway");
        }
    }

    with_retry(state.config.store_retry_attempts, "remove_server", || {
        state.servers.remove_server(tenant_id, server_id)
    })
    .await?;

    info!(tenant_id = %tenant_id, server_id = %server_id, server = %server.display_name, "server removed");
    Ok(ServerRemoved {
        display_name: server.display_name,
    })
}

/// Rewinds every cursor of the server and replays its history. An
/// in-flight import is cancelled and awaited first, and the rewind itself
/// happens under the server's gate so no tail pass runs concurrently.
pub async fn reset_server_ingestion(
    state: &AppState,
    tenant_id: &TenantId,
    server_id: &ServerId,
) -> Result<ResetStarted, AppError> {
    let server = require_server(state, tenant_id, server_id).await?;
    let tier = state.tiers.tier_for(tenant_id).await?;
    if !state.tiers.limits_for(&tier).batch_processing_allowed {
        return Err(AppError::Capacity(format!(
            "history replay is not available on the {tier} tier"
        )));
    }

    let slot = state.supervisor.slot(tenant_id, server_id).await;
    if let Some(batch) = slot.take_batch().await {
        if !batch.is_finished() {
            info!(server_id = %server_id, "cancelling in-flight batch import before reset");
            batch.cancel();
            batch.wait().await;
        }
    }

    {
        let _gate = slot.gate.lock().await;
        with_retry(state.config.store_retry_attempts, "reset_parser_states", || {
            state.parser_states.reset_parser_states(tenant_id, server_id)
        })
        .await?;
        with_retry(state.config.store_retry_attempts, "clear_progress", || {
            state.progress.clear_progress(tenant_id, server_id)
        })
        .await?;
    }

    start_batch_import(state, &server).await?;
    info!(tenant_id = %tenant_id, server_id = %server_id, server = %server.display_name, "ingestion reset");
    Ok(ResetStarted {
        display_name: server.display_name,
        ingest_mode: IngestMode::BatchImporting,
    })
}
