use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use deadwatch_application::commands::server_commands;
use deadwatch_application::dtos::{
    AddServerRequest,
    ResetStarted,
    ServerAdded,
    ServerRemoved,
    ServerStatusView,
    ServerSummary,
};
use deadwatch_application::queries::server_queries;
use deadwatch_application::AppState;
use deadwatch_domain::{ServerId, TenantId};

use crate::error::HttpError;
use crate::middleware::authorize;

pub async fn add_server(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant): Path<String>,
    Json(payload): Json<AddServerRequest>,
) -> Result<(StatusCode, Json<ServerAdded>), HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let added = server_commands::add_server(&state, &TenantId::from(tenant), payload).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

pub async fn list_servers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant): Path<String>,
) -> Result<Json<Vec<ServerSummary>>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let servers = server_queries::list_servers(&state, &TenantId::from(tenant)).await?;
    Ok(Json(servers))
}

pub async fn remove_server(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((tenant, server)): Path<(String, String)>,
) -> Result<Json<ServerRemoved>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let removed =
        server_commands::remove_server(&state, &TenantId::from(tenant), &ServerId::from(server)).await?;
    Ok(Json(removed))
}

pub async fn reset_server(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((tenant, server)): Path<(String, String)>,
) -> Result<(StatusCode, Json<ResetStarted>), HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let started = server_commands::reset_server_ingestion(
        &state,
        &TenantId::from(tenant),
        &ServerId::from(server),
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}

pub async fn server_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((tenant, server)): Path<(String, String)>,
) -> Result<Json<ServerStatusView>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let view =
        server_queries::get_server_status(&state, &TenantId::from(tenant), &ServerId::from(server)).await?;
    Ok(Json(view))
}
