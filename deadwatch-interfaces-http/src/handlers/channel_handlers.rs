use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use deadwatch_application::commands::channel_commands;
use deadwatch_application::dtos::BindChannelRequest;
use deadwatch_application::AppState;
use deadwatch_domain::{DispatchChannel, ServerId, TenantId};

use crate::error::HttpError;
use crate::middleware::authorize;

#[derive(Deserialize)]
pub struct UnbindQuery {
    pub server_id: Option<String>,
}

pub async fn bind_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant): Path<String>,
    Json(payload): Json<BindChannelRequest>,
) -> Result<Json<DispatchChannel>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let binding = channel_commands::bind_channel(&state, &TenantId::from(tenant), payload).await?;
    Ok(Json(binding))
}

/// Without `server_id` this removes the tenant's catch-all binding.
pub async fn unbind_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant): Path<String>,
    Query(query): Query<UnbindQuery>,
) -> Result<StatusCode, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let server_id = query
        .server_id
        .filter(|id| !id.trim().is_empty())
        .map(ServerId::from);
    channel_commands::unbind_channel(&state, &TenantId::from(tenant), server_id.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}
