use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use deadwatch_application::dtos::UndeliveredKills;
use deadwatch_application::queries::kill_queries;
use deadwatch_application::AppState;
use deadwatch_domain::TenantId;

use crate::error::HttpError;
use crate::middleware::authorize;

pub async fn undelivered_kills(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant): Path<String>,
) -> Result<Json<UndeliveredKills>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let count = kill_queries::list_undelivered_kill_count(&state, &TenantId::from(tenant)).await?;
    Ok(Json(count))
}
