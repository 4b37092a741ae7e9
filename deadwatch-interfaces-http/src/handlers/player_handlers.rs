use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use deadwatch_application::queries::player_queries;
use deadwatch_application::AppState;
use deadwatch_domain::{PlayerStatAggregate, ServerId, TenantId};

use crate::error::HttpError;
use crate::middleware::authorize;

/// `player` may be a platform id or a display name.
pub async fn player_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((tenant, server, player)): Path<(String, String, String)>,
) -> Result<Json<PlayerStatAggregate>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let stats = player_queries::get_player_stats(
        &state,
        &TenantId::from(tenant),
        &ServerId::from(server),
        &player,
    )
    .await?;
    Ok(Json(stats))
}
