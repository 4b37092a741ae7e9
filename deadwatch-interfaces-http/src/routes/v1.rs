use axum::routing::{get, post, put};
use axum::Router;

use deadwatch_application::AppState;

use crate::handlers::{channel_handlers, kill_handlers, ops_handlers, player_handlers, server_handlers};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/tenants/:tenant/servers",
            post(server_handlers::add_server).get(server_handlers::list_servers),
        )
        .route(
            "/v1/tenants/:tenant/servers/:server",
            axum::routing::delete(server_handlers::remove_server),
        )
        .route(
            "/v1/tenants/:tenant/servers/:server/reset",
            post(server_handlers::reset_server),
        )
        .route(
            "/v1/tenants/:tenant/servers/:server/status",
            get(server_handlers::server_status),
        )
        .route(
            "/v1/tenants/:tenant/servers/:server/players/:player",
            get(player_handlers::player_stats),
        )
        .route(
            "/v1/tenants/:tenant/kills/undelivered",
            get(kill_handlers::undelivered_kills),
        )
        .route(
            "/v1/tenants/:tenant/channels",
            put(channel_handlers::bind_channel).delete(channel_handlers::unbind_channel),
        )
        .route("/v1/ops/health/live", get(ops_handlers::health_live))
        .route("/v1/ops/health/ready", get(ops_handlers::health_ready))
        .route(
            "/v1/ops/metrics/prometheus",
            get(ops_handlers::metrics_prometheus),
        )
        .with_state(state)
}
