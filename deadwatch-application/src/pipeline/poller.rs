// Status poller

use std::time::Duration;

use chrono::Utc;
use deadwatch_domain::{apply_status_report, StatusReport, TrackedServer};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::retry::with_retry;
use crate::{AppError, AppState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub online: usize,
    pub offline: usize,
    pub errors: usize,
}

/// Queries every tracked server once. A failing server never stops the
/// cycle for the others.
pub async fn run_status_cycle(state: &AppState) -> Result<PollSummary, AppError> {
    let servers = state.servers.list_all_servers().await?;
    let concurrency = state.config.ingest_concurrency.max(1);
    let results: Vec<Result<bool, AppError>> = stream::iter(servers)
        .map(|server| async move { poll_server(state, &server).await })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut summary = PollSummary::default();
    for result in results {
        match result {
            Ok(true) => summary.online += 1,
            Ok(false) => summary.offline += 1,
            Err(err) => {
                warn!(error = %err, "status update failed");
                summary.errors += 1;
            }
        }
    }
    debug!(
        online = summary.online,
        offline = summary.offline,
        errors = summary.errors,
        "status cycle finished"
    );
    Ok(summary)
}

/// Polls one server and persists the result. Returns whether it is online.
pub async fn poll_server(state: &AppState, server: &TrackedServer) -> Result<bool, AppError> {
    if let Some(slot) = state
        .supervisor
        .existing_slot(&server.tenant_id, &server.server_id)
        .await
    {
        if slot.is_cancelled() {
            return Ok(false);
        }
    }

    let report = query_with_attempts(state, server).await;
    state.metrics.record_status_poll(report.is_some());
    let now = Utc::now();

    let updated = with_retry(state.config.store_retry_attempts, "update_server_status", || {
        let report = report.clone();
        state.servers.update_server(
            &server.tenant_id,
            &server.server_id,
            Box::new(move |tracked: &mut TrackedServer| {
                let transition = apply_status_report(tracked, report.as_ref(), now);
                if transition.came_online {
                    info!(server = %tracked.display_name, restarts = tracked.status.restart_count, "server back online");
                }
                if transition.went_offline {
                    warn!(server = %tracked.display_name, "server went offline");
                }
                if transition.new_peak {
                    info!(server = %tracked.display_name, peak = tracked.stats.peak_players, "new player peak");
                }
            }),
        )
    })
    .await?;

    // Removed while the query was in flight.
    Ok(updated.map(|s| s.status.online).unwrap_or(false))
}

async fn query_with_attempts(state: &AppState, server: &TrackedServer) -> Option<StatusReport> {
    let attempts = state.config.status_query_attempts.max(1);
    let timeout = Duration::from_millis(state.config.status_query_timeout_ms);
    let connection = &server.connection;
    for attempt in 1..=attempts {
        let query = state.status_query.query(
            &connection.host,
            connection.effective_query_port(),
            connection.protocol.as_deref(),
        );
        match tokio::time::timeout(timeout, query).await {
            Ok(Ok(report)) => return Some(report),
            Ok(Err(err)) => {
                warn!(server_id = %server.server_id, attempt, error = %err, "status query failed");
            }
            Err(_) => {
                warn!(server_id = %server.server_id, attempt, "status query timed out");
            }
        }
    }
    None
}
