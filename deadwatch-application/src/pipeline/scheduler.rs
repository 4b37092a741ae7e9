// Periodic pipeline scheduler: one status loop, one ingestion loop and one
// dispatch loop, each stopped through a shared cancellation token.

use std::future::Future;
use std::time::Duration;

use deadwatch_domain::{SourceKind, TrackedServer};
use futures_util::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::batch::start_batch_import;
use super::dispatcher::run_dispatch_cycle;
use super::ingest::run_tail_cycle;
use super::poller::run_status_cycle;
use crate::retry::with_retry;
use crate::{AppError, AppState};

pub struct PipelineHandle {
    shutdown: CancellationToken,
    loops: Vec<JoinHandle<()>>,
    state: AppState,
}

impl PipelineHandle {
    /// Stops the loops, then cancels per-server work and waits for running
    /// batch imports to settle.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.loops {
            if let Err(err) = handle.await {
                warn!(error = %err, "pipeline loop ended abnormally");
            }
        }
        self.state.supervisor.shutdown();
        for batch in self.state.supervisor.active_batches().await {
            batch.wait().await;
        }
        info!("pipeline stopped");
    }
}

pub async fn start_pipeline(state: AppState, shutdown: CancellationToken) -> PipelineHandle {
    if let Err(err) = resume_interrupted_imports(&state).await {
        error!(error = %err, "failed to resume interrupted imports");
    }

    let config = &state.config;
    let loops = vec![
        spawn_loop(
            "status",
            Duration::from_secs(config.status_poll_interval_seconds.max(1)),
            shutdown.clone(),
            state.clone(),
            |state| async move {
                if let Err(err) = run_status_cycle(&state).await {
                    warn!(error = %err, "status cycle failed");
                }
            },
        ),
        spawn_loop(
            "ingest",
            Duration::from_secs(config.ingest_interval_seconds.max(1)),
            shutdown.clone(),
            state.clone(),
            |state| async move {
                if let Err(err) = run_ingest_cycle(&state).await {
                    warn!(error = %err, "ingest cycle failed");
                }
            },
        ),
        spawn_loop(
            "dispatch",
            Duration::from_secs(config.dispatch_interval_seconds.max(1)),
            shutdown.clone(),
            state.clone(),
            |state| async move {
                match run_dispatch_cycle(&state).await {
                    Ok(summary) if summary.messages_sent > 0 || summary.failures > 0 => debug!(
                        sent = summary.messages_sent,
                        kills = summary.kills_dispatched,
                        failures = summary.failures,
                        "dispatch cycle finished"
                    ),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "dispatch cycle failed"),
                }
            },
        ),
    ];
    info!("pipeline started");

    PipelineHandle {
        shutdown,
        loops,
        state,
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    state: AppState,
    cycle: F,
) -> JoinHandle<()>
where
    F: Fn(AppState) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(loop_name = name, "pipeline loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    cycle(state.clone()).await;
                }
            }
        }
    })
}

/// Tails every server with bounded concurrency and a per-server timeout.
pub async fn run_ingest_cycle(state: &AppState) -> Result<(), AppError> {
    let servers = state.servers.list_all_servers().await?;
    let timeout = Duration::from_secs(state.config.server_task_timeout_seconds.max(1));
    stream::iter(servers)
        .for_each_concurrent(state.config.ingest_concurrency.max(1), |server| async move {
            match tokio::time::timeout(timeout, run_tail_cycle(state, &server)).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    warn!(server_id = %server.server_id, error = %err, "tail cycle failed");
                }
                Err(_) => {
                    warn!(server_id = %server.server_id, "tail cycle timed out");
                }
            }
        })
        .await;
    Ok(())
}

/// Servers whose kill log is not auto-tailing at startup were interrupted
/// mid-import (or never finished one). Restart their import, or hand them
/// straight to the tailer when their tier has no batch processing.
async fn resume_interrupted_imports(state: &AppState) -> Result<(), AppError> {
    for server in state.servers.list_all_servers().await? {
        let parser = with_retry(state.config.store_retry_attempts, "get_parser_state", || {
            state.parser_states.get_or_create_parser_state(
                &server.tenant_id,
                &server.server_id,
                SourceKind::LogTail,
            )
        })
        .await?;
        if parser.auto_tailing_enabled {
            continue;
        }
        if let Err(err) = resume_server(state, &server).await {
            warn!(server_id = %server.server_id, error = %err, "could not resume ingestion");
        }
    }
    Ok(())
}

async fn resume_server(state: &AppState, server: &TrackedServer) -> Result<(), AppError> {
    let limits = state.tier_limits(&server.tenant_id).await?;
    if limits.batch_processing_allowed {
        info!(server = %server.display_name, "restarting interrupted batch import");
        start_batch_import(state, server).await?;
    } else {
        for kind in SourceKind::ALL {
            state
                .parser_states
                .set_auto_tailing(&server.tenant_id, &server.server_id, kind, true)
                .await?;
        }
    }
    Ok(())
}
