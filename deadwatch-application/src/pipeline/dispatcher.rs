// Kill-feed dispatcher

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use deadwatch_domain::{plan_feed, routable_servers, FeedBatch, TenantId};
use tracing::{debug, error, warn};

use crate::retry::with_retry;
use crate::{AppError, AppState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub messages_sent: usize,
    pub kills_dispatched: usize,
    pub failures: usize,
}

impl DispatchSummary {
    fn merge(&mut self, other: DispatchSummary) {
        self.messages_sent += other.messages_sent;
        self.kills_dispatched += other.kills_dispatched;
        self.failures += other.failures;
    }
}

/// Dispatches every tenant's pending kills. Tenants are independent: an
/// error for one is logged and the cycle moves on.
pub async fn run_dispatch_cycle(state: &AppState) -> Result<DispatchSummary, AppError> {
    let tenants: BTreeSet<TenantId> = state
        .servers
        .list_all_servers()
        .await?
        .into_iter()
        .map(|server| server.tenant_id)
        .collect();

    let mut summary = DispatchSummary::default();
    for tenant_id in tenants {
        match dispatch_tenant(state, &tenant_id).await {
            Ok(tenant_summary) => summary.merge(tenant_summary),
            Err(err) => {
                error!(tenant_id = %tenant_id, error = %err, "kill feed dispatch failed");
                summary.failures += 1;
            }
        }
    }
    Ok(summary)
}

/// Sends one batch of the tenant's pending kills. Only kills that resolve
/// to a destination are picked up; the rest wait for a binding without
/// holding back the routable ones.
pub async fn dispatch_tenant(state: &AppState, tenant_id: &TenantId) -> Result<DispatchSummary, AppError> {
    let bindings = state.channels.list_channels(tenant_id).await?;
    let routable = routable_servers(&bindings, tenant_id);
    if routable.as_ref().is_some_and(|servers| servers.is_empty()) {
        return Ok(DispatchSummary::default());
    }

    let kills = state
        .kills
        .list_undispatched(tenant_id, routable.as_ref(), state.config.dispatch_batch_size.max(1))
        .await?;
    if kills.is_empty() {
        return Ok(DispatchSummary::default());
    }

    let server_names: HashMap<_, _> = state
        .servers
        .list_servers(tenant_id)
        .await?
        .into_iter()
        .map(|server| (server.server_id, server.display_name))
        .collect();

    let plan = plan_feed(&kills, &bindings, &server_names);
    let planned: usize = plan.iter().map(FeedBatch::kill_count).sum();
    if planned < kills.len() {
        debug!(
            tenant_id = %tenant_id,
            waiting = kills.len() - planned,
            "kills without a destination stay queued"
        );
    }

    let mut summary = DispatchSummary::default();
    for batch in plan {
        match deliver(state, tenant_id, &batch).await {
            Ok(marked) => {
                summary.messages_sent += 1;
                summary.kills_dispatched += marked;
            }
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    channel = %batch.channel_id,
                    error = %err,
                    "kill feed delivery failed, will retry next cycle"
                );
                summary.failures += 1;
            }
        }
    }
    Ok(summary)
}

async fn deliver(state: &AppState, tenant_id: &TenantId, batch: &FeedBatch) -> anyhow::Result<usize> {
    let message = batch.render();
    let timeout = Duration::from_secs(state.config.channel_timeout_seconds.max(1));
    match tokio::time::timeout(timeout, state.notifier.send(&batch.channel_id, &message)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            state.metrics.record_feed_failed();
            return Err(err);
        }
        Err(_) => {
            state.metrics.record_feed_failed();
            anyhow::bail!("channel send timed out");
        }
    }

    let ids = batch.kill_ids();
    let marked = with_retry(state.config.store_retry_attempts, "mark_dispatched", || {
        state.kills.mark_dispatched(tenant_id, &ids)
    })
    .await;
    match marked {
        Ok(count) => {
            state.metrics.record_feed_sent(count);
            Ok(count)
        }
        Err(err) => {
            // Sent but not marked: these kills will be announced again.
            error!(tenant_id = %tenant_id, error = %err, "failed to mark kills dispatched");
            state.metrics.record_store_failure();
            Err(err)
        }
    }
}
