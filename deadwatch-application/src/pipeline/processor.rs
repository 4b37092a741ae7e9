// Kill event processor

use chrono::Utc;
use deadwatch_domain::{KillEvent, ParsedKill, PlayerId, RecordOutcome, TrackedServer};
use tracing::{debug, error, warn};

use crate::retry::with_retry;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    Recorded,
    Duplicate,
    /// An identity could not be resolved; the line is consumed anyway.
    Rejected,
    /// The store kept failing after retries.
    Failed,
}

pub async fn process_kill(state: &AppState, server: &TrackedServer, parsed: &ParsedKill) -> KillOutcome {
    let killer_id = PlayerId::resolve(parsed.killer_id.as_deref(), &parsed.killer_name);
    let victim_id = PlayerId::resolve(parsed.victim_id.as_deref(), &parsed.victim_name);
    let (Some(killer_id), Some(victim_id)) = (killer_id, victim_id) else {
        warn!(
            tenant_id = %server.tenant_id,
            server_id = %server.server_id,
            timestamp = %parsed.timestamp,
            "kill line without a resolvable player identity, skipping"
        );
        state.metrics.record_kill_rejected();
        return KillOutcome::Rejected;
    };

    let event = KillEvent::from_parsed(
        server.tenant_id.clone(),
        server.server_id.clone(),
        killer_id,
        victim_id,
        parsed,
        Utc::now(),
    );

    let recorded = with_retry(state.config.store_retry_attempts, "record_kill", || {
        state.kills.record_kill(&event)
    })
    .await;

    match recorded {
        Ok(RecordOutcome::Recorded) => {
            state.metrics.record_kill_recorded();
            KillOutcome::Recorded
        }
        Ok(RecordOutcome::Duplicate) => {
            debug!(
                server_id = %server.server_id,
                dedup_key = %event.dedup_key,
                "kill already recorded"
            );
            state.metrics.record_kill_duplicate();
            KillOutcome::Duplicate
        }
        Err(err) => {
            error!(
                tenant_id = %server.tenant_id,
                server_id = %server.server_id,
                error = %err,
                "failed to record kill"
            );
            state.metrics.record_store_failure();
            KillOutcome::Failed
        }
    }
}
