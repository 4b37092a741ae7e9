// Live tailer and the line application shared with the batch importer

use deadwatch_domain::{
    GameEvent,
    IngestMode,
    LogFile,
    ParserCursor,
    PlayerId,
    SourceKind,
    TrackedServer,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::processor::{process_kill, KillOutcome};
use super::supervisor::ServerSlot;
use crate::retry::with_retry;
use crate::{AppError, AppState};

pub(crate) const MAX_READ_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub lines: u64,
    pub kills_recorded: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub failed: u64,
    pub connections: u64,
    pub alerts: u64,
    pub status_lines: u64,
    pub skipped: u64,
}

impl IngestReport {
    pub fn merge(&mut self, other: &IngestReport) {
        self.lines += other.lines;
        self.kills_recorded += other.kills_recorded;
        self.duplicates += other.duplicates;
        self.rejected += other.rejected;
        self.failed += other.failed;
        self.connections += other.connections;
        self.alerts += other.alerts;
        self.status_lines += other.status_lines;
        self.skipped += other.skipped;
    }
}

/// Length of the prefix that ends with a newline.
pub(crate) fn complete_prefix_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|index| index + 1)
        .unwrap_or(0)
}

/// Normalizes one raw line and applies the resulting event.
pub(crate) async fn apply_line(
    state: &AppState,
    server: &TrackedServer,
    kind: SourceKind,
    raw: &[u8],
    report: &mut IngestReport,
) {
    let line = String::from_utf8_lossy(raw);
    report.lines += 1;
    match state.normalizer.normalize(kind, &line) {
        GameEvent::Kill(parsed) => match process_kill(state, server, &parsed).await {
            KillOutcome::Recorded => report.kills_recorded += 1,
            KillOutcome::Duplicate => report.duplicates += 1,
            KillOutcome::Rejected => report.rejected += 1,
            KillOutcome::Failed => report.failed += 1,
        },
        GameEvent::Connection(event) => {
            let Some(player_id) = PlayerId::resolve(event.player_id.as_deref(), &event.player_name) else {
                report.skipped += 1;
                return;
            };
            let applied = with_retry(state.config.store_retry_attempts, "apply_connection", || {
                state
                    .players
                    .apply_connection(&server.tenant_id, &server.server_id, &player_id, &event)
            })
            .await;
            match applied {
                Ok(()) => report.connections += 1,
                Err(err) => {
                    error!(server_id = %server.server_id, error = %err, "failed to apply connection event");
                    state.metrics.record_store_failure();
                    report.failed += 1;
                }
            }
        }
        GameEvent::MissionAlert(alert) => {
            debug!(
                server_id = %server.server_id,
                kind = ?alert.kind,
                name = ?alert.name,
                location = ?alert.location,
                "mission alert"
            );
            report.alerts += 1;
        }
        GameEvent::StatusLine(status) => {
            info!(server_id = %server.server_id, lifecycle = ?status.lifecycle, "server lifecycle event");
            report.status_lines += 1;
        }
        GameEvent::Unrecognized { reason } => {
            debug!(server_id = %server.server_id, kind = %kind, reason = %reason, "skipping line");
            report.skipped += 1;
        }
    }
}

/// One live-tail pass over both sources of a server. Skips the server if
/// another reader currently holds its slot.
pub async fn run_tail_cycle(state: &AppState, server: &TrackedServer) -> Result<IngestReport, AppError> {
    let slot = state
        .supervisor
        .slot(&server.tenant_id, &server.server_id)
        .await;
    if slot.is_cancelled() {
        return Ok(IngestReport::default());
    }
    let Ok(_gate) = slot.gate.try_lock() else {
        debug!(server_id = %server.server_id, "ingestion busy, skipping tail cycle");
        return Ok(IngestReport::default());
    };

    // Re-read under the gate so a concurrently removed server is not revived.
    let Some(server) = state
        .servers
        .get_server(&server.tenant_id, &server.server_id)
        .await?
    else {
        return Ok(IngestReport::default());
    };

    let mut report = IngestReport::default();
    for kind in SourceKind::ALL {
        if slot.is_cancelled() {
            break;
        }
        let source_report = tail_source(state, &slot, &server, kind).await?;
        report.merge(&source_report);
    }
    state.metrics.record_lines(report.lines, report.skipped);
    if report.lines > 0 {
        debug!(
            server_id = %server.server_id,
            lines = report.lines,
            kills = report.kills_recorded,
            skipped = report.skipped,
            "tail cycle finished"
        );
    }
    Ok(report)
}

async fn tail_source(
    state: &AppState,
    slot: &ServerSlot,
    server: &TrackedServer,
    kind: SourceKind,
) -> Result<IngestReport, AppError> {
    let tenant_id = &server.tenant_id;
    let server_id = &server.server_id;
    let attempts = state.config.store_retry_attempts;

    let parser = with_retry(attempts, "get_parser_state", || {
        state
            .parser_states
            .get_or_create_parser_state(tenant_id, server_id, kind)
    })
    .await?;
    if !parser.auto_tailing_enabled {
        return Ok(IngestReport::default());
    }
    if kind == SourceKind::LogTail && slot.mode().await == IngestMode::Idle {
        state.supervisor.transition(slot, IngestMode::AutoTailing).await;
    }

    let files = state.log_source.list_files(server, kind).await?;
    let plan = tail_plan(&files, &parser.cursor, server, kind);
    let mut report = IngestReport::default();
    let mut cursor = parser.cursor.clone();
    let last_index = plan.len().saturating_sub(1);

    for (index, (file, start)) in plan.into_iter().enumerate() {
        let is_newest = index == last_index;
        cursor = ParserCursor {
            file: Some(file.name.clone()),
            offset: start,
        };
        // Set while the rest of an over-long line is being dropped.
        let mut discarding = false;
        loop {
            if slot.is_cancelled() {
                return Ok(report);
            }
            let chunk = state
                .log_source
                .read_from(server, kind, &file.name, cursor.offset, MAX_READ_BYTES)
                .await?;
            let reached_end = chunk.len() < MAX_READ_BYTES;
            let offset_before = cursor.offset;
            let mut window = chunk.as_slice();
            if discarding {
                let tail = window
                    .iter()
                    .position(|b| *b == b'\n')
                    .map(|index| index + 1)
                    .unwrap_or(window.len());
                discarding = tail == window.len() && window.last() != Some(&b'\n');
                cursor.offset += tail as u64;
                window = &window[tail..];
            }
            let consumed = match complete_prefix_len(window) {
                // A rotated-out file will not grow: its last line is final.
                0 if reached_end && !is_newest => window.len(),
                n => n,
            };
            if consumed == 0 && window.len() == MAX_READ_BYTES {
                warn!(
                    server_id = %server.server_id,
                    kind = %kind,
                    file = %file.name,
                    offset = cursor.offset,
                    "line exceeds the read window, skipping it"
                );
                report.skipped += 1;
                cursor.offset += window.len() as u64;
                discarding = true;
            }
            for raw in window[..consumed].split_inclusive(|b| *b == b'\n') {
                if slot.is_cancelled() {
                    persist_cursor(state, server, kind, parser.generation, &cursor).await?;
                    return Ok(report);
                }
                apply_line(state, server, kind, raw, &mut report).await;
                cursor.offset += raw.len() as u64;
            }
            if cursor.offset != offset_before
                && !persist_cursor(state, server, kind, parser.generation, &cursor).await?
            {
                return Ok(report);
            }
            if reached_end {
                break;
            }
        }
    }

    if cursor != parser.cursor {
        persist_cursor(state, server, kind, parser.generation, &cursor).await?;
    }
    Ok(report)
}

/// Files to read with their start offsets. The cursor's own file is
/// drained first, followed by any newer file from its start. Without a
/// usable cursor only the newest file is followed.
fn tail_plan(files: &[LogFile], cursor: &ParserCursor, server: &TrackedServer, kind: SourceKind) -> Vec<(LogFile, u64)> {
    let Some(newest) = files.last() else {
        return Vec::new();
    };
    let position = cursor
        .file
        .as_ref()
        .and_then(|name| files.iter().position(|f| &f.name == name));
    match position {
        Some(index) => {
            let current = &files[index];
            let start = if current.size < cursor.offset {
                warn!(
                    server_id = %server.server_id,
                    kind = %kind,
                    file = %current.name,
                    "log file shrank, restarting it from the beginning"
                );
                0
            } else {
                cursor.offset
            };
            let mut plan = vec![(current.clone(), start)];
            plan.extend(files[index + 1..].iter().map(|f| (f.clone(), 0)));
            plan
        }
        None => vec![(newest.clone(), 0)],
    }
}

async fn persist_cursor(
    state: &AppState,
    server: &TrackedServer,
    kind: SourceKind,
    generation: u64,
    cursor: &ParserCursor,
) -> Result<bool, AppError> {
    let written = with_retry(state.config.store_retry_attempts, "update_cursor", || {
        state.parser_states.update_cursor(
            &server.tenant_id,
            &server.server_id,
            kind,
            generation,
            cursor.clone(),
        )
    })
    .await?;
    if !written {
        warn!(
            server_id = %server.server_id,
            kind = %kind,
            "cursor was reset while tailing, discarding position"
        );
    }
    Ok(written)
}
