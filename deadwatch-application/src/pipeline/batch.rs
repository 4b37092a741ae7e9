// Historical batch importer
//
// Holds the server's gate for the whole run, so the live tailer cannot
// touch the cursors until the import settles.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use deadwatch_domain::{
    file_name_date,
    IngestMode,
    LogFile,
    ParserCursor,
    ParserProgress,
    ProgressState,
    SourceKind,
    TrackedServer,
};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::ingest::{apply_line, complete_prefix_len, IngestReport, MAX_READ_BYTES};
use super::supervisor::ServerSlot;
use super::task::{TaskError, TaskHandle};
use crate::retry::with_retry;
use crate::{AppError, AppState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub files: u32,
    pub report: IngestReport,
}

/// Spawns a batch import for the server and registers it on the slot.
pub async fn start_batch_import(
    state: &AppState,
    server: &TrackedServer,
) -> Result<TaskHandle<BatchSummary>, AppError> {
    let limits = state.tier_limits(&server.tenant_id).await?;
    let slot = state
        .supervisor
        .slot(&server.tenant_id, &server.server_id)
        .await;
    if slot.is_cancelled() {
        return Err(AppError::NotFound("server not found".to_string()));
    }

    let task_state = state.clone();
    let task_server = server.clone();
    let task_slot = slot.clone();
    let handle = TaskHandle::spawn(slot.cancellation().child_token(), move |cancel| async move {
        run_batch_import(task_state, task_slot, task_server, limits.history_days, cancel).await
    });
    slot.set_batch(handle.clone()).await;
    info!(
        tenant_id = %server.tenant_id,
        server_id = %server.server_id,
        history_days = limits.history_days,
        "batch import scheduled"
    );
    Ok(handle)
}

async fn run_batch_import(
    state: AppState,
    slot: Arc<ServerSlot>,
    server: TrackedServer,
    history_days: u32,
    cancel: CancellationToken,
) -> Result<BatchSummary, TaskError> {
    let _gate = slot.gate.lock().await;
    if cancel.is_cancelled() {
        return Err(TaskError::Cancelled);
    }
    state.supervisor.transition(&slot, IngestMode::BatchImporting).await;

    let mut run = BatchRun::new(&state, &slot, &server, cancel);
    let outcome = run.execute(history_days).await;
    let result = match outcome {
        Ok(()) => run.complete().await,
        Err(TaskError::Cancelled) => run.cancelled().await,
        Err(TaskError::Failed(err)) => run.failed(err).await,
    };
    state.metrics.record_lines(run.summary.report.lines, run.summary.report.skipped);
    result
}

struct BatchRun<'a> {
    state: &'a AppState,
    slot: &'a ServerSlot,
    server: &'a TrackedServer,
    cancel: CancellationToken,
    progress: Option<ParserProgress>,
    summary: BatchSummary,
    last_cursor: Option<ParserCursor>,
    last_flush: Instant,
    records_since_flush: u64,
}

impl<'a> BatchRun<'a> {
    fn new(state: &'a AppState, slot: &'a ServerSlot, server: &'a TrackedServer, cancel: CancellationToken) -> Self {
        Self {
            state,
            slot,
            server,
            cancel,
            progress: None,
            summary: BatchSummary::default(),
            last_cursor: None,
            last_flush: Instant::now(),
            records_since_flush: 0,
        }
    }

    fn attempts(&self) -> u32 {
        self.state.config.store_retry_attempts
    }

    async fn set_auto_tailing(&self, kind: SourceKind, enabled: bool) -> anyhow::Result<()> {
        let (state, server) = (self.state, self.server);
        with_retry(self.attempts(), "set_auto_tailing", || {
            state
                .parser_states
                .set_auto_tailing(&server.tenant_id, &server.server_id, kind, enabled)
        })
        .await
        .map(|_| ())
    }

    async fn execute(&mut self, history_days: u32) -> Result<(), TaskError> {
        for kind in SourceKind::ALL {
            self.set_auto_tailing(kind, false).await?;
        }

        let cutoff = (Utc::now() - chrono::Duration::days(i64::from(history_days))).date_naive();
        let files: Vec<LogFile> = self
            .state
            .log_source
            .list_files(self.server, SourceKind::LogTail)
            .await?
            .into_iter()
            .filter(|file| file_name_date(&file.name).map_or(true, |date| date >= cutoff))
            .collect();

        let bytes_total = files.iter().map(|f| f.size).sum();
        self.progress = Some(ParserProgress::started(
            self.server.tenant_id.clone(),
            self.server.server_id.clone(),
            files.len() as u32,
            bytes_total,
            Utc::now(),
        ));
        self.flush_progress().await;

        for file in &files {
            self.import_file(file).await?;
        }
        Ok(())
    }

    async fn import_file(&mut self, file: &LogFile) -> Result<(), TaskError> {
        let mut offset = 0u64;
        let mut pending: Vec<u8> = Vec::new();
        let mut discarding = false;
        loop {
            if self.cancel.is_cancelled() {
                return Err(TaskError::Cancelled);
            }
            let chunk = self
                .state
                .log_source
                .read_from(self.server, SourceKind::LogTail, &file.name, offset, MAX_READ_BYTES)
                .await?;
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len() as u64;
            pending.extend_from_slice(&chunk);
            if discarding {
                match pending.iter().position(|b| *b == b'\n') {
                    Some(index) => {
                        pending.drain(..=index);
                        discarding = false;
                    }
                    None => pending.clear(),
                }
            }
            let consumed = complete_prefix_len(&pending);
            if consumed == 0 && pending.len() >= MAX_READ_BYTES {
                warn!(
                    server_id = %self.server.server_id,
                    file = %file.name,
                    "line exceeds the read window, skipping it"
                );
                self.summary.report.skipped += 1;
                pending.clear();
                discarding = true;
            }
            let complete: Vec<u8> = pending.drain(..consumed).collect();
            for raw in complete.split_inclusive(|b| *b == b'\n') {
                self.apply(raw).await?;
            }
            if let Some(progress) = self.progress.as_mut() {
                progress.bytes_done += chunk.len() as u64;
            }
            if chunk.len() < MAX_READ_BYTES {
                break;
            }
        }
        // Historical files are complete; an unterminated last line counts.
        if !pending.is_empty() {
            self.apply(&pending).await?;
        }

        self.summary.files += 1;
        if let Some(progress) = self.progress.as_mut() {
            progress.files_done += 1;
        }
        self.last_cursor = Some(ParserCursor::end_of(&file.name, offset));
        self.maybe_flush(true).await;
        Ok(())
    }

    async fn apply(&mut self, raw: &[u8]) -> Result<(), TaskError> {
        if self.cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        let before = self.summary.report.kills_recorded;
        apply_line(self.state, self.server, SourceKind::LogTail, raw, &mut self.summary.report).await;
        if let Some(progress) = self.progress.as_mut() {
            progress.records_processed += 1;
            progress.kills_recorded += self.summary.report.kills_recorded - before;
        }
        self.records_since_flush += 1;
        self.maybe_flush(false).await;
        Ok(())
    }

    /// Progress is persisted on a record or time threshold, not per record.
    async fn maybe_flush(&mut self, file_boundary: bool) {
        let config = &self.state.config;
        let due = self.records_since_flush >= config.progress_update_records
            || self.last_flush.elapsed() >= Duration::from_secs(config.progress_update_seconds);
        if !due && !file_boundary {
            return;
        }
        if let Some(progress) = self.progress.as_mut() {
            progress.status = format!(
                "processed {} records from {}/{} files",
                progress.records_processed, progress.files_done, progress.files_total
            );
        }
        self.flush_progress().await;
    }

    async fn flush_progress(&mut self) {
        self.last_flush = Instant::now();
        self.records_since_flush = 0;
        let Some(progress) = self.progress.as_mut() else {
            return;
        };
        progress.refresh_estimate(Utc::now());
        let snapshot = progress.clone();
        let state = self.state;
        if let Err(err) = with_retry(self.attempts(), "save_progress", || state.progress.save_progress(&snapshot)).await {
            warn!(server_id = %self.server.server_id, error = %err, "failed to save batch progress");
        }
    }

    async fn finish_progress(&mut self, progress_state: ProgressState, status: String) {
        let server = self.server;
        let progress = self.progress.get_or_insert_with(|| {
            ParserProgress::started(server.tenant_id.clone(), server.server_id.clone(), 0, 0, Utc::now())
        });
        progress.state = progress_state;
        progress.status = status;
        self.flush_progress().await;
    }

    /// Hands the cursors back to the live tailer: the kill log resumes after
    /// the last imported file, the event log at the end of its newest file.
    async fn hand_over_cursors(&self) -> anyhow::Result<()> {
        let (state, server) = (self.state, self.server);
        let mut cursors = Vec::new();
        if let Some(cursor) = self.last_cursor.clone() {
            cursors.push((SourceKind::LogTail, cursor));
        }
        let status_files = state.log_source.list_files(server, SourceKind::Status).await?;
        if let Some(newest) = status_files.last() {
            cursors.push((SourceKind::Status, ParserCursor::end_of(&newest.name, newest.size)));
        }
        for (kind, cursor) in cursors {
            let parser = with_retry(self.attempts(), "get_parser_state", || {
                state
                    .parser_states
                    .get_or_create_parser_state(&server.tenant_id, &server.server_id, kind)
            })
            .await?;
            with_retry(self.attempts(), "update_cursor", || {
                state.parser_states.update_cursor(
                    &server.tenant_id,
                    &server.server_id,
                    kind,
                    parser.generation,
                    cursor.clone(),
                )
            })
            .await?;
        }
        Ok(())
    }

    async fn enable_live_tailing(&self) -> anyhow::Result<()> {
        for kind in SourceKind::ALL {
            self.set_auto_tailing(kind, true).await?;
        }
        Ok(())
    }

    async fn complete(&mut self) -> Result<BatchSummary, TaskError> {
        if let Err(err) = self.hand_over_cursors().await {
            return self.failed(err).await;
        }
        if let Err(err) = self.enable_live_tailing().await {
            return self.failed(err).await;
        }
        let report = &self.summary.report;
        let status = format!(
            "completed: {} records, {} kills from {} files",
            report.lines, report.kills_recorded, self.summary.files
        );
        self.finish_progress(ProgressState::Completed, status).await;
        self.state.metrics.record_batch_import(true);
        self.state.supervisor.transition(self.slot, IngestMode::AutoTailing).await;
        info!(
            tenant_id = %self.server.tenant_id,
            server_id = %self.server.server_id,
            files = self.summary.files,
            lines = self.summary.report.lines,
            kills = self.summary.report.kills_recorded,
            duplicates = self.summary.report.duplicates,
            "batch import completed"
        );
        Ok(self.summary.clone())
    }

    async fn cancelled(&mut self) -> Result<BatchSummary, TaskError> {
        // A cancelled slot means the server is gone or the process is stopping.
        if !self.slot.is_cancelled() {
            self.finish_progress(ProgressState::Cancelled, "cancelled".to_string()).await;
        }
        info!(server_id = %self.server.server_id, "batch import cancelled");
        Err(TaskError::Cancelled)
    }

    async fn failed(&mut self, err: anyhow::Error) -> Result<BatchSummary, TaskError> {
        error!(
            tenant_id = %self.server.tenant_id,
            server_id = %self.server.server_id,
            error = %err,
            "batch import failed"
        );
        self.finish_progress(ProgressState::Failed, format!("failed: {err}")).await;
        self.state.metrics.record_batch_import(false);
        // Live data must not stall behind a broken import.
        if let Err(enable_err) = self.enable_live_tailing().await {
            error!(server_id = %self.server.server_id, error = %enable_err, "failed to re-enable auto-tailing");
        }
        self.state.supervisor.transition(self.slot, IngestMode::BatchFailed).await;
        Err(TaskError::Failed(err))
    }
}
