// Shared fixtures for the application integration tests
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use deadwatch_application::dtos::AddServerRequest;
use deadwatch_application::pipeline::{BatchSummary, IngestionSupervisor, TaskOutcome};
use deadwatch_application::{AppState, Metrics};
use deadwatch_domain::ports::{LogSource, NotificationChannel, StatusQuery};
use deadwatch_domain::services::LineNormalizer;
use deadwatch_domain::{
    LogAccess,
    LogFile,
    RuntimeConfig,
    ServerId,
    SourceKind,
    StatusReport,
    TenantId,
    TierLevel,
    TrackedServer,
};
use deadwatch_infrastructure::{RedbStore, YamlTierLimits};

/// In-memory log directories keyed by the server's log path.
#[derive(Default)]
pub struct MemoryLogSource {
    files: Mutex<HashMap<(String, SourceKind), BTreeMap<String, Vec<u8>>>>,
}

impl MemoryLogSource {
    fn dir(server: &TrackedServer) -> String {
        server
            .connection
            .log_path
            .clone()
            .unwrap_or_else(|| server.server_id.to_string())
    }

    pub fn write(&self, dir: &str, kind: SourceKind, file: &str, content: &str) {
        let mut files = self.files.lock().unwrap();
        files
            .entry((dir.to_string(), kind))
            .or_default()
            .insert(file.to_string(), content.as_bytes().to_vec());
    }

    pub fn append(&self, dir: &str, kind: SourceKind, file: &str, content: &str) {
        let mut files = self.files.lock().unwrap();
        files
            .entry((dir.to_string(), kind))
            .or_default()
            .entry(file.to_string())
            .or_default()
            .extend_from_slice(content.as_bytes());
    }
}

#[async_trait]
impl LogSource for MemoryLogSource {
    async fn list_files(&self, server: &TrackedServer, kind: SourceKind) -> Result<Vec<LogFile>> {
        let files = self.files.lock().unwrap();
        Ok(files
            .get(&(Self::dir(server), kind))
            .map(|dir| {
                dir.iter()
                    .map(|(name, bytes)| LogFile {
                        name: name.clone(),
                        size: bytes.len() as u64,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_from(
        &self,
        server: &TrackedServer,
        kind: SourceKind,
        file: &str,
        offset: u64,
        max_bytes: usize,
    ) -> Result<Vec<u8>> {
        let files = self.files.lock().unwrap();
        let bytes = files
            .get(&(Self::dir(server), kind))
            .and_then(|dir| dir.get(file))
            .ok_or_else(|| anyhow!("no such file: {file}"))?;
        let start = (offset as usize).min(bytes.len());
        let end = start.saturating_add(max_bytes).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }
}

pub enum StatusScript {
    Online(StatusReport),
    Hang,
    Fail,
}

/// Answers status queries from a script; the last entry repeats.
pub struct ScriptedStatusQuery {
    script: Mutex<VecDeque<StatusScript>>,
    calls: AtomicU32,
}

impl ScriptedStatusQuery {
    pub fn new(script: Vec<StatusScript>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn online(players: u32) -> StatusScript {
        StatusScript::Online(StatusReport {
            online: true,
            name: Some("Test Server".to_string()),
            map: Some("chernarus".to_string()),
            players_online: players,
            players_max: 60,
            version: Some("1.25".to_string()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Option<StatusScript> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            return script.pop_front();
        }
        script.front().map(|entry| match entry {
            StatusScript::Online(report) => StatusScript::Online(report.clone()),
            StatusScript::Hang => StatusScript::Hang,
            StatusScript::Fail => StatusScript::Fail,
        })
    }
}

#[async_trait]
impl StatusQuery for ScriptedStatusQuery {
    async fn query(&self, _host: &str, _port: u16, _protocol: Option<&str>) -> Result<StatusReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next() {
            Some(StatusScript::Online(report)) => Ok(report),
            Some(StatusScript::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(anyhow!("hung query returned"))
            }
            Some(StatusScript::Fail) | None => Err(anyhow!("connection refused")),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn send(&self, destination_id: &str, message: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("channel unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination_id.to_string(), message.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub logs: Arc<MemoryLogSource>,
    pub status: Arc<ScriptedStatusQuery>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        status_query_timeout_ms: 50,
        status_query_attempts: 2,
        store_retry_attempts: 1,
        channel_timeout_seconds: 1,
        server_task_timeout_seconds: 5,
        ..RuntimeConfig::default()
    }
}

pub fn harness(tiers: &[(&str, &str)], status: Vec<StatusScript>) -> Harness {
    let store = RedbStore::open_in_memory().unwrap();
    let tier_limits = tiers
        .iter()
        .fold(YamlTierLimits::default(), |limits, (tenant, tier)| {
            limits.assign(&TenantId::from(*tenant), TierLevel::new(*tier))
        });
    let logs = Arc::new(MemoryLogSource::default());
    let status = Arc::new(ScriptedStatusQuery::new(status));
    let notifier = Arc::new(RecordingNotifier::default());

    let state = AppState {
        config: test_config(),
        servers: Arc::new(store.clone()),
        parser_states: Arc::new(store.clone()),
        progress: Arc::new(store.clone()),
        players: Arc::new(store.clone()),
        kills: Arc::new(store.clone()),
        channels: Arc::new(store),
        status_query: status.clone(),
        log_source: logs.clone(),
        notifier: notifier.clone(),
        tiers: Arc::new(tier_limits),
        normalizer: Arc::new(LineNormalizer::new().unwrap()),
        metrics: Arc::new(Metrics::default()),
        supervisor: Arc::new(IngestionSupervisor::new()),
    };
    Harness {
        state,
        logs,
        status,
        notifier,
    }
}

pub fn add_request(name: &str, log_path: &str) -> AddServerRequest {
    AddServerRequest {
        display_name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port: 2302,
        query_port: Some(27016),
        protocol: None,
        username: None,
        password: None,
        log_path: Some(log_path.to_string()),
        log_access: LogAccess::Local,
        sftp_port: None,
    }
}

pub fn kill_line(minute: u32, killer: (&str, &str), victim: (&str, &str), weapon: &str, distance: u32) -> String {
    format!(
        "2024.03.01-12.{minute:02}.00;{};{};{};{};{weapon};{distance};;chernarus\n",
        killer.0, killer.1, victim.0, victim.1
    )
}

pub const ALICE: (&str, &str) = ("Alice", "76561198000000001");
pub const BOB: (&str, &str) = ("Bob", "76561198000000002");
pub const CHARLIE: (&str, &str) = ("Charlie", "76561198000000003");

/// Waits for the server's current batch import to settle.
pub async fn wait_for_batch(state: &AppState, tenant_id: &TenantId, server_id: &ServerId) -> TaskOutcome<BatchSummary> {
    let slot = state.supervisor.slot(tenant_id, server_id).await;
    let handle = slot.batch().await.expect("a batch import was scheduled");
    tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("batch import settles")
}

pub async fn load_server(state: &AppState, tenant_id: &TenantId, server_id: &ServerId) -> TrackedServer {
    state
        .servers
        .get_server(tenant_id, server_id)
        .await
        .unwrap()
        .expect("server exists")
}
