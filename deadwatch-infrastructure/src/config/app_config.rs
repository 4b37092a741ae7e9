use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use deadwatch_domain::RuntimeConfig;

use super::validation::validate_channel;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub api_token: Option<String>,
    pub state_path: String,
    pub log_root: String,
    /// Connect and I/O timeout for SFTP log reads.
    pub sftp_timeout_seconds: u64,
    pub tiers_path: String,
    pub status_poll_interval_seconds: u64,
    pub ingest_interval_seconds: u64,
    pub dispatch_interval_seconds: u64,
    pub status_query_timeout_ms: u64,
    pub status_query_attempts: u32,
    pub dispatch_batch_size: usize,
    pub ingest_concurrency: usize,
    pub server_task_timeout_seconds: u64,
    pub progress_update_seconds: u64,
    pub progress_update_records: u64,
    pub stalled_batch_seconds: i64,
    pub store_retry_attempts: u32,
    pub channel_timeout_seconds: u64,
    pub channel_token: Option<String>,
    /// Destination id to webhook or websocket URL.
    pub channels: BTreeMap<String, String>,
    pub log_dir: Option<String>,
    pub log_json: bool,
    pub request_timeout_seconds: u64,
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            bind_addr: runtime.bind_addr,
            api_token: None,
            state_path: "./deadwatch.redb".to_string(),
            log_root: "./logs".to_string(),
            sftp_timeout_seconds: 15,
            tiers_path: "./tiers.yaml".to_string(),
            status_poll_interval_seconds: runtime.status_poll_interval_seconds,
            ingest_interval_seconds: runtime.ingest_interval_seconds,
            dispatch_interval_seconds: runtime.dispatch_interval_seconds,
            status_query_timeout_ms: runtime.status_query_timeout_ms,
            status_query_attempts: runtime.status_query_attempts,
            dispatch_batch_size: runtime.dispatch_batch_size,
            ingest_concurrency: runtime.ingest_concurrency,
            server_task_timeout_seconds: runtime.server_task_timeout_seconds,
            progress_update_seconds: runtime.progress_update_seconds,
            progress_update_records: runtime.progress_update_records,
            stalled_batch_seconds: runtime.stalled_batch_seconds,
            store_retry_attempts: runtime.store_retry_attempts,
            channel_timeout_seconds: runtime.channel_timeout_seconds,
            channel_token: None,
            channels: BTreeMap::new(),
            log_dir: None,
            log_json: false,
            request_timeout_seconds: runtime.request_timeout_seconds,
            max_body_bytes: runtime.max_body_bytes,
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        Self::load_from(None).await
    }

    /// Loads `path`, or `$DEADWATCH_CONFIG`, or `./config.toml`. A missing
    /// file falls back to defaults.
    pub async fn load_from(path: Option<&str>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_string(),
            None => env::var("DEADWATCH_CONFIG").unwrap_or_else(|_| "./config.toml".to_string()),
        };
        let file_path = Path::new(&path);
        let base_dir = file_path.parent();
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path).await?;
            Self::from_toml(&content)?
        } else {
            warn!(path = %path, "config file not found, using defaults");
            AppConfig::default()
        };
        config.apply_env_overrides();
        config.resolve_paths(base_dir);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| anyhow!("invalid config: {}", err))
    }

    pub fn normalize(&mut self) {
        self.api_token = non_blank(self.api_token.take());
        self.channel_token = non_blank(self.channel_token.take());
        self.log_dir = non_blank(self.log_dir.take());
        self.channels = std::mem::take(&mut self.channels)
            .into_iter()
            .map(|(id, url)| (id.trim().to_string(), url.trim().to_string()))
            .filter(|(id, url)| !id.is_empty() && !url.is_empty())
            .collect();
    }

    fn resolve_paths(&mut self, base_dir: Option<&Path>) {
        let Some(base) = base_dir else {
            return;
        };
        self.state_path = resolve_path(base, &self.state_path);
        self.log_root = resolve_path(base, &self.log_root);
        self.tiers_path = resolve_path(base, &self.tiers_path);
        if let Some(log_dir) = &self.log_dir {
            self.log_dir = Some(resolve_path(base, log_dir));
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| anyhow!("invalid bind_addr: {}", err))?;
        if self.state_path.trim().is_empty() {
            return Err(anyhow!("state_path must not be empty"));
        }
        if self.log_root.trim().is_empty() {
            return Err(anyhow!("log_root must not be empty"));
        }
        let intervals = [
            ("status_poll_interval_seconds", self.status_poll_interval_seconds),
            ("ingest_interval_seconds", self.ingest_interval_seconds),
            ("dispatch_interval_seconds", self.dispatch_interval_seconds),
            ("status_query_timeout_ms", self.status_query_timeout_ms),
            ("server_task_timeout_seconds", self.server_task_timeout_seconds),
            ("channel_timeout_seconds", self.channel_timeout_seconds),
            ("sftp_timeout_seconds", self.sftp_timeout_seconds),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(anyhow!("{} must be greater than 0", name));
            }
        }
        if self.status_query_attempts == 0 || self.store_retry_attempts == 0 {
            return Err(anyhow!("attempt counts must be greater than 0"));
        }
        if self.dispatch_batch_size == 0 || self.ingest_concurrency == 0 {
            return Err(anyhow!("dispatch_batch_size and ingest_concurrency must be greater than 0"));
        }
        if self.max_body_bytes == 0 {
            return Err(anyhow!("max_body_bytes must be greater than 0"));
        }
        for (id, url) in &self.channels {
            validate_channel(id, url)?;
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: self.bind_addr.clone(),
            api_token: self.api_token.clone(),
            status_poll_interval_seconds: self.status_poll_interval_seconds,
            ingest_interval_seconds: self.ingest_interval_seconds,
            dispatch_interval_seconds: self.dispatch_interval_seconds,
            status_query_timeout_ms: self.status_query_timeout_ms,
            status_query_attempts: self.status_query_attempts,
            dispatch_batch_size: self.dispatch_batch_size,
            ingest_concurrency: self.ingest_concurrency,
            server_task_timeout_seconds: self.server_task_timeout_seconds,
            progress_update_seconds: self.progress_update_seconds,
            progress_update_records: self.progress_update_records,
            store_retry_attempts: self.store_retry_attempts,
            channel_timeout_seconds: self.channel_timeout_seconds,
            stalled_batch_seconds: self.stalled_batch_seconds,
            request_timeout_seconds: self.request_timeout_seconds,
            max_body_bytes: self.max_body_bytes,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("DEADWATCH_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Ok(value) = env::var("DEADWATCH_API_TOKEN") {
            self.api_token = Some(value);
        }
        if let Ok(value) = env::var("DEADWATCH_STATE_PATH") {
            self.state_path = value;
        }
        if let Ok(value) = env::var("DEADWATCH_LOG_ROOT") {
            self.log_root = value;
        }
        override_parsed("DEADWATCH_SFTP_TIMEOUT_SECONDS", &mut self.sftp_timeout_seconds);
        if let Ok(value) = env::var("DEADWATCH_TIERS_PATH") {
            self.tiers_path = value;
        }
        override_parsed("DEADWATCH_STATUS_POLL_INTERVAL_SECONDS", &mut self.status_poll_interval_seconds);
        override_parsed("DEADWATCH_INGEST_INTERVAL_SECONDS", &mut self.ingest_interval_seconds);
        override_parsed("DEADWATCH_DISPATCH_INTERVAL_SECONDS", &mut self.dispatch_interval_seconds);
        override_parsed("DEADWATCH_STATUS_QUERY_TIMEOUT_MS", &mut self.status_query_timeout_ms);
        override_parsed("DEADWATCH_STATUS_QUERY_ATTEMPTS", &mut self.status_query_attempts);
        override_parsed("DEADWATCH_DISPATCH_BATCH_SIZE", &mut self.dispatch_batch_size);
        override_parsed("DEADWATCH_INGEST_CONCURRENCY", &mut self.ingest_concurrency);
        override_parsed("DEADWATCH_SERVER_TASK_TIMEOUT_SECONDS", &mut self.server_task_timeout_seconds);
        override_parsed("DEADWATCH_PROGRESS_UPDATE_SECONDS", &mut self.progress_update_seconds);
        override_parsed("DEADWATCH_PROGRESS_UPDATE_RECORDS", &mut self.progress_update_records);
        override_parsed("DEADWATCH_STALLED_BATCH_SECONDS", &mut self.stalled_batch_seconds);
        override_parsed("DEADWATCH_STORE_RETRY_ATTEMPTS", &mut self.store_retry_attempts);
        override_parsed("DEADWATCH_CHANNEL_TIMEOUT_SECONDS", &mut self.channel_timeout_seconds);
        if let Ok(value) = env::var("DEADWATCH_CHANNEL_TOKEN") {
            self.channel_token = Some(value);
        }
        if let Ok(value) = env::var("DEADWATCH_CHANNELS") {
            self.channels.extend(parse_channel_list(&value));
        }
        if let Ok(value) = env::var("DEADWATCH_LOG_DIR") {
            self.log_dir = Some(value);
        }
        override_parsed("DEADWATCH_LOG_JSON", &mut self.log_json);
        override_parsed("DEADWATCH_REQUEST_TIMEOUT_SECONDS", &mut self.request_timeout_seconds);
        override_parsed("DEADWATCH_MAX_BODY_BYTES", &mut self.max_body_bytes);
    }
}

fn override_parsed<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(value) = env::var(key) {
        match value.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, "ignoring unparsable environment override"),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn resolve_path(base: &Path, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        trimmed.to_string()
    } else {
        base.join(path).to_string_lossy().to_string()
    }
}

/// Parses `id=url,id2=url2`.
fn parse_channel_list(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(id, url)| (id.trim().to_string(), url.trim().to_string()))
        .filter(|(id, url)| !id.is_empty() && !url.is_empty())
        .collect()
}
