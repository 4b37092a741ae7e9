// Runtime configuration consumed by the application layer

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub api_token: Option<String>,
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
    pub store_retry_attempts: u32,
    pub channel_timeout_seconds: u64,
    pub stalled_batch_seconds: i64,
    pub request_timeout_seconds: u64,
    pub max_body_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3240".to_string(),
            api_token: None,
            status_poll_interval_seconds: 30,
            ingest_interval_seconds: 60,
            dispatch_interval_seconds: 10,
            status_query_timeout_ms: 3000,
            status_query_attempts: 2,
            dispatch_batch_size: 15,
            ingest_concurrency: 8,
            server_task_timeout_seconds: 120,
            progress_update_seconds: 5,
            progress_update_records: 500,
            store_retry_attempts: 3,
            channel_timeout_seconds: 10,
            stalled_batch_seconds: 600,
            request_timeout_seconds: 15,
            max_body_bytes: 1024 * 1024,
        }
    }
}
