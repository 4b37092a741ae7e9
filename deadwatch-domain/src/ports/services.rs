use async_trait::async_trait;

use crate::entities::{LogFile, StatusReport, TierLevel, TierLimits, TrackedServer};
use crate::value_objects::{SourceKind, TenantId};

#[async_trait]
pub trait StatusQuery: Send + Sync {
    async fn query(&self, host: &str, port: u16, protocol: Option<&str>) -> anyhow::Result<StatusReport>;
}

#[async_trait]
pub trait LogSource: Send + Sync {
    /// Files of one kind for the server, ordered oldest to newest.
    async fn list_files(&self, server: &TrackedServer, kind: SourceKind) -> anyhow::Result<Vec<LogFile>>;
    /// Reads up to `max_bytes` starting at `offset`.
    async fn read_from(
        &self,
        server: &TrackedServer,
        kind: SourceKind,
        file: &str,
        offset: u64,
        max_bytes: usize,
    ) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, destination_id: &str, message: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TierLimitService: Send + Sync {
    async fn tier_for(&self, tenant_id: &TenantId) -> anyhow::Result<TierLevel>;
    fn limits_for(&self, tier: &TierLevel) -> TierLimits;
}
