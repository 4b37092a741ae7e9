use std::collections::HashSet;

use async_trait::async_trait;

use crate::entities::{
    ConnectionEvent,
    DispatchChannel,
    KillEvent,
    ParserCursor,
    ParserProgress,
    ParserState,
    PlayerStatAggregate,
    RecordOutcome,
    TrackedServer,
};
use crate::value_objects::{PlayerId, ServerId, SourceKind, TenantId};

/// Read-modify-write closure applied to a server inside one transaction.
pub type ServerMutation = Box<dyn FnOnce(&mut TrackedServer) + Send>;

#[async_trait]
pub trait ServerRepository: Send + Sync {
    /// Inserts the server unless the tenant already has `max_servers`.
    /// Returns `false` (and writes nothing) when the limit is reached.
    async fn insert_server(&self, server: &TrackedServer, max_servers: u32) -> anyhow::Result<bool>;
    async fn get_server(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
    ) -> anyhow::Result<Option<TrackedServer>>;
    async fn list_servers(&self, tenant_id: &TenantId) -> anyhow::Result<Vec<TrackedServer>>;
    async fn list_all_servers(&self) -> anyhow::Result<Vec<TrackedServer>>;
    async fn update_server(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        mutation: ServerMutation,
    ) -> anyhow::Result<Option<TrackedServer>>;
    /// Removes the server and every record scoped to it.
    async fn remove_server(&self, tenant_id: &TenantId, server_id: &ServerId) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait ParserStateRepository: Send + Sync {
    async fn get_or_create_parser_state(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        kind: SourceKind,
    ) -> anyhow::Result<ParserState>;
    /// Writes the cursor only if the stored generation still equals
    /// `generation`. Returns whether the write happened.
    async fn update_cursor(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        kind: SourceKind,
        generation: u64,
        cursor: ParserCursor,
    ) -> anyhow::Result<bool>;
    async fn set_auto_tailing(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        kind: SourceKind,
        enabled: bool,
    ) -> anyhow::Result<ParserState>;
    /// Rewinds every source kind of the server and disables auto-tailing.
    async fn reset_parser_states(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
    ) -> anyhow::Result<Vec<ParserState>>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn save_progress(&self, progress: &ParserProgress) -> anyhow::Result<()>;
    async fn get_progress(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
    ) -> anyhow::Result<Option<ParserProgress>>;
    async fn clear_progress(&self, tenant_id: &TenantId, server_id: &ServerId) -> anyhow::Result<()>;
}

#[async_trait]
pub trait PlayerRepository: Send + Sync {
    async fn get_player(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        player_id: &PlayerId,
    ) -> anyhow::Result<Option<PlayerStatAggregate>>;
    async fn find_player_by_name(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        display_name: &str,
    ) -> anyhow::Result<Option<PlayerStatAggregate>>;
    async fn apply_connection(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        player_id: &PlayerId,
        event: &ConnectionEvent,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait KillRepository: Send + Sync {
    /// Applies the kill to both aggregates, stores the event and bumps the
    /// server counters in one transaction. A known dedup key is a no-op.
    async fn record_kill(&self, kill: &KillEvent) -> anyhow::Result<RecordOutcome>;
    /// Undispatched kills of the tenant, oldest first. With `servers` set,
    /// kills of any other server are skipped and do not count toward `limit`.
    async fn list_undispatched(
        &self,
        tenant_id: &TenantId,
        servers: Option<&HashSet<ServerId>>,
        limit: usize,
    ) -> anyhow::Result<Vec<KillEvent>>;
    async fn mark_dispatched(&self, tenant_id: &TenantId, kill_ids: &[String]) -> anyhow::Result<usize>;
    async fn count_undispatched(&self, tenant_id: &TenantId) -> anyhow::Result<u64>;
    async fn list_kills(&self, tenant_id: &TenantId, server_id: &ServerId) -> anyhow::Result<Vec<KillEvent>>;
}

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn upsert_channel(&self, binding: &DispatchChannel) -> anyhow::Result<()>;
    async fn remove_channel(
        &self,
        tenant_id: &TenantId,
        server_id: Option<&ServerId>,
    ) -> anyhow::Result<bool>;
    async fn list_channels(&self, tenant_id: &TenantId) -> anyhow::Result<Vec<DispatchChannel>>;
}
