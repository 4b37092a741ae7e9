use std::sync::Arc;

use deadwatch_domain::ports::{
    ChannelRepository,
    KillRepository,
    LogSource,
    NotificationChannel,
    ParserStateRepository,
    PlayerRepository,
    ProgressRepository,
    ServerRepository,
    StatusQuery,
    TierLimitService,
};
use deadwatch_domain::services::LineNormalizer;
use deadwatch_domain::{RuntimeConfig, TenantId, TierLimits};

use crate::pipeline::IngestionSupervisor;
use crate::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub servers: Arc<dyn ServerRepository>,
    pub parser_states: Arc<dyn ParserStateRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub players: Arc<dyn PlayerRepository>,
    pub kills: Arc<dyn KillRepository>,
    pub channels: Arc<dyn ChannelRepository>,
    pub status_query: Arc<dyn StatusQuery>,
    pub log_source: Arc<dyn LogSource>,
    pub notifier: Arc<dyn NotificationChannel>,
    pub tiers: Arc<dyn TierLimitService>,
    pub normalizer: Arc<LineNormalizer>,
    pub metrics: Arc<Metrics>,
    pub supervisor: Arc<IngestionSupervisor>,
}

impl AppState {
    pub async fn tier_limits(&self, tenant_id: &TenantId) -> anyhow::Result<TierLimits> {
        let tier = self.tiers.tier_for(tenant_id).await?;
        Ok(self.tiers.limits_for(&tier))
    }
}
