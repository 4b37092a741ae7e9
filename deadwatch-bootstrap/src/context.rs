use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use deadwatch_application::pipeline::IngestionSupervisor;
use deadwatch_application::{AppState, Metrics};
use deadwatch_domain::LineNormalizer;
use deadwatch_infrastructure::{
    A2sStatusQuery,
    AppConfig,
    LocalLogSource,
    LogSourceRouter,
    RedbStore,
    SftpLogSource,
    WebhookNotifier,
    YamlTierLimits,
};

pub struct AppContext {
    pub state: AppState,
}

impl AppContext {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let runtime_config = config.to_runtime_config();

        let store = Arc::new(RedbStore::open(Path::new(&config.state_path))?);
        info!(path = %config.state_path, "state store ready");

        let tiers = YamlTierLimits::load(Path::new(&config.tiers_path)).await?;
        let notifier = WebhookNotifier::new(
            config.channels.clone(),
            config.channel_token.clone(),
            Duration::from_secs(config.channel_timeout_seconds),
        )?;
        let status_query = A2sStatusQuery::new(Duration::from_millis(config.status_query_timeout_ms));
        let log_source = LogSourceRouter::new(
            LocalLogSource::new(&config.log_root),
            SftpLogSource::new(Duration::from_secs(config.sftp_timeout_seconds)),
        );

        let state = AppState {
            config: runtime_config,
            servers: store.clone(),
            parser_states: store.clone(),
            progress: store.clone(),
            players: store.clone(),
            kills: store.clone(),
            channels: store,
            status_query: Arc::new(status_query),
            log_source: Arc::new(log_source),
            notifier: Arc::new(notifier),
            tiers: Arc::new(tiers),
            normalizer: Arc::new(LineNormalizer::new()?),
            metrics: Arc::new(Metrics::default()),
            supervisor: Arc::new(IngestionSupervisor::new()),
        };

        Ok(Self { state })
    }
}
