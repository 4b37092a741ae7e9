use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::{info, warn};

use deadwatch_domain::{TenantId, TierLevel, TierLimitService, TierLimits};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TierFile {
    default_tier: Option<String>,
    tiers: HashMap<String, TierLimits>,
    tenants: HashMap<String, String>,
}

/// Tier table read from `tiers.yaml`: limit overrides per tier plus
/// tenant assignments. Unassigned tenants get the default tier.
pub struct YamlTierLimits {
    default_tier: TierLevel,
    tiers: HashMap<TierLevel, TierLimits>,
    tenants: HashMap<String, TierLevel>,
}

impl Default for YamlTierLimits {
    fn default() -> Self {
        Self {
            default_tier: TierLevel::survivor(),
            tiers: HashMap::new(),
            tenants: HashMap::new(),
        }
    }
}

impl YamlTierLimits {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "tier file not found, using built-in tiers");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).await?;
        let table = Self::from_yaml(&content)?;
        info!(
            path = %path.display(),
            tiers = table.tiers.len(),
            tenants = table.tenants.len(),
            "tier table loaded"
        );
        Ok(table)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: TierFile =
            serde_yaml::from_str(content).map_err(|err| anyhow!("invalid tier file: {}", err))?;
        let default_tier = file
            .default_tier
            .map(TierLevel::new)
            .unwrap_or_else(TierLevel::survivor);
        let tiers: HashMap<TierLevel, TierLimits> = file
            .tiers
            .into_iter()
            .map(|(level, limits)| (TierLevel::new(level), limits))
            .collect();
        let tenants = file
            .tenants
            .into_iter()
            .map(|(tenant, level)| (tenant.trim().to_string(), TierLevel::new(level)))
            .collect();

        let table = Self {
            default_tier,
            tiers,
            tenants,
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        let known = |level: &TierLevel| self.tiers.contains_key(level) || TierLimits::builtin(level).is_some();
        if !known(&self.default_tier) {
            return Err(anyhow!("default tier {} is not defined", self.default_tier));
        }
        for (tenant, level) in &self.tenants {
            if !known(level) {
                return Err(anyhow!("tenant {} is assigned unknown tier {}", tenant, level));
            }
        }
        Ok(())
    }

    pub fn assign(mut self, tenant_id: &TenantId, tier: TierLevel) -> Self {
        self.tenants.insert(tenant_id.as_str().to_string(), tier);
        self
    }
}

#[async_trait]
impl TierLimitService for YamlTierLimits {
    async fn tier_for(&self, tenant_id: &TenantId) -> Result<TierLevel> {
        Ok(self
            .tenants
            .get(tenant_id.as_str())
            .cloned()
            .unwrap_or_else(|| self.default_tier.clone()))
    }

    fn limits_for(&self, tier: &TierLevel) -> TierLimits {
        self.tiers
            .get(tier)
            .copied()
            .or_else(|| TierLimits::builtin(tier))
            .or_else(|| TierLimits::builtin(&TierLevel::survivor()))
            .unwrap_or(TierLimits {
                max_servers: 1,
                history_days: 7,
                batch_processing_allowed: false,
            })
    }
}
