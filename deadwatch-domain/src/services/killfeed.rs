// Kill-feed rendering and destination resolution

use std::collections::{HashMap, HashSet};

use crate::entities::{DispatchChannel, KillEvent};
use crate::value_objects::{ServerId, TenantId};

pub const HEADSHOT_MARKER: &str = "[HEADSHOT]";
const UNKNOWN_SERVER: &str = "Unknown server";

pub fn render_kill_line(kill: &KillEvent) -> String {
    let mut line = if kill.suicide {
        format!("{} died", kill.victim_name)
    } else if kill.team_kill {
        format!("{} team-killed {}", kill.killer_name, kill.victim_name)
    } else {
        format!("{} killed {}", kill.killer_name, kill.victim_name)
    };
    if let Some(weapon) = kill.weapon.as_deref().filter(|w| !w.trim().is_empty()) {
        line.push_str(" with ");
        line.push_str(weapon.trim());
    }
    if kill.headshot {
        line.push(' ');
        line.push_str(HEADSHOT_MARKER);
    }
    if let Some(distance) = kill.distance.filter(|d| *d > 0.0) {
        line.push_str(&format!(" ({distance:.0}m)"));
    }
    line
}

/// Picks the binding for a kill on `server_id`: an enabled exact match
/// first, then the tenant's enabled catch-all.
pub fn resolve_destination<'a>(
    bindings: &'a [DispatchChannel],
    tenant_id: &TenantId,
    server_id: &ServerId,
) -> Option<&'a DispatchChannel> {
    let tenant_bindings = || {
        bindings
            .iter()
            .filter(move |b| b.enabled && &b.tenant_id == tenant_id)
    };
    tenant_bindings()
        .find(|b| b.server_id.as_ref() == Some(server_id))
        .or_else(|| tenant_bindings().find(|b| b.server_id.is_none()))
}

/// Servers whose kills have a destination right now. `None` means all of
/// them do, through an enabled catch-all.
pub fn routable_servers(bindings: &[DispatchChannel], tenant_id: &TenantId) -> Option<HashSet<ServerId>> {
    let enabled = bindings
        .iter()
        .filter(|b| b.enabled && &b.tenant_id == tenant_id);
    let mut servers = HashSet::new();
    for binding in enabled {
        match &binding.server_id {
            Some(server_id) => {
                servers.insert(server_id.clone());
            }
            None => return None,
        }
    }
    Some(servers)
}

#[derive(Debug, Clone)]
pub struct FeedSection {
    pub server_id: ServerId,
    pub server_name: String,
    pub kills: Vec<KillEvent>,
}

/// All kills bound for one destination in one dispatch cycle.
#[derive(Debug, Clone)]
pub struct FeedBatch {
    pub channel_id: String,
    pub sections: Vec<FeedSection>,
}

impl FeedBatch {
    pub fn kill_ids(&self) -> Vec<String> {
        self.sections
            .iter()
            .flat_map(|s| s.kills.iter().map(|k| k.id.clone()))
            .collect()
    }

    pub fn kill_count(&self) -> usize {
        self.sections.iter().map(|s| s.kills.len()).sum()
    }

    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|section| {
                let mut block = format!("**{}**", section.server_name);
                for kill in &section.kills {
                    block.push('\n');
                    block.push_str(&render_kill_line(kill));
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Groups kills by destination channel, then by server. Input order is
/// preserved inside each group. Kills without a destination are left out.
pub fn plan_feed(
    kills: &[KillEvent],
    bindings: &[DispatchChannel],
    server_names: &HashMap<ServerId, String>,
) -> Vec<FeedBatch> {
    let mut batches: Vec<FeedBatch> = Vec::new();
    for kill in kills {
        let Some(binding) = resolve_destination(bindings, &kill.tenant_id, &kill.server_id) else {
            continue;
        };
        let batch_index = match batches.iter().position(|b| b.channel_id == binding.channel_id) {
            Some(index) => index,
            None => {
                batches.push(FeedBatch {
                    channel_id: binding.channel_id.clone(),
                    sections: Vec::new(),
                });
                batches.len() - 1
            }
        };
        let batch = &mut batches[batch_index];
        match batch.sections.iter_mut().find(|s| s.server_id == kill.server_id) {
            Some(section) => section.kills.push(kill.clone()),
            None => batch.sections.push(FeedSection {
                server_id: kill.server_id.clone(),
                server_name: server_names
                    .get(&kill.server_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_SERVER.to_string()),
                kills: vec![kill.clone()],
            }),
        }
    }
    batches
}
