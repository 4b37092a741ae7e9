use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use deadwatch_domain::services::stats;
use deadwatch_domain::{
    KillEvent,
    KillRepository,
    PlayerId,
    PlayerStatAggregate,
    RecordOutcome,
    ServerId,
    TenantId,
    TrackedServer,
};
use redb::{ReadableDatabase, ReadableTable, Table, WriteTransaction};

use super::keys;
use super::redb_store::{
    decode_prefix,
    get_json,
    not_found,
    put_json,
    read_table,
    scan_prefix,
    write_txn,
    RedbStore,
};
use super::store_error::{map_err, StoreResult};
use super::tables::*;

fn load_player(
    table: &Table<'_, &'static str, &'static [u8]>,
    kill: &KillEvent,
    player_id: &PlayerId,
    name: &str,
) -> StoreResult<(String, PlayerStatAggregate)> {
    let key = keys::player(&kill.tenant_id, &kill.server_id, player_id.as_str());
    let player = get_json(table, &key)?.unwrap_or_else(|| {
        PlayerStatAggregate::new(
            kill.tenant_id.clone(),
            kill.server_id.clone(),
            player_id.clone(),
            name,
            kill.timestamp,
        )
    });
    Ok((key, player))
}

fn record(txn: &WriteTransaction, mut kill: KillEvent) -> StoreResult<RecordOutcome> {
    let dedup_key = keys::dedup(&kill.tenant_id, &kill.dedup_key);
    let mut dedup = txn.open_table(KILL_DEDUP).map_err(map_err!(Table))?;
    if dedup.get(dedup_key.as_str()).map_err(map_err!(Read))?.is_some() {
        return Ok(RecordOutcome::Duplicate);
    }

    {
        let mut servers = txn.open_table(SERVERS).map_err(map_err!(Table))?;
        let server_key = keys::server(&kill.tenant_id, &kill.server_id);
        let mut server: TrackedServer = get_json(&servers, &server_key)?
            .ok_or_else(|| not_found(format!("server {}", kill.server_id)))?;
        server.stats.total_kills += 1;
        server.stats.total_deaths += 1;
        put_json(&mut servers, &server_key, &server)?;
    }

    {
        let mut players = txn.open_table(PLAYERS).map_err(map_err!(Table))?;
        let (killer_key, mut killer) = load_player(&players, &kill, &kill.killer_id, &kill.killer_name)?;
        if kill.suicide {
            stats::apply_kill(&mut killer, None, &kill);
        } else {
            let (victim_key, mut victim) =
                load_player(&players, &kill, &kill.victim_id, &kill.victim_name)?;
            stats::apply_kill(&mut killer, Some(&mut victim), &kill);
            put_json(&mut players, &victim_key, &victim)?;
        }
        put_json(&mut players, &killer_key, &killer)?;
    }

    kill.processed = true;
    let kill_key = keys::kill(&kill);
    {
        let mut kills = txn.open_table(KILLS).map_err(map_err!(Table))?;
        put_json(&mut kills, &kill_key, &kill)?;
    }
    {
        let mut ids = txn.open_table(KILL_IDS).map_err(map_err!(Table))?;
        let id_key = keys::kill_id(&kill.tenant_id, &kill.id);
        ids.insert(id_key.as_str(), kill_key.as_bytes())
            .map_err(map_err!(Write))?;
    }
    if !kill.dispatched {
        let mut pending = txn.open_table(PENDING_KILLS).map_err(map_err!(Table))?;
        let pending_key = keys::pending_kill(&kill);
        pending
            .insert(pending_key.as_str(), kill_key.as_bytes())
            .map_err(map_err!(Write))?;
    }
    dedup
        .insert(dedup_key.as_str(), kill.id.as_bytes())
        .map_err(map_err!(Write))?;

    debug!(kill = %kill.id, server = %kill.server_id, "kill recorded");
    Ok(RecordOutcome::Recorded)
}

#[async_trait]
impl KillRepository for RedbStore {
    async fn record_kill(&self, kill: &KillEvent) -> anyhow::Result<RecordOutcome> {
        let kill = kill.clone();
        self.run(move |db| write_txn(db, |txn| record(txn, kill))).await
    }

    async fn list_undispatched(
        &self,
        tenant_id: &TenantId,
        servers: Option<&HashSet<ServerId>>,
        limit: usize,
    ) -> anyhow::Result<Vec<KillEvent>> {
        let prefix = keys::prefix(&[tenant_id.as_str()]);
        let servers = servers.cloned();
        self.run(move |db| {
            let txn = db.begin_read().map_err(map_err!(Transaction))?;
            let pending = txn.open_table(PENDING_KILLS).map_err(map_err!(Table))?;
            let kills = txn.open_table(KILLS).map_err(map_err!(Table))?;
            let mut out = Vec::new();
            for (_, kill_key) in scan_prefix(&pending, &prefix)? {
                if out.len() >= limit {
                    break;
                }
                let kill_key = String::from_utf8_lossy(&kill_key).into_owned();
                let Some(kill) = get_json::<KillEvent, _>(&kills, &kill_key)? else {
                    continue;
                };
                if servers.as_ref().is_some_and(|only| !only.contains(&kill.server_id)) {
                    continue;
                }
                out.push(kill);
            }
            Ok(out)
        })
        .await
    }

    async fn mark_dispatched(&self, tenant_id: &TenantId, kill_ids: &[String]) -> anyhow::Result<usize> {
        let tenant_id = tenant_id.clone();
        let kill_ids = kill_ids.to_vec();
        self.run(move |db| {
            write_txn(db, |txn| {
                let ids = txn.open_table(KILL_IDS).map_err(map_err!(Table))?;
                let mut kills = txn.open_table(KILLS).map_err(map_err!(Table))?;
                let mut pending = txn.open_table(PENDING_KILLS).map_err(map_err!(Table))?;
                let mut marked = 0;
                for kill_id in &kill_ids {
                    let id_key = keys::kill_id(&tenant_id, kill_id);
                    let kill_key = match ids.get(id_key.as_str()).map_err(map_err!(Read))? {
                        Some(guard) => String::from_utf8_lossy(guard.value()).into_owned(),
                        None => continue,
                    };
                    let Some(mut kill) = get_json::<KillEvent, _>(&kills, &kill_key)? else {
                        continue;
                    };
                    if kill.dispatched {
                        continue;
                    }
                    kill.dispatched = true;
                    put_json(&mut kills, &kill_key, &kill)?;
                    let pending_key = keys::pending_kill(&kill);
                    pending
                        .remove(pending_key.as_str())
                        .map_err(map_err!(Write))?;
                    marked += 1;
                }
                Ok(marked)
            })
        })
        .await
    }

    async fn count_undispatched(&self, tenant_id: &TenantId) -> anyhow::Result<u64> {
        let prefix = keys::prefix(&[tenant_id.as_str()]);
        self.run(move |db| {
            read_table(db, PENDING_KILLS, |table| {
                Ok(scan_prefix(table, &prefix)?.len() as u64)
            })
        })
        .await
    }

    async fn list_kills(&self, tenant_id: &TenantId, server_id: &ServerId) -> anyhow::Result<Vec<KillEvent>> {
        let prefix = keys::prefix(&[tenant_id.as_str(), server_id.as_str()]);
        self.run(move |db| {
            let mut kills: Vec<KillEvent> = read_table(db, KILLS, |table| decode_prefix(table, &prefix))?;
            kills.sort_by_key(|kill| kill.order_key());
            Ok(kills)
        })
        .await
    }
}
