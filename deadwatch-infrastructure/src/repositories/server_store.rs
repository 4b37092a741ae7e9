use async_trait::async_trait;
use tracing::debug;

use deadwatch_domain::{KillEvent, ServerId, ServerMutation, ServerRepository, TenantId, TrackedServer};

use super::keys;
use super::redb_store::{
    decode,
    decode_prefix,
    get_json,
    put_json,
    read_table,
    remove_prefix,
    write_txn,
    RedbStore,
};
use super::store_error::map_err;
use super::tables::*;

#[async_trait]
impl ServerRepository for RedbStore {
    async fn insert_server(&self, server: &TrackedServer, max_servers: u32) -> anyhow::Result<bool> {
        let server = server.clone();
        self.run(move |db| {
            write_txn(db, |txn| {
                let mut table = txn.open_table(SERVERS).map_err(map_err!(Table))?;
                let tenant_prefix = keys::prefix(&[server.tenant_id.as_str()]);
                let tracked: Vec<TrackedServer> = decode_prefix(&table, &tenant_prefix)?;
                if tracked.len() >= max_servers as usize {
                    return Ok(false);
                }
                let key = keys::server(&server.tenant_id, &server.server_id);
                put_json(&mut table, &key, &server)?;
                debug!(%key, "server stored");
                Ok(true)
            })
        })
        .await
    }

    async fn get_server(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
    ) -> anyhow::Result<Option<TrackedServer>> {
        let key = keys::server(tenant_id, server_id);
        self.run(move |db| read_table(db, SERVERS, |table| get_json(table, &key)))
            .await
    }

    async fn list_servers(&self, tenant_id: &TenantId) -> anyhow::Result<Vec<TrackedServer>> {
        let prefix = keys::prefix(&[tenant_id.as_str()]);
        self.run(move |db| read_table(db, SERVERS, |table| decode_prefix(table, &prefix)))
            .await
    }

    async fn list_all_servers(&self) -> anyhow::Result<Vec<TrackedServer>> {
        self.run(|db| read_table(db, SERVERS, |table| decode_prefix(table, "")))
            .await
    }

    async fn update_server(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        mutation: ServerMutation,
    ) -> anyhow::Result<Option<TrackedServer>> {
        let key = keys::server(tenant_id, server_id);
        self.run(move |db| {
            write_txn(db, |txn| {
                let mut table = txn.open_table(SERVERS).map_err(map_err!(Table))?;
                let Some(mut server) = get_json::<TrackedServer, _>(&table, &key)? else {
                    return Ok(None);
                };
                mutation(&mut server);
                put_json(&mut table, &key, &server)?;
                Ok(Some(server))
            })
        })
        .await
    }

    async fn remove_server(&self, tenant_id: &TenantId, server_id: &ServerId) -> anyhow::Result<bool> {
        let tenant_id = tenant_id.clone();
        let server_id = server_id.clone();
        self.run(move |db| {
            write_txn(db, |txn| {
                let server_key = keys::server(&tenant_id, &server_id);
                {
                    let mut servers = txn.open_table(SERVERS).map_err(map_err!(Table))?;
                    let removed = servers
                        .remove(server_key.as_str())
                        .map_err(map_err!(Write))?
                        .is_some();
                    if !removed {
                        return Ok(false);
                    }
                }

                let scope = keys::prefix(&[tenant_id.as_str(), server_id.as_str()]);
                {
                    let mut states = txn.open_table(PARSER_STATES).map_err(map_err!(Table))?;
                    remove_prefix(&mut states, &scope)?;
                }
                {
                    let mut progress = txn.open_table(PARSER_PROGRESS).map_err(map_err!(Table))?;
                    progress.remove(server_key.as_str()).map_err(map_err!(Write))?;
                }
                {
                    let mut players = txn.open_table(PLAYERS).map_err(map_err!(Table))?;
                    remove_prefix(&mut players, &scope)?;
                }

                let kills: Vec<KillEvent> = {
                    let mut table = txn.open_table(KILLS).map_err(map_err!(Table))?;
                    remove_prefix(&mut table, &scope)?
                        .iter()
                        .map(|(_, value)| decode(value))
                        .collect::<Result<_, _>>()?
                };
                {
                    let mut ids = txn.open_table(KILL_IDS).map_err(map_err!(Table))?;
                    let mut pending = txn.open_table(PENDING_KILLS).map_err(map_err!(Table))?;
                    let mut dedup = txn.open_table(KILL_DEDUP).map_err(map_err!(Table))?;
                    for kill in &kills {
                        let id_key = keys::kill_id(&tenant_id, &kill.id);
                        let pending_key = keys::pending_kill(kill);
                        let dedup_key = keys::dedup(&tenant_id, &kill.dedup_key);
                        ids.remove(id_key.as_str()).map_err(map_err!(Write))?;
                        pending.remove(pending_key.as_str()).map_err(map_err!(Write))?;
                        dedup.remove(dedup_key.as_str()).map_err(map_err!(Write))?;
                    }
                }
                {
                    let mut channels = txn.open_table(DISPATCH_CHANNELS).map_err(map_err!(Table))?;
                    let channel_key = keys::channel(&tenant_id, Some(&server_id));
                    channels.remove(channel_key.as_str()).map_err(map_err!(Write))?;
                }

                debug!(%server_key, kills = kills.len(), "server removed");
                Ok(true)
            })
        })
        .await
    }
}
