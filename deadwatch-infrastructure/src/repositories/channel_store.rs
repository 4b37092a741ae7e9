use async_trait::async_trait;

use deadwatch_domain::{ChannelRepository, DispatchChannel, ServerId, TenantId};

use super::keys;
use super::redb_store::{decode_prefix, put_json, read_table, write_txn, RedbStore};
use super::store_error::map_err;
use super::tables::DISPATCH_CHANNELS;

#[async_trait]
impl ChannelRepository for RedbStore {
    async fn upsert_channel(&self, binding: &DispatchChannel) -> anyhow::Result<()> {
        let binding = binding.clone();
        self.run(move |db| {
            write_txn(db, |txn| {
                let key = keys::channel(&binding.tenant_id, binding.server_id.as_ref());
                let mut table = txn.open_table(DISPATCH_CHANNELS).map_err(map_err!(Table))?;
                put_json(&mut table, &key, &binding)
            })
        })
        .await
    }

    async fn remove_channel(
        &self,
        tenant_id: &TenantId,
        server_id: Option<&ServerId>,
    ) -> anyhow::Result<bool> {
        let key = keys::channel(tenant_id, server_id);
        self.run(move |db| {
            write_txn(db, |txn| {
                let mut table = txn.open_table(DISPATCH_CHANNELS).map_err(map_err!(Table))?;
                let removed = table
                    .remove(key.as_str())
                    .map_err(map_err!(Write))?
                    .is_some();
                Ok(removed)
            })
        })
        .await
    }

    async fn list_channels(&self, tenant_id: &TenantId) -> anyhow::Result<Vec<DispatchChannel>> {
        let prefix = keys::prefix(&[tenant_id.as_str()]);
        self.run(move |db| read_table(db, DISPATCH_CHANNELS, |table| decode_prefix(table, &prefix)))
            .await
    }
}
