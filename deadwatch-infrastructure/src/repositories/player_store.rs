use async_trait::async_trait;

use deadwatch_domain::services::stats;
use deadwatch_domain::{
    ConnectionEvent,
    PlayerId,
    PlayerRepository,
    PlayerStatAggregate,
    ServerId,
    TenantId,
};

use super::keys;
use super::redb_store::{decode_prefix, get_json, put_json, read_table, write_txn, RedbStore};
use super::store_error::map_err;
use super::tables::PLAYERS;

#[async_trait]
impl PlayerRepository for RedbStore {
    async fn get_player(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        player_id: &PlayerId,
    ) -> anyhow::Result<Option<PlayerStatAggregate>> {
        let key = keys::player(tenant_id, server_id, player_id.as_str());
        self.run(move |db| read_table(db, PLAYERS, |table| get_json(table, &key)))
            .await
    }

    async fn find_player_by_name(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        display_name: &str,
    ) -> anyhow::Result<Option<PlayerStatAggregate>> {
        let prefix = keys::prefix(&[tenant_id.as_str(), server_id.as_str()]);
        let wanted = display_name.trim().to_lowercase();
        self.run(move |db| {
            let players: Vec<PlayerStatAggregate> =
                read_table(db, PLAYERS, |table| decode_prefix(table, &prefix))?;
            Ok(players
                .into_iter()
                .filter(|player| player.display_name.to_lowercase() == wanted)
                .max_by_key(|player| player.last_seen))
        })
        .await
    }

    async fn apply_connection(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        player_id: &PlayerId,
        event: &ConnectionEvent,
    ) -> anyhow::Result<()> {
        let tenant_id = tenant_id.clone();
        let server_id = server_id.clone();
        let player_id = player_id.clone();
        let event = event.clone();
        self.run(move |db| {
            write_txn(db, |txn| {
                let key = keys::player(&tenant_id, &server_id, player_id.as_str());
                let mut table = txn.open_table(PLAYERS).map_err(map_err!(Table))?;
                let mut player = get_json::<PlayerStatAggregate, _>(&table, &key)?.unwrap_or_else(|| {
                    PlayerStatAggregate::new(
                        tenant_id,
                        server_id,
                        player_id,
                        event.player_name.trim(),
                        event.timestamp,
                    )
                });
                stats::apply_connection(&mut player, &event);
                put_json(&mut table, &key, &player)
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn connection(name: &str, connected: bool, minute: i64) -> ConnectionEvent {
        ConnectionEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minute),
            player_name: name.to_string(),
            player_id: Some("76561198000000001".to_string()),
            connected,
        }
    }

    #[tokio::test]
    async fn sessions_accrue_playtime_and_are_found_by_name() {
        let store = RedbStore::open_in_memory().unwrap();
        let tenant = TenantId::from("guild");
        let server = ServerId::from("srv");
        let player = PlayerId::from("76561198000000001");

        store
            .apply_connection(&tenant, &server, &player, &connection("Alice", true, 0))
            .await
            .unwrap();
        store
            .apply_connection(&tenant, &server, &player, &connection("Alice", false, 45))
            .await
            .unwrap();

        let stored = store.get_player(&tenant, &server, &player).await.unwrap().unwrap();
        assert_eq!(stored.playtime_seconds, 45 * 60);

        let by_name = store
            .find_player_by_name(&tenant, &server, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.player_id, player);

        let elsewhere = store
            .find_player_by_name(&tenant, &ServerId::from("other"), "alice")
            .await
            .unwrap();
        assert!(elsewhere.is_none());
    }
}
