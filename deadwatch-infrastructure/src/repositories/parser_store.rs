use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use deadwatch_domain::{
    ParserCursor,
    ParserProgress,
    ParserState,
    ParserStateRepository,
    ProgressRepository,
    ServerId,
    SourceKind,
    TenantId,
};

use super::keys;
use super::redb_store::{get_json, put_json, read_table, write_txn, RedbStore};
use super::store_error::map_err;
use super::tables::{PARSER_PROGRESS, PARSER_STATES};

#[async_trait]
impl ParserStateRepository for RedbStore {
    async fn get_or_create_parser_state(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        kind: SourceKind,
    ) -> anyhow::Result<ParserState> {
        let tenant_id = tenant_id.clone();
        let server_id = server_id.clone();
        self.run(move |db| {
            let key = keys::parser_state(&tenant_id, &server_id, kind);
            if let Some(state) = read_table(db, PARSER_STATES, |table| get_json(table, &key))? {
                return Ok(state);
            }
            write_txn(db, |txn| {
                let mut table = txn.open_table(PARSER_STATES).map_err(map_err!(Table))?;
                if let Some(state) = get_json(&table, &key)? {
                    return Ok(state);
                }
                let state = ParserState::new(tenant_id, server_id, kind, Utc::now());
                put_json(&mut table, &key, &state)?;
                Ok(state)
            })
        })
        .await
    }

    async fn update_cursor(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        kind: SourceKind,
        generation: u64,
        cursor: ParserCursor,
    ) -> anyhow::Result<bool> {
        let key = keys::parser_state(tenant_id, server_id, kind);
        self.run(move |db| {
            write_txn(db, |txn| {
                let mut table = txn.open_table(PARSER_STATES).map_err(map_err!(Table))?;
                let Some(mut state) = get_json::<ParserState, _>(&table, &key)? else {
                    return Ok(false);
                };
                if state.generation != generation {
                    debug!(%key, stored = state.generation, generation, "stale cursor write rejected");
                    return Ok(false);
                }
                state.cursor = cursor;
                state.updated_at = Utc::now();
                put_json(&mut table, &key, &state)?;
                Ok(true)
            })
        })
        .await
    }

    async fn set_auto_tailing(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
        kind: SourceKind,
        enabled: bool,
    ) -> anyhow::Result<ParserState> {
        let tenant_id = tenant_id.clone();
        let server_id = server_id.clone();
        self.run(move |db| {
            write_txn(db, |txn| {
                let key = keys::parser_state(&tenant_id, &server_id, kind);
                let mut table = txn.open_table(PARSER_STATES).map_err(map_err!(Table))?;
                let now = Utc::now();
                let mut state = get_json::<ParserState, _>(&table, &key)?
                    .unwrap_or_else(|| ParserState::new(tenant_id, server_id, kind, now));
                state.auto_tailing_enabled = enabled;
                state.updated_at = now;
                put_json(&mut table, &key, &state)?;
                Ok(state)
            })
        })
        .await
    }

    async fn reset_parser_states(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
    ) -> anyhow::Result<Vec<ParserState>> {
        let tenant_id = tenant_id.clone();
        let server_id = server_id.clone();
        self.run(move |db| {
            write_txn(db, |txn| {
                let mut table = txn.open_table(PARSER_STATES).map_err(map_err!(Table))?;
                let now = Utc::now();
                let mut states = Vec::with_capacity(SourceKind::ALL.len());
                for kind in SourceKind::ALL {
                    let key = keys::parser_state(&tenant_id, &server_id, kind);
                    let mut state = get_json::<ParserState, _>(&table, &key)?.unwrap_or_else(|| {
                        ParserState::new(tenant_id.clone(), server_id.clone(), kind, now)
                    });
                    state.cursor = ParserCursor::default();
                    state.auto_tailing_enabled = false;
                    state.generation += 1;
                    state.updated_at = now;
                    put_json(&mut table, &key, &state)?;
                    states.push(state);
                }
                debug!(tenant = %tenant_id, server = %server_id, "parser states reset");
                Ok(states)
            })
        })
        .await
    }
}

#[async_trait]
impl ProgressRepository for RedbStore {
    async fn save_progress(&self, progress: &ParserProgress) -> anyhow::Result<()> {
        let progress = progress.clone();
        self.run(move |db| {
            write_txn(db, |txn| {
                let key = keys::server(&progress.tenant_id, &progress.server_id);
                let mut table = txn.open_table(PARSER_PROGRESS).map_err(map_err!(Table))?;
                put_json(&mut table, &key, &progress)
            })
        })
        .await
    }

    async fn get_progress(
        &self,
        tenant_id: &TenantId,
        server_id: &ServerId,
    ) -> anyhow::Result<Option<ParserProgress>> {
        let key = keys::server(tenant_id, server_id);
        self.run(move |db| read_table(db, PARSER_PROGRESS, |table| get_json(table, &key)))
            .await
    }

    async fn clear_progress(&self, tenant_id: &TenantId, server_id: &ServerId) -> anyhow::Result<()> {
        let key = keys::server(tenant_id, server_id);
        self.run(move |db| {
            write_txn(db, |txn| {
                let mut table = txn.open_table(PARSER_PROGRESS).map_err(map_err!(Table))?;
                table.remove(key.as_str()).map_err(map_err!(Write))?;
                Ok(())
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use deadwatch_domain::ProgressState;

    use super::*;

    fn ids() -> (TenantId, ServerId) {
        (TenantId::from("guild"), ServerId::from("srv"))
    }

    #[tokio::test]
    async fn new_parser_state_starts_rewound_and_disabled() {
        let store = RedbStore::open_in_memory().unwrap();
        let (tenant, server) = ids();
        let state = store
            .get_or_create_parser_state(&tenant, &server, SourceKind::LogTail)
            .await
            .unwrap();
        assert!(!state.auto_tailing_enabled);
        assert_eq!(state.generation, 0);
        assert_eq!(state.cursor, ParserCursor::default());
    }

    #[tokio::test]
    async fn reset_bumps_generation_and_rejects_stale_cursor_writes() {
        let store = RedbStore::open_in_memory().unwrap();
        let (tenant, server) = ids();
        store
            .set_auto_tailing(&tenant, &server, SourceKind::LogTail, true)
            .await
            .unwrap();
        let before = store
            .get_or_create_parser_state(&tenant, &server, SourceKind::LogTail)
            .await
            .unwrap();
        assert!(store
            .update_cursor(
                &tenant,
                &server,
                SourceKind::LogTail,
                before.generation,
                ParserCursor::end_of("a.csv", 100),
            )
            .await
            .unwrap());

        let reset = store.reset_parser_states(&tenant, &server).await.unwrap();
        assert_eq!(reset.len(), 2);
        assert!(reset.iter().all(|state| !state.auto_tailing_enabled));

        let stale = store
            .update_cursor(
                &tenant,
                &server,
                SourceKind::LogTail,
                before.generation,
                ParserCursor::end_of("a.csv", 200),
            )
            .await
            .unwrap();
        assert!(!stale);

        let after = store
            .get_or_create_parser_state(&tenant, &server, SourceKind::LogTail)
            .await
            .unwrap();
        assert_eq!(after.generation, before.generation + 1);
        assert_eq!(after.cursor, ParserCursor::default());
    }

    #[tokio::test]
    async fn cursor_update_for_missing_state_is_rejected() {
        let store = RedbStore::open_in_memory().unwrap();
        let (tenant, server) = ids();
        let written = store
            .update_cursor(&tenant, &server, SourceKind::Status, 0, ParserCursor::start_of("x.log"))
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn progress_round_trips_and_clears() {
        let store = RedbStore::open_in_memory().unwrap();
        let (tenant, server) = ids();
        let mut progress = ParserProgress::started(tenant.clone(), server.clone(), 3, 900, Utc::now());
        progress.state = ProgressState::Completed;
        store.save_progress(&progress).await.unwrap();

        let loaded = store.get_progress(&tenant, &server).await.unwrap().unwrap();
        assert_eq!(loaded.state, ProgressState::Completed);
        assert_eq!(loaded.files_total, 3);

        store.clear_progress(&tenant, &server).await.unwrap();
        assert!(store.get_progress(&tenant, &server).await.unwrap().is_none());
    }
}
