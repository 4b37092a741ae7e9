//! RedbStore: embedded, crash-safe persistence for every Deadwatch record.
//!
//! Values are JSON-serialized into redb's `&[u8]` columns, and every
//! multi-record update runs inside a single write transaction. The port
//! implementations live next to this file, one per aggregate.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadOnlyTable, ReadableDatabase, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::store_error::{map_err, StoreError, StoreResult};
use super::tables::*;

pub(crate) type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe store handle. Cloning shares the underlying database.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(map_err!(Open))?;
        }
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for table in [
            SERVERS,
            PARSER_STATES,
            PARSER_PROGRESS,
            PLAYERS,
            KILLS,
            KILL_IDS,
            PENDING_KILLS,
            KILL_DEDUP,
            DISPATCH_CHANNELS,
        ] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Runs a blocking store operation on the blocking pool.
    pub(crate) async fn run<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let result = tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| anyhow::anyhow!("store task failed: {e}"))?;
        Ok(result?)
    }
}

/// Runs `op` in one write transaction, committing only when it succeeds.
pub(crate) fn write_txn<T>(
    db: &Database,
    op: impl FnOnce(&WriteTransaction) -> StoreResult<T>,
) -> StoreResult<T> {
    let txn = db.begin_write().map_err(map_err!(Transaction))?;
    let value = op(&txn)?;
    txn.commit().map_err(map_err!(Transaction))?;
    Ok(value)
}

pub(crate) fn read_table<T>(
    db: &Database,
    definition: JsonTable,
    op: impl FnOnce(&ReadOnlyTable<&'static str, &'static [u8]>) -> StoreResult<T>,
) -> StoreResult<T> {
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = txn.open_table(definition).map_err(map_err!(Table))?;
    op(&table)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

pub(crate) fn get_json<T, R>(table: &R, key: &str) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => decode(guard.value()).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn put_json<T: Serialize>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let bytes = encode(value)?;
    table.insert(key, bytes.as_slice()).map_err(map_err!(Write))?;
    Ok(())
}

/// Every row whose key starts with `prefix`, in key order.
pub(crate) fn scan_prefix<R>(table: &R, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>
where
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut rows = Vec::new();
    for entry in table.range(prefix..).map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        rows.push((key.to_string(), value.value().to_vec()));
    }
    Ok(rows)
}

pub(crate) fn decode_prefix<T, R>(table: &R, prefix: &str) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    scan_prefix(table, prefix)?
        .iter()
        .map(|(_, value)| decode(value))
        .collect()
}

/// Removes and returns every row below `prefix`.
pub(crate) fn remove_prefix(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    prefix: &str,
) -> StoreResult<Vec<(String, Vec<u8>)>> {
    let rows = scan_prefix(&*table, prefix)?;
    for (key, _) in &rows {
        table.remove(key.as_str()).map_err(map_err!(Write))?;
    }
    Ok(rows)
}

pub(crate) fn not_found(what: impl Into<String>) -> StoreError {
    StoreError::NotFound(what.into())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use deadwatch_domain::{
        ServerConnection, ServerId, ServerRepository, TenantId, TrackedServer,
    };

    use super::*;

    fn server(tenant: &str, name: &str) -> TrackedServer {
        TrackedServer::new(
            TenantId::from(tenant),
            ServerId::generate(),
            name,
            ServerConnection {
                host: "127.0.0.1".to_string(),
                port: 2302,
                ..ServerConnection::default()
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn reopening_a_store_file_keeps_its_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("deadwatch.redb");
        let tracked = server("guild", "Chernarus");

        {
            let store = RedbStore::open(&path).unwrap();
            assert!(store.insert_server(&tracked, 3).await.unwrap());
        }

        let store = RedbStore::open(&path).unwrap();
        let loaded = store
            .get_server(&tracked.tenant_id, &tracked.server_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.display_name, "Chernarus");
    }

    #[test]
    fn prefix_scan_stops_at_the_prefix_boundary() {
        let store = RedbStore::open_in_memory().unwrap();
        write_txn(&store.db, |txn| {
            let mut table = txn.open_table(SERVERS).map_err(map_err!(Table))?;
            put_json(&mut table, "a/1", &1)?;
            put_json(&mut table, "a/2", &2)?;
            put_json(&mut table, "ab/1", &3)?;
            put_json(&mut table, "b/1", &4)?;
            Ok(())
        })
        .unwrap();

        let values: Vec<i32> =
            read_table(&store.db, SERVERS, |table| decode_prefix(table, "a/")).unwrap();
        assert_eq!(values, vec![1, 2]);
    }
}
