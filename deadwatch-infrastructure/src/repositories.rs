// redb-backed implementations of the domain repository ports

mod channel_store;
mod keys;
mod kill_store;
mod parser_store;
mod player_store;
pub mod redb_store;
mod server_store;
mod store_error;
mod tables;

pub use redb_store::RedbStore;
pub use store_error::{StoreError, StoreResult};
