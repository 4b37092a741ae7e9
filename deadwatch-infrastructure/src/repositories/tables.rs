//! redb table definitions.
//!
//! Every table maps a `/`-separated key to a JSON-encoded value. Keys always
//! begin with the escaped tenant id so that a tenant prefix scan can never
//! reach another tenant's rows.

use redb::TableDefinition;

/// `{tenant}/{server}` -> `TrackedServer`
pub const SERVERS: TableDefinition<&str, &[u8]> = TableDefinition::new("servers");

/// `{tenant}/{server}/{kind}` -> `ParserState`
pub const PARSER_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("parser_states");

/// `{tenant}/{server}` -> `ParserProgress`
pub const PARSER_PROGRESS: TableDefinition<&str, &[u8]> = TableDefinition::new("parser_progress");

/// `{tenant}/{server}/{player}` -> `PlayerStatAggregate`
pub const PLAYERS: TableDefinition<&str, &[u8]> = TableDefinition::new("players");

/// `{tenant}/{server}/{kill}` -> `KillEvent`
pub const KILLS: TableDefinition<&str, &[u8]> = TableDefinition::new("kills");

/// `{tenant}/{kill}` -> key into `KILLS`
pub const KILL_IDS: TableDefinition<&str, &[u8]> = TableDefinition::new("kill_ids");

/// `{tenant}/{order}` -> key into `KILLS`, only while undispatched
pub const PENDING_KILLS: TableDefinition<&str, &[u8]> = TableDefinition::new("pending_kills");

/// `{tenant}/{dedup}` -> kill id
pub const KILL_DEDUP: TableDefinition<&str, &[u8]> = TableDefinition::new("kill_dedup");

/// `{tenant}/{server}` or `{tenant}/` for the catch-all -> `DispatchChannel`
pub const DISPATCH_CHANNELS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("dispatch_channels");
