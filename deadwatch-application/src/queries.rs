pub mod kill_queries;
pub mod player_queries;
pub mod server_queries;

pub use kill_queries::*;
pub use player_queries::*;
pub use server_queries::*;
