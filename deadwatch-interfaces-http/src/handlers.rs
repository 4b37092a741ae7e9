pub mod channel_handlers;
pub mod kill_handlers;
pub mod ops_handlers;
pub mod player_handlers;
pub mod server_handlers;

pub use channel_handlers::*;
pub use kill_handlers::*;
pub use ops_handlers::*;
pub use player_handlers::*;
pub use server_handlers::*;
