pub mod channel_commands;
pub mod server_commands;

pub use channel_commands::*;
pub use server_commands::{add_server, remove_server, reset_server_ingestion};
