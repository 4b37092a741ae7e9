// Domain entities

pub mod channel;
pub mod config;
pub mod event;
pub mod kill;
pub mod parser;
pub mod player;
pub mod server;
pub mod tier;

pub use channel::*;
pub use config::*;
pub use event::*;
pub use kill::*;
pub use parser::*;
pub use player::*;
pub use server::*;
pub use tier::*;
