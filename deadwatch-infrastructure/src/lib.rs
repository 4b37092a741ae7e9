pub mod config;
pub mod repositories;
pub mod services;
pub mod sources;

pub use config::*;
pub use repositories::*;
pub use services::*;
pub use sources::*;
