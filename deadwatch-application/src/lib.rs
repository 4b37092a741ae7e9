// Deadwatch Application Layer

pub mod commands;
pub mod dtos;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod queries;
pub mod retry;
pub mod state;

pub use error::AppError;
pub use metrics::Metrics;
pub use state::AppState;
