// Pure domain services

pub mod killfeed;
pub mod normalizer;
pub mod stats;
pub mod status;

pub use killfeed::*;
pub use normalizer::*;
pub use stats::*;
pub use status::*;
