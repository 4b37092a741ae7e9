pub mod notification;
pub mod status_query;
pub mod tier_limits;

pub use notification::*;
pub use status_query::*;
pub use tier_limits::*;
