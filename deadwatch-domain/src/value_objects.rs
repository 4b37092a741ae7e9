// Domain value objects
pub mod identifiers;
pub mod source_kind;

pub use identifiers::*;
pub use source_kind::*;
