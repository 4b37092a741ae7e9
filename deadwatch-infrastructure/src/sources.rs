pub mod local_logs;
pub mod router;
pub mod sftp_logs;

pub use local_logs::*;
pub use router::*;
pub use sftp_logs::*;
