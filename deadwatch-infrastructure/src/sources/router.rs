use anyhow::Result;
use async_trait::async_trait;

use deadwatch_domain::{LogAccess, LogFile, LogSource, SourceKind, TrackedServer};

use super::{LocalLogSource, SftpLogSource};

/// Sends each server's reads to the source its connection names.
pub struct LogSourceRouter {
    local: LocalLogSource,
    sftp: SftpLogSource,
}

impl LogSourceRouter {
    pub fn new(local: LocalLogSource, sftp: SftpLogSource) -> Self {
        Self { local, sftp }
    }

    fn source_for(&self, server: &TrackedServer) -> &dyn LogSource {
        match server.connection.log_access {
            LogAccess::Local => &self.local,
            LogAccess::Sftp => &self.sftp,
        }
    }
}

#[async_trait]
impl LogSource for LogSourceRouter {
    async fn list_files(&self, server: &TrackedServer, kind: SourceKind) -> Result<Vec<LogFile>> {
        self.source_for(server).list_files(server, kind).await
    }

    async fn read_from(
        &self,
        server: &TrackedServer,
        kind: SourceKind,
        file: &str,
        offset: u64,
        max_bytes: usize,
    ) -> Result<Vec<u8>> {
        self.source_for(server)
            .read_from(server, kind, file, offset, max_bytes)
            .await
    }
}
