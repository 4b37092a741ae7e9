use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use deadwatch_domain::{LogFile, LogSource, SourceKind, TrackedServer};

/// Reads server logs mirrored into a local directory tree.
///
/// Each server owns `<root>/<log_path>` when a log path is configured, and
/// `<root>/<tenant>/<server>` otherwise. Kill logs are `*.csv` files, the
/// server event log is `*.log`.
pub struct LocalLogSource {
    root: PathBuf,
}

impl LocalLogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn server_dir(&self, server: &TrackedServer) -> PathBuf {
        match server
            .connection
            .log_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
        {
            Some(path) => self.root.join(path),
            None => self
                .root
                .join(server.tenant_id.as_str())
                .join(server.server_id.as_str()),
        }
    }

    fn file_path(&self, server: &TrackedServer, file: &str) -> Result<PathBuf> {
        check_file_name(file)?;
        Ok(self.server_dir(server).join(file))
    }
}

/// Log file names are bare names inside the server directory.
pub(crate) fn check_file_name(file: &str) -> Result<()> {
    if file.is_empty() || file.contains(['/', '\\']) || file == ".." || file == "." {
        return Err(anyhow!("invalid log file name: {file}"));
    }
    Ok(())
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

#[async_trait]
impl LogSource for LocalLogSource {
    async fn list_files(&self, server: &TrackedServer, kind: SourceKind) -> Result<Vec<LogFile>> {
        let dir = self.server_dir(server);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "log directory does not exist yet");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !has_extension(&path, kind.file_extension()) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            files.push(LogFile {
                name: name.to_string(),
                size: metadata.len(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn read_from(
        &self,
        server: &TrackedServer,
        _kind: SourceKind,
        file: &str,
        offset: u64,
        max_bytes: usize,
    ) -> Result<Vec<u8>> {
        let path = self.file_path(server, file)?;
        let mut handle = fs::File::open(&path).await?;
        handle.seek(SeekFrom::Start(offset)).await?;
        let mut buffer = Vec::with_capacity(max_bytes.min(64 * 1024));
        handle.take(max_bytes as u64).read_to_end(&mut buffer).await?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use deadwatch_domain::{ServerConnection, ServerId, TenantId};

    use super::*;

    fn server(log_path: Option<&str>) -> TrackedServer {
        TrackedServer::new(
            TenantId::from("guild"),
            ServerId::from("srv"),
            "Chernarus",
            ServerConnection {
                host: "10.0.0.5".to_string(),
                port: 2302,
                log_path: log_path.map(str::to_string),
                ..ServerConnection::default()
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn lists_files_of_one_kind_in_name_order() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("guild").join("srv");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("kills_2024.03.02.csv"), "b\n").unwrap();
        std::fs::write(dir.join("kills_2024.03.01.csv"), "aaaa\n").unwrap();
        std::fs::write(dir.join("server.log"), "x\n").unwrap();

        let source = LocalLogSource::new(root.path());
        let kills = source.list_files(&server(None), SourceKind::LogTail).await.unwrap();
        assert_eq!(
            kills,
            vec![
                LogFile { name: "kills_2024.03.01.csv".to_string(), size: 5 },
                LogFile { name: "kills_2024.03.02.csv".to_string(), size: 2 },
            ]
        );
        let events = source.list_files(&server(None), SourceKind::Status).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let root = tempfile::tempdir().unwrap();
        let source = LocalLogSource::new(root.path());
        let files = source
            .list_files(&server(Some("not/there")), SourceKind::LogTail)
            .await
            .unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn reads_a_bounded_window_from_an_offset() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("mirror");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("kills.csv"), "0123456789").unwrap();

        let source = LocalLogSource::new(root.path());
        let tracked = server(Some("mirror"));
        let chunk = source
            .read_from(&tracked, SourceKind::LogTail, "kills.csv", 3, 4)
            .await
            .unwrap();
        assert_eq!(chunk, b"3456");

        let past_end = source
            .read_from(&tracked, SourceKind::LogTail, "kills.csv", 50, 4)
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn rejects_file_names_leaving_the_server_directory() {
        let root = tempfile::tempdir().unwrap();
        let source = LocalLogSource::new(root.path());
        let result = source
            .read_from(&server(None), SourceKind::LogTail, "../other/kills.csv", 0, 16)
            .await;
        assert!(result.is_err());
    }
}
