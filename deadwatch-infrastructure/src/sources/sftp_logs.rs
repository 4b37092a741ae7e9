use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ssh2::{ErrorCode, Session, Sftp};
use tracing::{debug, info, warn};

use deadwatch_domain::{LogFile, LogSource, SourceKind, TrackedServer};

use super::local_logs::{check_file_name, has_extension};

// LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    host: String,
    port: u16,
    username: String,
}

struct SftpLink {
    _session: Session,
    sftp: Sftp,
}

type LinkMap = Arc<Mutex<HashMap<SessionKey, Arc<Mutex<SftpLink>>>>>;

/// Login details and remote directory for one server.
#[derive(Debug, Clone)]
struct Login {
    key: SessionKey,
    password: Option<String>,
    dir: PathBuf,
}

impl Login {
    fn for_server(server: &TrackedServer) -> Result<Self> {
        let connection = &server.connection;
        let username = connection
            .username
            .clone()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| anyhow!("server {} has no sftp username", server.server_id))?;
        let dir = connection
            .log_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            key: SessionKey {
                host: connection.host.clone(),
                port: connection.effective_sftp_port(),
                username,
            },
            password: connection.password.clone(),
            dir,
        })
    }
}

/// Reads server logs straight from the game host over SFTP.
///
/// The log directory is the server's `log_path` relative to the login
/// directory, or the login directory itself. One session per host and
/// login is kept open; a failed operation drops it and the next call
/// reconnects. libssh2 is blocking, so every call runs on the blocking pool.
pub struct SftpLogSource {
    timeout: Duration,
    links: LinkMap,
}

impl SftpLogSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            links: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn with_link<T, F>(&self, server: &TrackedServer, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Sftp, &Path) -> Result<T> + Send + 'static,
    {
        let login = Login::for_server(server)?;
        let links = self.links.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || {
            let link = checkout(&links, &login, timeout)?;
            let result = {
                let link = link.lock().map_err(|_| anyhow!("sftp session lock poisoned"))?;
                op(&link.sftp, &login.dir)
            };
            if let Err(err) = &result {
                debug!(host = %login.key.host, error = %err, "dropping sftp session after failure");
                evict(&links, &login.key);
            }
            result
        })
        .await?
    }
}

fn checkout(links: &LinkMap, login: &Login, timeout: Duration) -> Result<Arc<Mutex<SftpLink>>> {
    {
        let map = links.lock().map_err(|_| anyhow!("sftp session map poisoned"))?;
        if let Some(link) = map.get(&login.key) {
            return Ok(link.clone());
        }
    }
    let link = Arc::new(Mutex::new(connect(login, timeout)?));
    let mut map = links.lock().map_err(|_| anyhow!("sftp session map poisoned"))?;
    Ok(map.entry(login.key.clone()).or_insert(link).clone())
}

fn evict(links: &LinkMap, key: &SessionKey) {
    match links.lock() {
        Ok(mut map) => {
            map.remove(key);
        }
        Err(_) => warn!(host = %key.host, "sftp session map poisoned, cannot drop session"),
    }
}

fn connect(login: &Login, timeout: Duration) -> Result<SftpLink> {
    let key = &login.key;
    let addr = (key.host.as_str(), key.port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {}:{}", key.host, key.port))?
        .next()
        .ok_or_else(|| anyhow!("no address for {}:{}", key.host, key.port))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .with_context(|| format!("connecting to {addr}"))?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session.handshake().context("ssh handshake")?;
    match login.password.as_deref() {
        Some(password) => session.userauth_password(&key.username, password)?,
        None => session.userauth_agent(&key.username)?,
    }
    if !session.authenticated() {
        return Err(anyhow!("ssh login rejected for {}@{}", key.username, key.host));
    }
    let sftp = session.sftp().context("opening sftp channel")?;
    info!(host = %key.host, port = key.port, user = %key.username, "sftp session opened");
    Ok(SftpLink {
        _session: session,
        sftp,
    })
}

#[async_trait]
impl LogSource for SftpLogSource {
    async fn list_files(&self, server: &TrackedServer, kind: SourceKind) -> Result<Vec<LogFile>> {
        let extension = kind.file_extension();
        self.with_link(server, move |sftp, dir| {
            let entries = match sftp.readdir(dir) {
                Ok(entries) => entries,
                Err(err) if matches!(err.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => {
                    debug!(dir = %dir.display(), "remote log directory does not exist yet");
                    return Ok(Vec::new());
                }
                Err(err) => return Err(err.into()),
            };
            let mut files: Vec<LogFile> = entries
                .into_iter()
                .filter(|(path, stat)| stat.is_file() && has_extension(path, extension))
                .filter_map(|(path, stat)| {
                    let name = path.file_name()?.to_str()?.to_string();
                    Some(LogFile {
                        name,
                        size: stat.size.unwrap_or(0),
                    })
                })
                .collect();
            files.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(files)
        })
        .await
    }

    async fn read_from(
        &self,
        server: &TrackedServer,
        _kind: SourceKind,
        file: &str,
        offset: u64,
        max_bytes: usize,
    ) -> Result<Vec<u8>> {
        check_file_name(file)?;
        let file = file.to_string();
        self.with_link(server, move |sftp, dir| {
            let mut handle = sftp.open(&dir.join(&file))?;
            handle.seek(SeekFrom::Start(offset))?;
            let mut buffer = Vec::with_capacity(max_bytes.min(64 * 1024));
            handle.take(max_bytes as u64).read_to_end(&mut buffer)?;
            Ok(buffer)
        })
        .await
    }
}
