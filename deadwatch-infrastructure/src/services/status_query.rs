//! Steam A2S_INFO status query over UDP.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

use deadwatch_domain::{StatusQuery, StatusReport};

const SINGLE_PACKET: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
const INFO_REQUEST: u8 = 0x54;
const INFO_RESPONSE: u8 = 0x49;
const CHALLENGE_RESPONSE: u8 = 0x41;
const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";
const MAX_PACKET: usize = 1400;
/// A server may keep answering with fresh challenges; stop after this many.
const MAX_CHALLENGES: usize = 2;

pub struct A2sStatusQuery {
    timeout: Duration,
}

impl A2sStatusQuery {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn exchange(&self, socket: &UdpSocket, request: &[u8]) -> Result<Vec<u8>> {
        socket.send(request).await?;
        let mut buffer = vec![0u8; MAX_PACKET];
        let len = timeout(self.timeout, socket.recv(&mut buffer))
            .await
            .map_err(|_| anyhow!("status query timed out after {:?}", self.timeout))??;
        buffer.truncate(len);
        Ok(buffer)
    }
}

#[derive(Debug, PartialEq)]
enum InfoReply {
    Challenge([u8; 4]),
    Info(StatusReport),
}

fn info_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(29);
    packet.extend_from_slice(&SINGLE_PACKET);
    packet.push(INFO_REQUEST);
    packet.extend_from_slice(INFO_PAYLOAD);
    if let Some(challenge) = challenge {
        packet.extend_from_slice(&challenge);
    }
    packet
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8> {
        let value = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| anyhow!("truncated A2S reply"))?;
        self.pos += 1;
        Ok(value)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + N)
            .ok_or_else(|| anyhow!("truncated A2S reply"))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn cstring(&mut self) -> Result<String> {
        let rest = &self.bytes[self.pos.min(self.bytes.len())..];
        let end = rest
            .iter()
            .position(|byte| *byte == 0)
            .ok_or_else(|| anyhow!("unterminated string in A2S reply"))?;
        let value = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(value)
    }
}

fn parse_reply(bytes: &[u8]) -> Result<InfoReply> {
    let mut reader = Reader::new(bytes);
    if reader.take::<4>()? != SINGLE_PACKET {
        bail!("split or malformed A2S reply");
    }
    match reader.u8()? {
        CHALLENGE_RESPONSE => Ok(InfoReply::Challenge(reader.take::<4>()?)),
        INFO_RESPONSE => {
            let _protocol = reader.u8()?;
            let name = reader.cstring()?;
            let map = reader.cstring()?;
            let _folder = reader.cstring()?;
            let _game = reader.cstring()?;
            let _app_id = reader.take::<2>()?;
            let players = reader.u8()?;
            let max_players = reader.u8()?;
            let _bots = reader.u8()?;
            let _server_type = reader.u8()?;
            let _environment = reader.u8()?;
            let _visibility = reader.u8()?;
            let _vac = reader.u8()?;
            let version = reader.cstring().ok().filter(|v| !v.is_empty());
            Ok(InfoReply::Info(StatusReport {
                online: true,
                name: Some(name).filter(|n| !n.is_empty()),
                map: Some(map).filter(|m| !m.is_empty()),
                players_online: u32::from(players),
                players_max: u32::from(max_players),
                version,
            }))
        }
        other => bail!("unexpected A2S reply header 0x{other:02X}"),
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| anyhow!("could not resolve {host}"))
}

#[async_trait]
impl StatusQuery for A2sStatusQuery {
    async fn query(&self, host: &str, port: u16, protocol: Option<&str>) -> Result<StatusReport> {
        if let Some(protocol) = protocol {
            if !protocol.eq_ignore_ascii_case("a2s") && !protocol.eq_ignore_ascii_case("steam") {
                bail!("unsupported status protocol: {protocol}");
            }
        }
        let target = resolve(host, port).await?;
        let bind: SocketAddr = if target.is_ipv4() {
            "0.0.0.0:0".parse()?
        } else {
            "[::]:0".parse()?
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(target).await?;

        let mut request = info_request(None);
        for _ in 0..=MAX_CHALLENGES {
            let reply = self.exchange(&socket, &request).await?;
            match parse_reply(&reply)? {
                InfoReply::Info(report) => {
                    debug!(%target, players = report.players_online, "status query answered");
                    return Ok(report);
                }
                InfoReply::Challenge(challenge) => request = info_request(Some(challenge)),
            }
        }
        bail!("server at {target} kept answering with challenges")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_reply() -> Vec<u8> {
        let mut reply = SINGLE_PACKET.to_vec();
        reply.push(INFO_RESPONSE);
        reply.push(17);
        for text in ["DeadZone #1", "chernarusplus", "dayz", "DayZ"] {
            reply.extend_from_slice(text.as_bytes());
            reply.push(0);
        }
        reply.extend_from_slice(&221100u32.to_le_bytes()[..2]);
        reply.extend_from_slice(&[42, 60, 0, b'd', b'l', 0, 1]);
        reply.extend_from_slice(b"1.25.0\0");
        reply
    }

    #[test]
    fn parses_info_reply() {
        let InfoReply::Info(report) = parse_reply(&info_reply()).unwrap() else {
            panic!("expected info reply");
        };
        assert_eq!(report.name.as_deref(), Some("DeadZone #1"));
        assert_eq!(report.map.as_deref(), Some("chernarusplus"));
        assert_eq!((report.players_online, report.players_max), (42, 60));
        assert_eq!(report.version.as_deref(), Some("1.25.0"));
    }

    #[test]
    fn truncated_reply_is_an_error() {
        let reply = info_reply();
        assert!(parse_reply(&reply[..12]).is_err());
    }

    #[tokio::test]
    async fn answers_a_challenge_before_reading_info() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET];
            let (len, peer) = server.recv_from(&mut buffer).await.unwrap();
            assert_eq!(&buffer[..len], info_request(None).as_slice());
            let mut challenge = SINGLE_PACKET.to_vec();
            challenge.extend_from_slice(&[CHALLENGE_RESPONSE, 1, 2, 3, 4]);
            server.send_to(&challenge, peer).await.unwrap();

            let (len, peer) = server.recv_from(&mut buffer).await.unwrap();
            assert_eq!(&buffer[..len], info_request(Some([1, 2, 3, 4])).as_slice());
            server.send_to(&info_reply(), peer).await.unwrap();
        });

        let query = A2sStatusQuery::new(Duration::from_secs(2));
        let report = query.query("127.0.0.1", port, None).await.unwrap();
        assert!(report.online);
        assert_eq!(report.players_online, 42);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let query = A2sStatusQuery::new(Duration::from_millis(100));
        assert!(query.query("127.0.0.1", port, Some("a2s")).await.is_err());
        drop(server);
    }
}
