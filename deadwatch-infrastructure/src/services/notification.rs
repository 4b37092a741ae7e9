use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::SinkExt;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use serde_json::json;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use deadwatch_domain::NotificationChannel;

use crate::config::is_supported_url;

/// Delivers kill-feed messages to webhook (HTTP) or websocket targets.
pub struct WebhookNotifier {
    client: Client,
    channels: BTreeMap<String, String>,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(
        channels: BTreeMap<String, String>,
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout.max(Duration::from_secs(3)))
            .build()?;
        Ok(Self {
            client,
            channels,
            token,
        })
    }

    /// Configured destination ids map to URLs; ids that already are URLs
    /// are used as-is.
    pub fn resolve_url(&self, destination_id: &str) -> Result<String> {
        if let Some(url) = self.channels.get(destination_id) {
            return Ok(url.clone());
        }
        if is_supported_url(destination_id) {
            return Ok(destination_id.to_string());
        }
        anyhow::bail!("no url configured for channel {}", destination_id)
    }

    async fn send_http(&self, url: &str, message: &str) -> Result<()> {
        let mut request = self.client.post(url).json(&json!({ "content": message }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }

    async fn send_ws(&self, url: &str, destination_id: &str, message: &str) -> Result<()> {
        let payload = json!({
            "channel": destination_id,
            "content": message,
        })
        .to_string();

        let Some(token) = self.token.as_deref() else {
            return push_ws(feed_request(url, None)?, payload).await;
        };
        let header_auth = feed_request(url, Some(WsAuth::Header(token)))?;
        if let Err(err) = push_ws(header_auth, payload.clone()).await {
            warn!(channel = destination_id, error = %err, "feed socket rejected bearer header, retrying with query token");
            push_ws(feed_request(url, Some(WsAuth::Query(token)))?, payload).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for WebhookNotifier {
    async fn send(&self, destination_id: &str, message: &str) -> Result<()> {
        let url = self.resolve_url(destination_id)?;
        if url.starts_with("ws://") || url.starts_with("wss://") {
            self.send_ws(&url, destination_id, message).await?;
        } else {
            self.send_http(&url, message).await?;
        }
        debug!(channel = destination_id, bytes = message.len(), "kill feed delivered");
        Ok(())
    }
}

enum WsAuth<'a> {
    Header(&'a str),
    Query(&'a str),
}

fn feed_request(url: &str, auth: Option<WsAuth<'_>>) -> Result<Request> {
    match auth {
        None => Ok(url.into_client_request()?),
        Some(WsAuth::Header(token)) => {
            let mut request = url.into_client_request()?;
            request
                .headers_mut()
                .insert(AUTHORIZATION, format!("Bearer {token}").parse()?);
            Ok(request)
        }
        Some(WsAuth::Query(token)) => {
            let mut parsed = Url::parse(url)?;
            if !parsed.query_pairs().any(|(key, _)| key == "access_token") {
                parsed.query_pairs_mut().append_pair("access_token", token);
            }
            Ok(parsed.as_str().into_client_request()?)
        }
    }
}

/// Feed sockets are fire-and-forget: the frame is flushed and the socket
/// closed without waiting for a reply.
async fn push_ws(request: Request, payload: String) -> Result<()> {
    let (mut ws, _) = tokio_tungstenite::connect_async(request).await?;
    ws.send(Message::Text(payload)).await?;
    if let Err(err) = ws.close(None).await {
        debug!(error = %err, "feed socket close failed after send");
    }
    Ok(())
}
