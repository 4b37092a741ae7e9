use anyhow::{anyhow, Result};

pub fn is_supported_url(url: &str) -> bool {
    ["http://", "https://", "ws://", "wss://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

pub fn validate_channel(id: &str, url: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(anyhow!("channel id is empty"));
    }
    if !is_supported_url(url) {
        return Err(anyhow!("channel {} has an unsupported url scheme", id));
    }
    Ok(())
}
