use std::future::Future;
use std::time::Duration;

use tracing::warn;

const BACKOFF_STEP_MS: u64 = 50;

/// Runs a store operation up to `attempts` times with linear backoff.
pub async fn with_retry<T, F, Fut>(attempts: u32, operation: &str, mut op: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                warn!(operation, attempt, error = %err, "store operation failed, retrying");
                tokio::time::sleep(Duration::from_millis(BACKOFF_STEP_MS * attempt as u64)).await;
                attempt += 1;
            }
        }
    }
}
