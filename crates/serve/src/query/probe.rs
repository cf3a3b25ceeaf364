//! Readiness probe for servers started as background tasks.

use std::time::Duration;

use tokio::time::Instant;

/// How long to wait for a freshly spawned server, and how often to ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Poll `url` until it answers with a success status or the timeout runs
/// out. Returns the last failure on timeout.
pub async fn wait_ready(url: &str, options: ReadinessOptions) -> Result<(), String> {
    let client = reqwest::Client::builder()
        .timeout(options.poll_interval.max(Duration::from_millis(250)))
        .build()
        .map_err(|e| format!("failed to build probe client: {e}"))?;

    let deadline = Instant::now() + options.timeout;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let last_error = match client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url, attempts, "Server ready");
                return Ok(());
            }
            Ok(response) => format!("status {}", response.status()),
            Err(e) => e.to_string(),
        };

        if Instant::now() >= deadline {
            return Err(format!(
                "not ready after {} ms ({attempts} attempts): {last_error}",
                options.timeout.as_millis()
            ));
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}
