use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};

fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

/// Blocking GET client with a fixed referer and bounded retries on transient failures.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    referer: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    attempts: usize,
    retry_delay: Duration,
}

impl HttpClient {
    pub(crate) fn new(referer: impl Into<String>) -> Self {
        Self {
            referer: referer.into(),
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(6),
            attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub(crate) fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    pub(crate) fn with_retries(mut self, attempts: usize, delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    pub(crate) fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(self.connect_timeout)
            .timeout_read(self.read_timeout)
            .timeout_write(self.read_timeout)
            .build();

        let mut last_error = None;
        for attempt in 1..=self.attempts {
            if attempt > 1 {
                thread::sleep(self.retry_delay);
            }

            let mut request = agent.get(url).set("Referer", &self.referer);
            for (key, value) in query {
                request = request.query(key, value);
            }

            match request.call() {
                Ok(response) => {
                    return response
                        .into_string()
                        .map_err(|err| anyhow!("response decode failed for {url}: {err}"));
                }
                Err(ureq::Error::Status(status, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    let body = body.trim();
                    let detail = if body.is_empty() {
                        format!("HTTP status {status}")
                    } else {
                        let truncated = body.chars().take(240).collect::<String>();
                        format!("HTTP status {status} ({truncated})")
                    };
                    if !is_retryable_status(status) {
                        return Err(anyhow!("request to {url} failed: {detail}"));
                    }
                    tracing::debug!("attempt {attempt} to {url} failed: {detail}");
                    last_error = Some(detail);
                }
                Err(ureq::Error::Transport(err)) => {
                    tracing::debug!("attempt {attempt} to {url} failed: transport error: {err}");
                    last_error = Some(format!("transport error: {err}"));
                }
            }
        }

        Err(anyhow!(
            "request to {url} failed after {} attempt(s): {}",
            self.attempts,
            last_error.unwrap_or_else(|| "no response".to_string())
        ))
    }
}
