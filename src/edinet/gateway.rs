// src/edinet/gateway.rs
//! Resilient request executor shared by the day-query and download paths.
use crate::config::GatewayConfig;
use crate::utils::error::GatewayError;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

const USER_AGENT: &str = concat!("edinet-digest/", env!("CARGO_PKG_VERSION"));

/// Exponential backoff: `2^attempt * backoff_unit + cooldown_floor`.
/// `attempt` is zero-based, so the first retry waits `unit + floor`.
pub fn backoff_delay(config: &GatewayConfig, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.min(16);
    config
        .backoff_unit
        .saturating_mul(factor)
        .saturating_add(config.cooldown_floor)
}

/// Runs `op` until it succeeds, fails fatally, or `max_attempts` attempts
/// (the first one included) have all failed transiently. The last error is
/// returned unchanged.
pub async fn with_retry<T, F, Fut>(
    config: &GatewayConfig,
    target: &str,
    mut op: F,
) -> Result<T, GatewayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    "{} (attempt {}/{}); retrying {} in {:.1}s",
                    err,
                    attempt + 1,
                    max_attempts,
                    target,
                    delay.as_secs_f64()
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    Body,
    NotFound,
}

fn classify_status(status: StatusCode, target: &str) -> Result<Disposition, GatewayError> {
    if status.is_success() {
        Ok(Disposition::Body)
    } else if status == StatusCode::NOT_FOUND {
        Ok(Disposition::NotFound)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(GatewayError::transient(target, "rate limited (HTTP 429)"))
    } else {
        Err(GatewayError::fatal(target, format!("HTTP {}", status)))
    }
}

fn classify_transport(err: &reqwest::Error, target: &str) -> GatewayError {
    if err.is_timeout() || err.is_connect() {
        GatewayError::transient(target, err.to_string())
    } else {
        GatewayError::fatal(target, err.to_string())
    }
}

/// One configured HTTP client with its own retry profile and politeness
/// interval.
pub struct Gateway {
    client: reqwest::Client,
    config: GatewayConfig,
    name: &'static str,
    last_request: Mutex<Option<Instant>>,
}

impl Gateway {
    /// `default_headers` are sent with every request (e.g. the API key).
    pub fn new(
        name: &'static str,
        config: GatewayConfig,
        default_headers: HeaderMap,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()?;
        Ok(Self { client, config, name, last_request: Mutex::new(None) })
    }

    /// GETs `url`; `Ok(None)` means the resource does not exist (HTTP 404).
    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Vec<u8>>, GatewayError> {
        with_retry(&self.config, url, |attempt| self.get_once(url, query, attempt)).await
    }

    async fn get_once(
        &self,
        url: &str,
        query: &[(&str, String)],
        attempt: u32,
    ) -> Result<Option<Vec<u8>>, GatewayError> {
        self.pace().await;
        tracing::debug!("[{}] GET {} {:?} (attempt {})", self.name, url, query, attempt + 1);

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify_transport(&e, url))?;

        match classify_status(response.status(), url)? {
            Disposition::NotFound => {
                tracing::debug!("[{}] 404 for {}", self.name, url);
                Ok(None)
            }
            Disposition::Body => {
                let bytes = response.bytes().await.map_err(|e| classify_transport(&e, url))?;
                tracing::debug!("[{}] received {} bytes from {}", self.name, bytes.len(), url);
                Ok(Some(bytes.to_vec()))
            }
        }
    }

    // Holds the lock across the sleep so callers queue behind each other.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.min_interval {
                sleep(self.config.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
