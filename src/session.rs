// src/session.rs

use crate::config::{Settings, MAX_BURST_REQUESTS, REQUESTS_PER_SECOND};
use crate::error::{Result, SeriesError};
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Rate-limited HTTP session for the Polygon API.
///
/// Cheap to clone; clones share the client and the rate limiter. Create one
/// at startup and pass it to whatever downloads data.
#[derive(Clone)]
pub struct PolygonHistorySession {
    client: Client,
    api_key: String,
    rate_limiter: Arc<Mutex<PolygonRateLimiter>>,
}

impl PolygonHistorySession {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_rate(api_key, REQUESTS_PER_SECOND, MAX_BURST_REQUESTS)
    }

    pub fn with_rate(api_key: impl Into<String>, requests_per_second: u32, max_burst: u32) -> Self {
        PolygonHistorySession {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter: Arc::new(Mutex::new(PolygonRateLimiter::new(requests_per_second, max_burst))),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .polygon_api_key
            .clone()
            .ok_or_else(|| SeriesError::validation("POLYGON_API_KEY is not set"))?;
        Ok(Self::with_rate(
            api_key,
            settings.requests_per_second,
            settings.max_burst_requests,
        ))
    }

    pub async fn send_request(&self, url: &str) -> Result<Response> {
        let separator = if url.contains('?') { '&' } else { '?' };
        let url_with_api_key = format!("{}{}apiKey={}", url, separator, self.api_key);

        self.rate_limiter.lock().await.acquire().await;
        debug!(url, "sending request");

        // errors drop the url so the key never reaches logs or messages
        let response = self
            .client
            .get(&url_with_api_key)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        Ok(response.error_for_status().map_err(reqwest::Error::without_url)?)
    }
}

/// Token bucket refilled at a fixed rate.
pub struct PolygonRateLimiter {
    tokens: u32,
    max_burst: u32,
    last_refill_time: Instant,
    refill_interval: Duration,
}

impl PolygonRateLimiter {
    pub fn new(requests_per_second: u32, max_burst: u32) -> Self {
        let max_burst = max_burst.max(1);
        PolygonRateLimiter {
            tokens: max_burst,
            max_burst,
            last_refill_time: Instant::now(),
            refill_interval: Duration::from_secs(1) / requests_per_second.max(1),
        }
    }

    pub fn available(&self) -> u32 {
        self.tokens
    }

    pub async fn acquire(&mut self) {
        while self.tokens == 0 {
            let now = Instant::now();
            let elapsed = now - self.last_refill_time;

            if elapsed >= self.refill_interval {
                let refill_count = (elapsed.as_secs_f32() / self.refill_interval.as_secs_f32()) as u32;
                self.tokens = std::cmp::min(self.tokens + refill_count, self.max_burst);
                self.last_refill_time = now;
            } else {
                sleep(self.refill_interval - elapsed).await;
            }
        }

        self.tokens -= 1;
    }
}
