//! Generic async FDSN event web-service client with per-source rate
//! limiting and retry-with-backoff. Reusable across every configured
//! source — USGS, EMSC, GFZ GEOFON, or any other FDSN-compliant peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::errors::FetchError;
use crate::sources::SourceConfig;

const USER_AGENT: &str = concat!("quakeweave/", env!("CARGO_PKG_VERSION"));

/// Token-bucket rate limiter: one call permitted every `min_interval`.
///
/// `last_call_millis` stores a monotonic-clock offset in milliseconds as
/// an atomic so `acquire` can be called from `&self` without a mutex.
pub struct RateLimiter {
    min_interval: Duration,
    started_at: std::time::Instant,
    last_call_millis: AtomicU64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(rpm: u32) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(60.0 / f64::from(rpm.max(1))),
            started_at: std::time::Instant::now(),
            last_call_millis: AtomicU64::new(0),
        }
    }

    /// Block until at least `min_interval` has elapsed since the last call.
    pub async fn acquire(&self) {
        let now_millis = self.started_at.elapsed().as_millis() as u64;
        let last = self.last_call_millis.load(Ordering::Acquire);
        let elapsed = Duration::from_millis(now_millis.saturating_sub(last));

        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }

        let after_millis = self.started_at.elapsed().as_millis() as u64;
        self.last_call_millis.store(after_millis, Ordering::Release);
    }
}

/// Async HTTP client for one FDSN event web service, carrying its own
/// rate limiter and retry policy.
pub struct FdsnClient {
    http: Client,
    config: SourceConfig,
    rate_limiter: RateLimiter,
}

impl FdsnClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: SourceConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FetchError {
                source: config.name.to_string(),
                last_status: None,
                attempts: 0,
                reason: e.to_string(),
            })?;

        let rate_limiter = RateLimiter::new(config.rate_limit_rpm);

        Ok(Self { http, config, rate_limiter })
    }

    /// Fetch events in `[start, end)` with magnitude at least `min_magnitude`.
    /// Returns the raw response body (GeoJSON or FDSN text, depending on
    /// the source's format).
    ///
    /// An HTTP 204 (no events matched) is treated as success with an
    /// empty body, not a retry-eligible condition.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] once retries (bounded by
    /// `config.max_retries`) are exhausted. Only transport errors, 5xx,
    /// and 429 responses are retried; other 4xx responses fail immediately.
    #[instrument(skip(self), fields(source = self.config.name))]
    pub async fn fetch_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        min_magnitude: f64,
    ) -> Result<String, FetchError> {
        let params = [
            ("format", self.config.format.query_param().to_string()),
            ("starttime", start.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("endtime", end.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("minmagnitude", min_magnitude.to_string()),
            ("orderby", "time".to_string()),
        ];

        let mut last_status: Option<u16> = None;
        let mut last_reason = String::new();

        for attempt in 0..=self.config.max_retries {
            self.rate_limiter.acquire().await;

            match self.http.get(self.config.base_url).query(&params).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.as_u16() == 204 {
                        debug!("{} returned 204, no events in window", self.config.name);
                        return Ok(String::new());
                    }

                    if status.is_success() {
                        return response.text().await.map_err(|e| FetchError {
                            source: self.config.name.to_string(),
                            last_status: Some(status.as_u16()),
                            attempts: attempt + 1,
                            reason: e.to_string(),
                        });
                    }

                    last_status = Some(status.as_u16());
                    last_reason = format!("HTTP {status}");

                    if !is_retry_eligible_status(status.as_u16()) {
                        break;
                    }
                }
                Err(e) => {
                    last_reason = e.to_string();
                }
            }

            if attempt < self.config.max_retries {
                let backoff = self.config.retry_backoff_base.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
                warn!(
                    "{}: attempt {}/{} failed ({last_reason}), retrying in {backoff:.1}s",
                    self.config.name,
                    attempt + 1,
                    self.config.max_retries + 1,
                );
                sleep(Duration::from_secs_f64(backoff)).await;
            }
        }

        Err(FetchError {
            source: self.config.name.to_string(),
            last_status,
            attempts: self.config.max_retries + 1,
            reason: last_reason,
        })
    }
}

/// Only transport errors, 5xx, and 429 are worth retrying; other 4xx
/// responses (bad request, not found) will never succeed on replay.
fn is_retry_eligible_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
