//! HTTP liveness probe
//!
//! Probes a playlist URL with features including:
//! - HEAD first, escalating to GET only when the configured depth needs the body
//! - Playlist validation to reject soft-404 pages
//! - First-segment check for streams that list dead segments
//! - Bounded in-flight requests via a shared semaphore
//! - Optional request-rate limiting with governor
//! - Retry of transient failures through an injectable sleeper

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{Client, Response, StatusCode};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::playlist::{first_segment_url, validate_playlist};
use super::{LivenessProbe, ProbeDepth, ProbeResult};
use crate::config::ProbeConfig;
use crate::metrics;
use crate::utils::error::ProbeError;
use crate::utils::retry::{with_retry_if, RetryConfig, Sleeper, TokioSleeper};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Liveness probe over HTTP
pub struct HttpProbe {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Verification depth
    depth: ProbeDepth,

    /// Attempt budget and delay schedule
    retry: RetryConfig,

    /// Waits between attempts
    sleeper: Arc<dyn Sleeper>,

    /// Caps in-flight requests across every caller sharing this probe
    permits: Arc<Semaphore>,

    /// Optional requests-per-second cap
    rate_limiter: Option<Arc<DirectLimiter>>,
}

impl HttpProbe {
    /// Create a probe from configuration
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Http` if the HTTP client cannot be created
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .gzip(true)
            .build()?;

        let rate_limiter = config
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));

        Ok(Self {
            client,
            depth: config.depth,
            retry: config.retry(),
            sleeper: Arc::new(TokioSleeper),
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            rate_limiter,
        })
    }

    /// Replace the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override the verification depth
    pub fn with_depth(mut self, depth: ProbeDepth) -> Self {
        self.depth = depth;
        self
    }

    /// One attempt: HEAD, then GET and validation as the depth requires
    async fn check_once(&self, url: &str) -> Result<(), ProbeError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProbeError::InvalidUrl("probe pool closed".to_string()))?;

        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let head = self.client.head(url).send().await.map_err(classify)?;
        let head_unsupported = Self::head_unsupported(head.status());
        if !head.status().is_success() && !head_unsupported {
            return Err(ProbeError::Status(head.status().as_u16()));
        }

        if self.depth == ProbeDepth::Status && !head_unsupported {
            return Ok(());
        }

        let response = self.client.get(url).send().await.map_err(classify)?;
        let body = Self::success_body(response).await?;
        if self.depth == ProbeDepth::Status {
            return Ok(());
        }

        validate_playlist(&body)?;

        if self.depth == ProbeDepth::Segment {
            if let Some(segment) = first_segment_url(url, &body)? {
                self.check_segment(&segment).await?;
            }
        }

        Ok(())
    }

    /// Verify the first media segment answers
    async fn check_segment(&self, segment: &str) -> Result<(), ProbeError> {
        let unreachable = |reason: String| ProbeError::SegmentUnreachable {
            url: segment.to_string(),
            reason,
        };

        let head = self
            .client
            .head(segment)
            .send()
            .await
            .map_err(|e| unreachable(classify(e).to_string()))?;

        if head.status().is_success() {
            return Ok(());
        }
        if !Self::head_unsupported(head.status()) {
            return Err(unreachable(format!("status {}", head.status().as_u16())));
        }

        let get = self
            .client
            .get(segment)
            .send()
            .await
            .map_err(|e| unreachable(classify(e).to_string()))?;

        if get.status().is_success() {
            Ok(())
        } else {
            Err(unreachable(format!("status {}", get.status().as_u16())))
        }
    }

    async fn success_body(response: Response) -> Result<String, ProbeError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }
        response.text().await.map_err(classify)
    }

    /// 405/501 mean the server does not implement HEAD
    fn head_unsupported(status: StatusCode) -> bool {
        matches!(status.as_u16(), 405 | 501)
    }
}

fn classify(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Http(err)
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeResult {
        let started = Instant::now();

        let outcome = with_retry_if(
            &self.retry,
            self.sleeper.as_ref(),
            || self.check_once(url),
            ProbeError::is_recoverable,
        )
        .await;

        let result = match outcome {
            Ok(()) => {
                let latency = started.elapsed();
                metrics::observe_probe_latency(latency.as_secs_f64());
                ProbeResult::playable(latency)
            }
            Err(e) => ProbeResult::unreachable(e.to_string()),
        };

        tracing::debug!(
            url = %url,
            outcome = result.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Probe finished"
        );
        metrics::record_probe(result.as_str());

        result
    }
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe")
            .field("depth", &self.depth)
            .field("retry", &self.retry)
            .field("available_permits", &self.permits.available_permits())
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish()
    }
}
