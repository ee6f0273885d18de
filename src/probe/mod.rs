//! Liveness probing of (mirror, resource) pairs
//!
//! A probe answers one question: can this URL be played right now? The
//! [`LivenessProbe`] trait is the seam every controller depends on; the HTTP
//! implementation lives in [`http`], the per-run read-through cache in
//! [`cache`], and payload validation in [`playlist`].
//!
//! Probing never fails a run. Every error collapses into
//! [`ProbeResult::Unreachable`] with a reason for the logs.

pub mod cache;
pub mod http;
pub mod playlist;

pub use cache::{CacheStats, CachedProbe, ProbeCache};
pub use http::HttpProbe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of probing one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeResult {
    /// URL is serving a valid stream
    Playable {
        /// Time from first request to verdict
        latency: Duration,
    },
    /// URL is not servable after all retries
    Unreachable {
        /// Last failure observed
        reason: String,
    },
}

impl ProbeResult {
    pub fn playable(latency: Duration) -> Self {
        Self::Playable { latency }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::Unreachable {
            reason: reason.into(),
        }
    }

    pub fn is_playable(&self) -> bool {
        matches!(self, Self::Playable { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playable { .. } => "playable",
            Self::Unreachable { .. } => "unreachable",
        }
    }
}

/// Liveness check for a single URL
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Probe `url`; never errors, failures resolve to `Unreachable`
    async fn probe(&self, url: &str) -> ProbeResult;
}

#[async_trait]
impl<P: LivenessProbe + ?Sized> LivenessProbe for Arc<P> {
    async fn probe(&self, url: &str) -> ProbeResult {
        (**self).probe(url).await
    }
}

/// How much of a stream a probe verifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeDepth {
    /// Success status on the playlist URL
    Status,
    /// Playlist body has an `#EXTM3U` header and media entries
    Playlist,
    /// Playlist is valid and its first media entry answers
    #[default]
    Segment,
}

impl FromStr for ProbeDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "status" => Ok(Self::Status),
            "playlist" => Ok(Self::Playlist),
            "segment" => Ok(Self::Segment),
            other => Err(format!(
                "unknown probe depth '{other}' (expected status, playlist or segment)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_result_helpers() {
        assert!(ProbeResult::playable(Duration::from_millis(12)).is_playable());
        let down = ProbeResult::unreachable("timeout");
        assert!(!down.is_playable());
        assert_eq!(down.as_str(), "unreachable");
    }

    #[test]
    fn test_depth_parse() {
        assert_eq!("Segment".parse::<ProbeDepth>(), Ok(ProbeDepth::Segment));
        assert_eq!("status".parse::<ProbeDepth>(), Ok(ProbeDepth::Status));
        assert!("deep".parse::<ProbeDepth>().is_err());
    }
}
