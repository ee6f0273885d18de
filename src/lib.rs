//! mirrorwatch - per-channel mirror failover and auto-restore for IPTV playlists
//!
//! Keeps every stream URL in an M3U catalog pointed at a mirror that is
//! actually serving it. Each resource is probed on its current mirror; failing
//! ones are moved to the best working alternative, and displaced ones are
//! moved back home once home recovers. Changed catalogs are written back
//! byte-for-byte outside the rewritten hosts and published through git behind
//! a cooldown.
//!
//! # Architecture
//!
//! - [`catalog`] - Catalog discovery, parsing and lossless rendering
//! - [`mirror`] - Mirror ids, URL templates, candidate ordering and scanning
//! - [`probe`] - Liveness probing and the per-run probe cache
//! - [`engine`] - Failover and restore controllers and the run summary
//! - [`publish`] - Publish gate, cooldown state and the git publisher
//! - [`notifications`] - Webhook and Pushbullet run summaries
//! - [`config`] - Layered configuration
//! - [`metrics`] - Prometheus metrics and textfile export
//! - [`utils`] - Retry helpers and shared domain errors
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use mirrorwatch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let probe = Arc::new(HttpProbe::new(&config.probe)?);
//!     let engine = Engine::new(config, probe)?;
//!     let summary = engine.run(Path::new("us.m3u"), &RunOptions::default()).await?;
//!     println!("{}", summary.headline());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod mirror;
pub mod notifications;
pub mod probe;
pub mod publish;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::Directory;
    pub use crate::config::Config;
    pub use crate::engine::{Engine, RunOptions, RunSummary};
    pub use crate::error::{Error, ErrorCategory, MirrorwatchErrorTrait, Result};
    pub use crate::mirror::MirrorId;
    pub use crate::probe::{CachedProbe, HttpProbe, LivenessProbe, ProbeResult};
}
