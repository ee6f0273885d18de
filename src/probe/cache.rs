//! Per-run probe cache
//!
//! Probe results are treated as stable for the duration of one run, so the
//! same URL probed by the initial check, a mirror scan and the restore pass
//! hits the network once. The cache is an explicit object owned by the run,
//! never a global.
//!
//! Each URL maps to a `tokio::sync::OnceCell`: concurrent callers of the same
//! URL wait on one in-flight probe instead of issuing their own. If the
//! caller driving the initialisation is dropped (an abandoned scan), the cell
//! stays empty and the next caller probes afresh.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use super::{LivenessProbe, ProbeResult};
use crate::metrics;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache (or an in-flight probe)
    pub hits: u64,
    /// Lookups that issued a probe
    pub misses: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// URL-keyed read-through store of probe results
#[derive(Debug, Default)]
pub struct ProbeCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<ProbeResult>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProbeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, url: &str) -> Arc<OnceCell<ProbeResult>> {
        let mut cells = match self.cells.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(cells.entry(url.to_string()).or_default())
    }

    /// Cached result for `url`, if one has completed
    pub fn get(&self, url: &str) -> Option<ProbeResult> {
        let cells = match self.cells.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cells.get(url).and_then(|cell| cell.get().cloned())
    }

    /// Number of URLs with a completed result
    pub fn len(&self) -> usize {
        let cells = match self.cells.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cells.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Wraps a probe with a [`ProbeCache`]
pub struct CachedProbe<P> {
    inner: P,
    cache: ProbeCache,
}

impl<P: LivenessProbe> CachedProbe<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: ProbeCache::new(),
        }
    }

    pub fn cache(&self) -> &ProbeCache {
        &self.cache
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: LivenessProbe> LivenessProbe for CachedProbe<P> {
    async fn probe(&self, url: &str) -> ProbeResult {
        let cell = self.cache.cell(url);
        if let Some(result) = cell.get() {
            self.cache.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_hit();
            return result.clone();
        }

        let mut issued = false;
        let result = cell
            .get_or_init(|| {
                issued = true;
                self.inner.probe(url)
            })
            .await
            .clone();

        if issued {
            self.cache.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_hit();
        }

        result
    }
}
