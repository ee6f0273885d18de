//! Search the mirror-id space for a working alternative
//!
//! Sequential mode probes one candidate at a time. Fast mode probes a batch
//! concurrently but only accepts a winner once every higher-priority candidate
//! in that batch has resolved, so the chosen mirror is the same one the
//! sequential search would pick.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{CandidateOrder, MirrorId, MirrorTemplate};
use crate::probe::LivenessProbe;

/// Finds a playable mirror for a resource path
pub struct MirrorScanner {
    probe: Arc<dyn LivenessProbe>,
    template: MirrorTemplate,
    order: CandidateOrder,
    batch_size: usize,
}

impl MirrorScanner {
    pub fn new(
        probe: Arc<dyn LivenessProbe>,
        template: MirrorTemplate,
        order: CandidateOrder,
        batch_size: usize,
    ) -> Self {
        Self {
            probe,
            template,
            order,
            batch_size: batch_size.max(1),
        }
    }

    pub fn template(&self) -> &MirrorTemplate {
        &self.template
    }

    pub fn order(&self) -> &CandidateOrder {
        &self.order
    }

    /// First playable candidate in priority order, skipping `exclude`
    pub async fn find_mirror_for(&self, path: &str, exclude: Option<MirrorId>) -> Option<MirrorId> {
        let candidates = self.order.candidates(exclude);
        debug!(
            path = %path,
            exclude = ?exclude.map(MirrorId::get),
            candidates = candidates.len(),
            order = self.order.mode().as_str(),
            batch_size = self.batch_size,
            "Scanning for alternate mirror"
        );

        let found = if self.batch_size <= 1 {
            self.scan_sequential(path, &candidates).await
        } else {
            self.scan_batched(path, &candidates).await
        };

        match found {
            Some(id) => debug!(path = %path, mirror = %id, "Found playable mirror"),
            None => debug!(path = %path, "No playable mirror found"),
        }
        found
    }

    async fn scan_sequential(&self, path: &str, candidates: &[MirrorId]) -> Option<MirrorId> {
        for &id in candidates {
            let url = self.template.url(id, path);
            let result = self.probe.probe(&url).await;
            trace!(url = %url, outcome = result.as_str(), "Candidate probed");
            if result.is_playable() {
                return Some(id);
            }
        }
        None
    }

    async fn scan_batched(&self, path: &str, candidates: &[MirrorId]) -> Option<MirrorId> {
        for batch in candidates.chunks(self.batch_size) {
            if let Some(id) = self.scan_batch(path, batch).await {
                return Some(id);
            }
        }
        None
    }

    /// Probe one batch concurrently; dropping the stream abandons the rest
    async fn scan_batch(&self, path: &str, batch: &[MirrorId]) -> Option<MirrorId> {
        let probe = &self.probe;
        let mut pending: FuturesUnordered<_> = batch
            .iter()
            .enumerate()
            .map(|(index, &id)| {
                let url = self.template.url(id, path);
                async move {
                    let playable = probe.probe(&url).await.is_playable();
                    (index, playable)
                }
            })
            .collect();

        let mut resolved: Vec<Option<bool>> = vec![None; batch.len()];
        while let Some((index, playable)) = pending.next().await {
            resolved[index] = Some(playable);

            for (position, state) in resolved.iter().enumerate() {
                match state {
                    Some(true) => return Some(batch[position]),
                    Some(false) => continue,
                    None => break,
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for MirrorScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorScanner")
            .field("template", &self.template)
            .field("order", &self.order.mode())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
