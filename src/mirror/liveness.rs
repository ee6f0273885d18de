//! Mirror-level liveness by sampling
//!
//! A mirror counts as alive when any sampled resource on it is playable.

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use super::{MirrorId, MirrorTemplate};
use crate::probe::LivenessProbe;

/// Probe up to `sample_size` of `paths` on `mirror`, stopping at the first playable one
pub async fn mirror_alive_by_sample<P>(
    probe: &P,
    template: &MirrorTemplate,
    mirror: MirrorId,
    paths: &[&str],
    sample_size: usize,
) -> bool
where
    P: LivenessProbe + ?Sized,
{
    let mut pending: FuturesUnordered<_> = paths
        .iter()
        .take(sample_size)
        .map(|path| {
            let url = template.url(mirror, path);
            async move { probe.probe(&url).await.is_playable() }
        })
        .collect();

    let sampled = pending.len();
    while let Some(playable) = pending.next().await {
        if playable {
            debug!(mirror = %mirror, sampled, "Mirror alive");
            return true;
        }
    }

    debug!(mirror = %mirror, sampled, "No sampled resource playable on mirror");
    false
}
