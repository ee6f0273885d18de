//! Restore: migrate displaced resources back to their home mirror
//!
//! Runs after failover and only ever moves resources toward home. Pinned
//! paths keep whatever working mirror they are on.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::report::{PrecheckOutcome, RestoreReport, Transition, TransitionKind};
use crate::catalog::Directory;
use crate::config::RestoreConfig;
use crate::metrics;
use crate::mirror::{mirror_alive_by_sample, MirrorId, MirrorTemplate};
use crate::probe::LivenessProbe;

/// Drives re-mapping back to home once it recovers
pub struct RestoreController {
    probe: Arc<dyn LivenessProbe>,
    template: MirrorTemplate,
    concurrency: usize,
    precheck: bool,
    sample_size: usize,
    pinned: HashSet<String>,
}

impl RestoreController {
    pub fn new(
        probe: Arc<dyn LivenessProbe>,
        template: MirrorTemplate,
        concurrency: usize,
        config: &RestoreConfig,
    ) -> Self {
        Self {
            probe,
            template,
            concurrency: concurrency.max(1),
            precheck: config.precheck,
            sample_size: config.sample_size,
            pinned: config.pinned_paths.iter().cloned().collect(),
        }
    }

    pub fn is_pinned(&self, path: &str) -> bool {
        self.pinned.contains(path)
    }

    /// Sample resources at `home`: those already there first, then displaced ones.
    ///
    /// Returns whether home is alive and the paths the sample covered.
    async fn home_alive(&self, directory: &Directory, home: MirrorId) -> (bool, HashSet<String>) {
        let mut seen = HashSet::new();
        let (on_home, displaced): (Vec<_>, Vec<_>) = directory
            .resources()
            .iter()
            .partition(|r| r.current() == home);

        let paths: Vec<&str> = on_home
            .into_iter()
            .chain(displaced)
            .map(|r| r.path())
            .filter(|path| seen.insert(*path))
            .collect();
        let sampled = paths
            .iter()
            .take(self.sample_size)
            .map(|path| path.to_string())
            .collect();

        let alive = mirror_alive_by_sample(
            self.probe.as_ref(),
            &self.template,
            home,
            &paths,
            self.sample_size,
        )
        .await;
        (alive, sampled)
    }

    /// Move every displaced, unpinned resource whose home is playable
    pub async fn run(&self, directory: &mut Directory) -> RestoreReport {
        let mut report = RestoreReport::default();

        let mut candidates: Vec<(usize, String, MirrorId)> = Vec::new();
        for (index, resource) in directory.resources().iter().enumerate() {
            if !resource.is_displaced() {
                continue;
            }
            if self.is_pinned(resource.path()) {
                report.pinned += 1;
                continue;
            }
            candidates.push((index, resource.path().to_string(), resource.home()));
        }

        if candidates.is_empty() {
            debug!("No displaced resources to restore");
            return report;
        }

        if self.precheck {
            let Some(home) = directory.home() else {
                return report;
            };
            let (alive, sampled) = self.home_alive(directory, home).await;
            if alive {
                report.precheck = PrecheckOutcome::HomeAlive;
            } else {
                report.precheck = PrecheckOutcome::HomeDown;
                // a down sample only rules out the paths it covered
                let before = candidates.len();
                candidates.retain(|(_, path, candidate_home)| {
                    *candidate_home != home || !sampled.contains(path)
                });
                report.still_displaced = before - candidates.len();
                if candidates.is_empty() {
                    info!(home = %home, sampled = sampled.len(), "Home mirror down, skipping restore");
                    return report;
                }
                info!(
                    home = %home,
                    sampled = sampled.len(),
                    unsampled = candidates.len(),
                    "Home sample down, checking unsampled resources"
                );
            }
        }

        let mut playable: Vec<(usize, bool)> = stream::iter(candidates)
            .map(|(index, path, home)| async move {
                let url = self.template.url(home, &path);
                (index, self.probe.probe(&url).await.is_playable())
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        playable.sort_by_key(|(index, _)| *index);

        for (index, home_playable) in playable {
            if !home_playable {
                report.still_displaced += 1;
                continue;
            }
            let Some(resource) = directory.resource(index) else {
                continue;
            };
            let path = resource.path().to_string();
            let line = resource.line_number();
            let from = resource.current();
            let home = resource.home();

            if directory.set_current(index, home).unwrap_or(false) {
                info!(path = %path, from = %from, to = %home, "Restored to home");
                metrics::record_transition(TransitionKind::Restored.as_str());
                report.restored.push(Transition {
                    path,
                    line,
                    from,
                    to: Some(home),
                    kind: TransitionKind::Restored,
                });
            }
        }

        report
    }
}
