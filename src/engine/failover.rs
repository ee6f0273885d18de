//! Failover: move resources off mirrors that stopped serving them
//!
//! Per resource: `Healthy → Searching → {FailedOver | Degraded}`. Decisions
//! are computed concurrently and applied to the directory one by one once
//! every resource has been checked.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use super::report::{FailoverReport, Transition, TransitionKind};
use crate::catalog::Directory;
use crate::metrics;
use crate::mirror::{MirrorId, MirrorScanner};
use crate::probe::LivenessProbe;

/// Per-resource failover state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverState {
    /// Playable on its current mirror
    Healthy,
    /// Current mirror failed; a working alternative was found
    FailedOver(MirrorId),
    /// Current mirror failed and no candidate works
    Degraded,
}

/// Drives re-mapping away from failing mirrors
pub struct FailoverController {
    probe: Arc<dyn LivenessProbe>,
    scanner: Arc<MirrorScanner>,
    concurrency: usize,
}

impl FailoverController {
    pub fn new(probe: Arc<dyn LivenessProbe>, scanner: Arc<MirrorScanner>, concurrency: usize) -> Self {
        Self {
            probe,
            scanner,
            concurrency: concurrency.max(1),
        }
    }

    /// Probe one resource at `current`, searching for an alternative on failure
    pub async fn decide(&self, path: &str, current: MirrorId) -> FailoverState {
        let url = self.scanner.template().url(current, path);
        if self.probe.probe(&url).await.is_playable() {
            return FailoverState::Healthy;
        }

        match self.scanner.find_mirror_for(path, Some(current)).await {
            Some(found) => FailoverState::FailedOver(found),
            None => FailoverState::Degraded,
        }
    }

    /// Check every resource and re-point the failing ones
    pub async fn run(&self, directory: &mut Directory) -> FailoverReport {
        let targets: Vec<(usize, String, MirrorId)> = directory
            .resources()
            .iter()
            .enumerate()
            .map(|(index, r)| (index, r.path().to_string(), r.current()))
            .collect();

        let mut decisions: Vec<(usize, FailoverState)> = stream::iter(targets)
            .map(|(index, path, current)| async move {
                (index, self.decide(&path, current).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        decisions.sort_by_key(|(index, _)| *index);

        let mut report = FailoverReport::default();
        for (index, state) in decisions {
            let Some(resource) = directory.resource(index) else {
                continue;
            };
            let path = resource.path().to_string();
            let line = resource.line_number();
            let from = resource.current();

            match state {
                FailoverState::Healthy => report.healthy += 1,
                FailoverState::FailedOver(to) => match directory.set_current(index, to) {
                    Ok(_) => {
                        info!(path = %path, from = %from, to = %to, "Failed over");
                        metrics::record_transition(TransitionKind::FailedOver.as_str());
                        report.failed_over.push(Transition {
                            path,
                            line,
                            from,
                            to: Some(to),
                            kind: TransitionKind::FailedOver,
                        });
                    }
                    Err(e) => {
                        warn!(path = %path, error = %e, "Rejected failover target");
                        report.degraded.push(degraded(path, line, from));
                    }
                },
                FailoverState::Degraded => {
                    warn!(path = %path, mirror = %from, degraded = true, "No working mirror found");
                    report.degraded.push(degraded(path, line, from));
                }
            }
        }

        report
    }
}

fn degraded(path: String, line: usize, from: MirrorId) -> Transition {
    metrics::record_transition(TransitionKind::Degraded.as_str());
    Transition {
        path,
        line,
        from,
        to: None,
        kind: TransitionKind::Degraded,
    }
}
