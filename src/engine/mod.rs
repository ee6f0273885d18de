//! Run orchestration
//!
//! One run: load the catalog, fail resources over, restore what can go home,
//! write the catalog back, then let the publish gate decide whether to commit.
//!
//! ```text
//! Directory::load ─► FailoverController ─► RestoreController ─► save ─► should_publish ─► Publisher
//!                          │                     │
//!                          └──── CachedProbe ────┘
//! ```
//!
//! The probe cache lives for exactly one run. Catalog load failures abort the
//! run before anything is mutated; every later failure is reported in the
//! [`RunSummary`] instead.

pub mod failover;
pub mod report;
pub mod restore;

pub use failover::{FailoverController, FailoverState};
pub use report::{
    FailoverReport, PrecheckOutcome, RestoreReport, RunSummary, Transition, TransitionKind,
};
pub use restore::RestoreController;

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{Directory, UrlLocator};
use crate::config::Config;
use crate::error::{Error, MirrorwatchErrorTrait, Result};
use crate::metrics;
use crate::mirror::{MirrorRange, MirrorScanner, MirrorTemplate};
use crate::notifications::Notifier;
use crate::probe::{CachedProbe, LivenessProbe};
use crate::publish::{
    commit_message, should_publish, GitPublisher, PublishOutcome, PublishState, PublishStateStore,
    Publisher,
};

/// Per-invocation switches
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Report intended changes without writing, publishing or notifying
    pub dry_run: bool,
    /// Clock override for the publish gate
    pub now: Option<DateTime<Utc>>,
}

/// Result of the failover and restore passes over one directory
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub failover: FailoverReport,
    pub restore: RestoreReport,
}

impl PassReport {
    pub fn changed(&self) -> bool {
        self.failover.changed() || self.restore.changed()
    }
}

/// The failover and auto-restore engine
pub struct Engine {
    config: Config,
    template: MirrorTemplate,
    range: MirrorRange,
    locator: UrlLocator,
    probe: Arc<dyn LivenessProbe>,
    publisher: Option<Arc<dyn Publisher>>,
    notifier: Notifier,
}

impl Engine {
    /// Create an engine around a probe
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the configuration is inconsistent
    pub fn new(config: Config, probe: Arc<dyn LivenessProbe>) -> Result<Self> {
        config.validate().map_err(|e| Error::config(e.to_string()))?;
        let range = config.mirror.range().map_err(|e| Error::config(e.to_string()))?;
        let template = config.mirror.template();
        let locator = UrlLocator::new(&template)
            .map_err(|e| Error::config(format!("invalid mirror template: {e}")))?;

        Ok(Self {
            config,
            template,
            range,
            locator,
            probe,
            publisher: None,
            notifier: Notifier::new(),
        })
    }

    /// Publish through `publisher` instead of git in the catalog's directory
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn template(&self) -> &MirrorTemplate {
        &self.template
    }

    /// Load a catalog with this engine's template and range
    pub async fn load(&self, path: &Path) -> Result<Directory> {
        Ok(Directory::load(path, &self.locator, self.range, self.config.mirror.home()).await?)
    }

    /// Failover then restore over `directory`, probing through `probe`
    pub async fn run_pass(&self, directory: &mut Directory, probe: Arc<dyn LivenessProbe>) -> PassReport {
        let scanner = MirrorScanner::new(
            Arc::clone(&probe),
            self.template.clone(),
            self.config.scan.candidate_order(self.range),
            self.config.scan.batch_size,
        );
        let concurrency = self.config.probe.concurrency;

        let failover = FailoverController::new(Arc::clone(&probe), Arc::new(scanner), concurrency)
            .run(directory)
            .await;

        let restore = if self.config.restore.enabled {
            RestoreController::new(probe, self.template.clone(), concurrency, &self.config.restore)
                .run(directory)
                .await
        } else {
            RestoreReport::default()
        };

        PassReport { failover, restore }
    }

    /// One complete run over the catalog at `path`
    ///
    /// # Errors
    ///
    /// Only catalog load failures are fatal; publish and notification
    /// failures are reported in the summary.
    pub async fn run(&self, path: &Path, options: &RunOptions) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, catalog = %path.display(), dry_run = options.dry_run, "Starting run");

        let mut directory = self.load(path).await?;
        let original = directory.render();

        let cached = Arc::new(CachedProbe::new(Arc::clone(&self.probe)));
        let pass = self
            .run_pass(&mut directory, Arc::clone(&cached) as Arc<dyn LivenessProbe>)
            .await;

        let rendered = directory.render();
        let changes = directory.changes(&self.template);

        let publish = if options.dry_run {
            PublishOutcome::DryRun
        } else if rendered == original {
            PublishOutcome::NoChange
        } else {
            directory.save(path).await?;
            info!(catalog = %path.display(), lines = changes.len(), "Catalog written");
            let now = options.now.unwrap_or_else(Utc::now);
            self.publish(path, &rendered, &original, now).await
        };

        let summary = RunSummary {
            run_id,
            catalog: path.to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            dry_run: options.dry_run,
            resources: directory.len(),
            home: directory.home(),
            failover: pass.failover,
            restore: pass.restore,
            parse_warnings: directory.warnings().to_vec(),
            changes,
            publish,
            cache: cached.cache().stats(),
        };

        metrics::set_degraded_resources(summary.degraded().len());
        metrics::record_publish(summary.publish.as_str());
        metrics::record_run_finished(summary.finished_at.timestamp());

        info!(
            run_id = %run_id,
            healthy = summary.healthy(),
            failed_over = summary.failed_over().len(),
            restored = summary.restored().len(),
            degraded = summary.degraded().len(),
            warnings = summary.parse_warnings.len(),
            publish = summary.publish.as_str(),
            cache_hits = summary.cache.hits,
            cache_misses = summary.cache.misses,
            "Run finished"
        );

        if !options.dry_run && summary.needs_attention() && !self.notifier.is_empty() {
            self.notifier.notify(&summary.to_notification()).await;
        }

        Ok(summary)
    }

    /// Gate, publish and persist the publish time on success
    async fn publish(&self, path: &Path, new: &str, old: &str, now: DateTime<Utc>) -> PublishOutcome {
        let config = &self.config.publish;
        if !config.enabled {
            return PublishOutcome::Disabled;
        }

        let store = PublishStateStore::new(config.state_path(path));
        let last = match store.load().await {
            Ok(last) => last,
            Err(e) => {
                warn!(error = %e, "Treating publish state as empty");
                None
            }
        };
        let mut state = PublishState::new(last, config.cooldown());

        if !should_publish(new, old, now, &mut state) {
            info!(
                remaining_secs = state.remaining(now).map(|d| d.as_secs()),
                "Publish cooldown active"
            );
            return PublishOutcome::CooldownActive;
        }

        let publisher: Arc<dyn Publisher> = match &self.publisher {
            Some(publisher) => Arc::clone(publisher),
            None => Arc::new(GitPublisher::for_catalog(path, config)),
        };

        match publisher.publish(path, &commit_message(now)).await {
            Ok(receipt) => {
                let outcome = PublishOutcome::from(receipt);
                if matches!(outcome, PublishOutcome::Published | PublishOutcome::Committed) {
                    if let Some(at) = state.last_persist {
                        if let Err(e) = store.save(at).await {
                            warn!(error = %e, "Failed to record publish time");
                        }
                    }
                }
                outcome
            }
            Err(e) => {
                let reason = e.to_string();
                let err = Error::from(e);
                warn!(
                    error = %err,
                    category = err.category().as_str(),
                    recoverable = err.is_recoverable(),
                    "Publish failed"
                );
                PublishOutcome::Failed(reason)
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("template", &self.template)
            .field("range", &self.range)
            .field("notifier_channels", &self.notifier.channel_names())
            .finish_non_exhaustive()
    }
}
