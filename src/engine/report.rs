//! Per-controller reports and the run summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use uuid::Uuid;

use crate::catalog::{LineChange, ParseWarning};
use crate::mirror::MirrorId;
use crate::notifications::{Notification, Severity};
use crate::probe::CacheStats;
use crate::publish::PublishOutcome;

/// What happened to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Moved off a failing mirror
    FailedOver,
    /// Failing, and no candidate mirror works
    Degraded,
    /// Moved back to home
    Restored,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailedOver => "failed_over",
            Self::Degraded => "degraded",
            Self::Restored => "restored",
        }
    }
}

/// One resource state change, `to` is `None` for degraded resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub path: String,
    /// 1-based catalog line
    pub line: usize,
    pub from: MirrorId,
    pub to: Option<MirrorId>,
    pub kind: TransitionKind,
}

/// Outcome of a failover pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailoverReport {
    /// Resources playable on their current mirror
    pub healthy: usize,
    pub failed_over: Vec<Transition>,
    pub degraded: Vec<Transition>,
}

impl FailoverReport {
    /// Whether any resource was re-pointed
    pub fn changed(&self) -> bool {
        !self.failed_over.is_empty()
    }
}

/// Result of the home-mirror pre-check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecheckOutcome {
    /// Pre-check disabled or nothing to restore
    #[default]
    Skipped,
    /// At least one sampled resource is playable at home
    HomeAlive,
    /// No sampled resource is playable at home; restore pass skipped
    HomeDown,
}

/// Outcome of a restore pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub precheck: PrecheckOutcome,
    pub restored: Vec<Transition>,
    /// Displaced resources left where they are because their path is pinned
    pub pinned: usize,
    /// Displaced resources whose home is still unplayable
    pub still_displaced: usize,
}

impl RestoreReport {
    pub fn changed(&self) -> bool {
        !self.restored.is_empty()
    }
}

/// Aggregate of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub catalog: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub resources: usize,
    pub home: Option<MirrorId>,
    pub failover: FailoverReport,
    pub restore: RestoreReport,
    pub parse_warnings: Vec<ParseWarning>,
    pub changes: Vec<LineChange>,
    pub publish: PublishOutcome,
    pub cache: CacheStats,
}

impl RunSummary {
    /// Whether the catalog content changed
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn healthy(&self) -> usize {
        self.failover.healthy
    }

    pub fn failed_over(&self) -> &[Transition] {
        &self.failover.failed_over
    }

    pub fn restored(&self) -> &[Transition] {
        &self.restore.restored
    }

    pub fn degraded(&self) -> &[Transition] {
        &self.failover.degraded
    }

    /// Worth telling someone about
    pub fn needs_attention(&self) -> bool {
        self.changed() || !self.degraded().is_empty() || self.publish.is_failure()
    }

    /// One-line headline
    pub fn headline(&self) -> String {
        let mut parts = Vec::new();
        if !self.failed_over().is_empty() {
            parts.push(format!("{} failed over", self.failed_over().len()));
        }
        if !self.restored().is_empty() {
            parts.push(format!("{} restored", self.restored().len()));
        }
        if !self.degraded().is_empty() {
            parts.push(format!("{} degraded", self.degraded().len()));
        }
        if parts.is_empty() {
            parts.push(format!("{} healthy", self.healthy()));
        }
        format!("mirrorwatch: {}", parts.join(", "))
    }

    /// Multi-line human-readable report
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.headline());
        let _ = writeln!(
            out,
            "resources={} healthy={} failed_over={} restored={} degraded={} warnings={} publish={}",
            self.resources,
            self.healthy(),
            self.failed_over().len(),
            self.restored().len(),
            self.degraded().len(),
            self.parse_warnings.len(),
            self.publish.as_str(),
        );

        for t in self.failed_over().iter().chain(self.restored()) {
            if let Some(to) = t.to {
                let _ = writeln!(out, "  {} {}: {} -> {}", t.kind.as_str(), t.path, t.from, to);
            }
        }
        for t in self.degraded() {
            let _ = writeln!(out, "  degraded {}: no working mirror (stays on {})", t.path, t.from);
        }
        for w in &self.parse_warnings {
            let _ = writeln!(out, "  warning line {}: {}", w.line, w.reason);
        }
        if let PublishOutcome::Failed(reason) = &self.publish {
            let _ = writeln!(out, "  publish failed: {reason}");
        }
        out
    }

    pub fn to_notification(&self) -> Notification {
        let severity = if self.degraded().is_empty() && !self.publish.is_failure() {
            Severity::Info
        } else {
            Severity::Warning
        };
        let details = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        Notification::new(severity, self.headline(), self.render_text(), details)
    }
}
