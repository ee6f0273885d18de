//! Publish gating and external persistence
//!
//! After a run the rewritten catalog is always saved locally. Whether it is
//! also committed and pushed is decided by [`should_publish`]: nothing is
//! published without a change, and at most once per cooldown window.

pub mod git;
pub mod state;

pub use git::GitPublisher;
pub use state::PublishStateStore;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while publishing
#[derive(Error, Debug)]
pub enum PublishError {
    /// A git command could not be started
    #[error("Failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A git command exited unsuccessfully
    #[error("git {command} failed ({status}): {stderr}")]
    Git {
        command: String,
        status: String,
        stderr: String,
    },

    /// The publish state file could not be read or written
    #[error("Publish state {}: {source}", path.display())]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    /// Pushes fail on network trouble and can be retried next run
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Git { command, .. } => command == "push",
            Self::Spawn { .. } => false,
            Self::State { .. } => true,
        }
    }
}

/// Gate state carried between runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishState {
    /// Last successful publish
    pub last_persist: Option<DateTime<Utc>>,
    /// Minimum time between publishes; zero disables the cooldown
    pub cooldown: Duration,
}

impl PublishState {
    pub fn new(last_persist: Option<DateTime<Utc>>, cooldown: Duration) -> Self {
        Self {
            last_persist,
            cooldown,
        }
    }

    /// Time left before the next publish is allowed
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_persist?;
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        self.cooldown.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

/// Decide whether a rendered catalog should be published
///
/// Unchanged content is never published. Within the cooldown of the last
/// publish nothing is published. Otherwise the publish is allowed and
/// `state.last_persist` advances to `now`, never backwards.
pub fn should_publish(new: &str, old: &str, now: DateTime<Utc>, state: &mut PublishState) -> bool {
    if new == old {
        return false;
    }

    if !state.cooldown.is_zero() {
        if let Some(last) = state.last_persist {
            let within_cooldown = match (now - last).to_std() {
                Ok(elapsed) => elapsed < state.cooldown,
                // clock moved backwards
                Err(_) => true,
            };
            if within_cooldown {
                return false;
            }
        }
    }

    state.last_persist = Some(match state.last_persist {
        Some(last) if last > now => last,
        _ => now,
    });
    true
}

/// Commit message for an automatic update
pub fn commit_message(now: DateTime<Utc>) -> String {
    format!(
        "Auto-update mirror hosts at {}",
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// What an external publish did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishReceipt {
    /// Committed and pushed
    Pushed,
    /// Committed, push disabled
    Committed,
    /// Nothing was staged
    NothingToCommit,
}

/// External persistence of the catalog
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, catalog: &Path, message: &str) -> Result<PublishReceipt, PublishError>;
}

/// Publish outcome reported in the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Catalog unchanged
    NoChange,
    /// Changed, but the last publish is too recent
    CooldownActive,
    /// Committed and pushed
    Published,
    /// Committed without pushing
    Committed,
    /// Changes already committed
    NothingToCommit,
    /// Commit or push failed; the local file is still written
    Failed(String),
    /// Preview only
    DryRun,
    /// Publishing turned off
    Disabled,
}

impl PublishOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoChange => "no_change",
            Self::CooldownActive => "cooldown_active",
            Self::Published => "published",
            Self::Committed => "committed",
            Self::NothingToCommit => "nothing_to_commit",
            Self::Failed(_) => "failed",
            Self::DryRun => "dry_run",
            Self::Disabled => "disabled",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl From<PublishReceipt> for PublishOutcome {
    fn from(receipt: PublishReceipt) -> Self {
        match receipt {
            PublishReceipt::Pushed => Self::Published,
            PublishReceipt::Committed => Self::Committed,
            PublishReceipt::NothingToCommit => Self::NothingToCommit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_unchanged_never_published() {
        let mut state = PublishState::new(None, Duration::from_secs(3600));
        assert!(!should_publish("a", "a", at(10_000), &mut state));
        assert_eq!(state.last_persist, None);
    }

    #[test]
    fn test_first_publish_allowed() {
        let mut state = PublishState::new(None, Duration::from_secs(3600));
        assert!(should_publish("b", "a", at(10_000), &mut state));
        assert_eq!(state.last_persist, Some(at(10_000)));
    }

    #[test]
    fn test_zero_cooldown_disables_rule() {
        let mut state = PublishState::new(Some(at(10_000)), Duration::ZERO);
        assert!(should_publish("b", "a", at(10_001), &mut state));
    }

    #[test]
    fn test_backwards_clock_never_lowers_last() {
        let mut state = PublishState::new(Some(at(10_000)), Duration::from_secs(3600));
        assert!(!should_publish("b", "a", at(5_000), &mut state));
        assert_eq!(state.last_persist, Some(at(10_000)));

        let mut state = PublishState::new(Some(at(10_000)), Duration::ZERO);
        assert!(should_publish("b", "a", at(5_000), &mut state));
        assert_eq!(state.last_persist, Some(at(10_000)));
    }

    #[test]
    fn test_remaining_cooldown() {
        let state = PublishState::new(Some(at(0)), Duration::from_secs(3600));
        assert_eq!(state.remaining(at(600)), Some(Duration::from_secs(3000)));
        assert_eq!(state.remaining(at(3600)), None);
        assert_eq!(PublishState::new(None, Duration::from_secs(60)).remaining(at(0)), None);
    }

    #[test]
    fn test_commit_message_format() {
        assert_eq!(
            commit_message(at(1_700_000_000)),
            "Auto-update mirror hosts at 2023-11-14T22:13:20Z"
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&PublishOutcome::Failed("push rejected".into())).unwrap();
        assert_eq!(json, r#"{"status":"failed","detail":"push rejected"}"#);
        let json = serde_json::to_string(&PublishOutcome::CooldownActive).unwrap();
        assert_eq!(json, r#"{"status":"cooldown_active"}"#);
    }
}
