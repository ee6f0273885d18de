//! Publishing through plain `git add/commit/push`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

use super::{PublishError, PublishReceipt, Publisher};
use crate::config::PublishConfig;

/// Commits the catalog in its own repository
#[derive(Debug, Clone)]
pub struct GitPublisher {
    /// Working directory for every git command
    repo_dir: PathBuf,
    user_name: Option<String>,
    user_email: Option<String>,
    push: bool,
}

impl GitPublisher {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            user_name: None,
            user_email: None,
            push: true,
        }
    }

    /// Publisher for the repository holding `catalog`
    pub fn for_catalog(catalog: &Path, config: &PublishConfig) -> Self {
        let repo_dir = catalog
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            repo_dir,
            user_name: config.git_user_name.clone(),
            user_email: config.git_user_email.clone(),
            push: config.push,
        }
    }

    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self.user_email = Some(email.into());
        self
    }

    pub fn with_push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }

    /// Arguments for `git <subcommand> ...`, identity flags first
    fn args(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(name) = &self.user_name {
            args.push("-c".to_string());
            args.push(format!("user.name={name}"));
        }
        if let Some(email) = &self.user_email {
            args.push("-c".to_string());
            args.push(format!("user.email={email}"));
        }
        args.extend(subcommand.iter().map(|s| s.to_string()));
        args
    }

    async fn output(&self, subcommand: &[&str]) -> Result<Output, PublishError> {
        Command::new("git")
            .args(self.args(subcommand))
            .current_dir(&self.repo_dir)
            .output()
            .await
            .map_err(|source| PublishError::Spawn {
                command: label(subcommand),
                source,
            })
    }

    /// Exit success of a git command; fails only when git cannot start
    async fn succeeds(&self, subcommand: &[&str]) -> Result<bool, PublishError> {
        let output = self.output(subcommand).await?;
        debug!(command = %label(subcommand), status = %output.status, "git finished");
        Ok(output.status.success())
    }

    async fn run(&self, subcommand: &[&str]) -> Result<(), PublishError> {
        let output = self.output(subcommand).await?;
        if output.status.success() {
            debug!(command = %label(subcommand), "git finished");
            return Ok(());
        }
        Err(PublishError::Git {
            command: label(subcommand),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn label(subcommand: &[&str]) -> String {
    subcommand.first().copied().unwrap_or_default().to_string()
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, catalog: &Path, message: &str) -> Result<PublishReceipt, PublishError> {
        let file = catalog
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| catalog.to_string_lossy().into_owned());

        self.run(&["add", "--", file.as_str()]).await?;

        // exit 0 means the index matches HEAD
        if self.succeeds(&["diff", "--cached", "--quiet"]).await? {
            info!(catalog = %catalog.display(), "Nothing to commit");
            return Ok(PublishReceipt::NothingToCommit);
        }

        self.run(&["commit", "-m", message]).await?;
        info!(catalog = %catalog.display(), message = %message, "Committed catalog");

        if !self.push {
            return Ok(PublishReceipt::Committed);
        }

        self.run(&["push"]).await?;
        info!("Pushed catalog update");
        Ok(PublishReceipt::Pushed)
    }
}
