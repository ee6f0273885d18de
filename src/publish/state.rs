//! Last-publish marker file
//!
//! Holds a single unix-seconds integer. A missing or unparseable file means
//! "never published".

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::PublishError;

/// Reads and writes the last successful publish time
#[derive(Debug, Clone)]
pub struct PublishStateStore {
    path: PathBuf,
}

impl PublishStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last successful publish, if recorded
    pub async fn load(&self) -> Result<Option<DateTime<Utc>>, PublishError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PublishError::State {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let parsed = content
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        if parsed.is_none() {
            warn!(path = %self.path.display(), "Ignoring unreadable publish state");
        }
        Ok(parsed)
    }

    /// Record a successful publish
    pub async fn save(&self, at: DateTime<Utc>) -> Result<(), PublishError> {
        tokio::fs::write(&self.path, at.timestamp().to_string())
            .await
            .map_err(|source| PublishError::State {
                path: self.path.clone(),
                source,
            })
    }
}
