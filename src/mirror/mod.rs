//! Mirror identifiers, naming template and mirror search
//!
//! Mirrors are interchangeable origins addressed by a numeric id embedded in
//! the hostname (`fl22.moveonjoy.com`). This module turns ids into URLs,
//! orders candidate ids for a search, and finds a working mirror for a path.
//!
//! - [`MirrorId`] / [`MirrorRange`] - ids and the inclusive range they live in
//! - [`MirrorTemplate`] - `{scheme}://{prefix}{id}.{domain}/{path}`
//! - [`order`] - candidate ordering (descending, weighted random, forced)
//! - [`scanner`] - [`MirrorScanner`], sequential or batched search
//! - [`liveness`] - "is this mirror alive at all" by sampling resources

pub mod liveness;
pub mod order;
pub mod scanner;

pub use liveness::mirror_alive_by_sample;
pub use order::{CandidateOrder, SearchOrder};
pub use scanner::MirrorScanner;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::CatalogError;

/// Numeric mirror identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MirrorId(pub u32);

impl MirrorId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MirrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of valid mirror ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRange {
    pub min: u32,
    pub max: u32,
}

impl MirrorRange {
    /// Create a range, rejecting `min > max`
    pub fn new(min: u32, max: u32) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    pub fn contains(&self, id: MirrorId) -> bool {
        (self.min..=self.max).contains(&id.0)
    }

    /// Validate an id against the range
    pub fn check(&self, id: u32) -> Result<MirrorId, CatalogError> {
        if (self.min..=self.max).contains(&id) {
            Ok(MirrorId(id))
        } else {
            Err(CatalogError::MirrorOutOfRange {
                id,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Ids from MAX down to MIN
    pub fn descending(&self) -> impl Iterator<Item = MirrorId> {
        (self.min..=self.max).rev().map(MirrorId)
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.max - self.min) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

/// Hostname template that maps a mirror id to a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTemplate {
    /// URL scheme, e.g. `https`
    pub scheme: String,

    /// Host label prefix preceding the id, e.g. `fl`
    pub host_prefix: String,

    /// Fixed domain following the id, e.g. `moveonjoy.com`
    pub domain: String,
}

impl Default for MirrorTemplate {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host_prefix: "fl".to_string(),
            domain: "moveonjoy.com".to_string(),
        }
    }
}

impl MirrorTemplate {
    pub fn new(
        scheme: impl Into<String>,
        host_prefix: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host_prefix: host_prefix.into(),
            domain: domain.into(),
        }
    }

    /// Hostname for a mirror, e.g. `fl22.moveonjoy.com`
    pub fn host(&self, id: MirrorId) -> String {
        format!("{}{}.{}", self.host_prefix, id, self.domain)
    }

    /// Full URL of `path` on a mirror
    pub fn url(&self, id: MirrorId, path: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.host(id), path)
    }
}
