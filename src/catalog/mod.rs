//! Resource directory loaded from the catalog file
//!
//! The catalog is kept as its raw lines. Lines carrying a mirror URL become
//! [`Resource`] entries; every other line is opaque and written back byte for
//! byte. Rendering an unchanged directory reproduces the input exactly, and a
//! changed directory differs only in the mirror-id tokens of changed lines.

pub mod discover;
pub mod line;
pub mod locate;

pub use discover::find_catalog;
pub use line::{split_lines, LineEnding, RawLine};
pub use locate::{ResourceLine, UrlLocator};

use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

use crate::mirror::{MirrorId, MirrorRange, MirrorTemplate};
use crate::utils::error::CatalogError;

/// A catalog line that could not be interpreted as a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

/// A resource addressed through a mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    path: String,
    line: usize,
    home: MirrorId,
    loaded: MirrorId,
    current: MirrorId,
}

impl Resource {
    /// Stable path, e.g. `ESPN/index.m3u8`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 1-based line number in the catalog
    pub fn line_number(&self) -> usize {
        self.line + 1
    }

    pub fn home(&self) -> MirrorId {
        self.home
    }

    pub fn current(&self) -> MirrorId {
        self.current
    }

    /// Mirror the resource was on when the catalog was loaded
    pub fn loaded(&self) -> MirrorId {
        self.loaded
    }

    pub fn is_displaced(&self) -> bool {
        self.current != self.home
    }
}

/// One rewritten line, for previews
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineChange {
    /// 1-based line number
    pub line: usize,
    pub path: String,
    pub old_host: String,
    pub new_host: String,
}

#[derive(Debug, Clone)]
enum Entry {
    Opaque(RawLine),
    Resource {
        raw: RawLine,
        parts: ResourceLine,
        index: usize,
    },
}

/// In-memory catalog: raw lines plus resource entries
#[derive(Debug, Clone)]
pub struct Directory {
    entries: Vec<Entry>,
    resources: Vec<Resource>,
    range: MirrorRange,
    warnings: Vec<ParseWarning>,
}

impl Directory {
    /// Parse catalog content
    ///
    /// `home` overrides the home mirror; otherwise the first resource's
    /// mirror is home. Lines with a located URL whose id is not a number, is
    /// outside `range`, or whose path is empty stay opaque and are reported
    /// as warnings.
    pub fn parse(
        content: &str,
        locator: &UrlLocator,
        range: MirrorRange,
        home: Option<MirrorId>,
    ) -> Self {
        let mut entries = Vec::new();
        let mut resources: Vec<Resource> = Vec::new();
        let mut warnings = Vec::new();
        let mut home = home;

        for (line, raw) in split_lines(content).into_iter().enumerate() {
            let Some(parts) = locator.locate(&raw.text) else {
                entries.push(Entry::Opaque(raw));
                continue;
            };

            let id = match Self::interpret(&parts, range, line + 1) {
                Ok(id) => id,
                Err(err) => {
                    warn!(line = line + 1, error = %err, "Skipping malformed catalog line");
                    warnings.push(ParseWarning {
                        line: line + 1,
                        reason: err.to_string(),
                    });
                    entries.push(Entry::Opaque(raw));
                    continue;
                }
            };

            let home_id = *home.get_or_insert(id);
            let index = resources.len();
            resources.push(Resource {
                path: parts.path.clone(),
                line,
                home: home_id,
                loaded: id,
                current: id,
            });
            entries.push(Entry::Resource { raw, parts, index });
        }

        debug!(
            lines = entries.len(),
            resources = resources.len(),
            warnings = warnings.len(),
            home = ?home.map(MirrorId::get),
            "Parsed catalog"
        );

        Self {
            entries,
            resources,
            range,
            warnings,
        }
    }

    fn interpret(parts: &ResourceLine, range: MirrorRange, line: usize) -> Result<MirrorId, CatalogError> {
        let id: u32 = parts.token.parse().map_err(|_| {
            CatalogError::malformed(line, format!("mirror id '{}' is not a number", parts.token))
        })?;
        let id = range
            .check(id)
            .map_err(|err| CatalogError::malformed(line, err.to_string()))?;
        if parts.path.is_empty() {
            return Err(CatalogError::malformed(line, "empty resource path"));
        }
        Ok(id)
    }

    /// Read and parse a catalog file
    ///
    /// # Errors
    ///
    /// `NotFound` when the file does not exist, `Unreadable` on other I/O errors
    pub async fn load(
        path: &Path,
        locator: &UrlLocator,
        range: MirrorRange,
        home: Option<MirrorId>,
    ) -> Result<Self, CatalogError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CatalogError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                CatalogError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Ok(Self::parse(&content, locator, range, home))
    }

    /// Write the rendered catalog back
    pub async fn save(&self, path: &Path) -> Result<(), CatalogError> {
        tokio::fs::write(path, self.render())
            .await
            .map_err(|source| CatalogError::WriteFailed {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Serialize the directory
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                Entry::Opaque(raw) => {
                    out.push_str(&raw.text);
                    out.push_str(raw.ending.as_str());
                }
                Entry::Resource { raw, parts, index } => {
                    let resource = &self.resources[*index];
                    if resource.current == resource.loaded {
                        out.push_str(&raw.text);
                    } else {
                        out.push_str(&parts.render_with(resource.current));
                    }
                    out.push_str(raw.ending.as_str());
                }
            }
        }
        out
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, index: usize) -> Option<&Resource> {
        self.resources.get(index)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Home mirror, if the catalog has any resource
    pub fn home(&self) -> Option<MirrorId> {
        self.resources.first().map(Resource::home)
    }

    pub fn range(&self) -> MirrorRange {
        self.range
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    /// Point resource `index` at `mirror`
    ///
    /// Returns whether the current mirror changed.
    ///
    /// # Errors
    ///
    /// `MirrorOutOfRange` when `mirror` is outside the directory's range
    pub fn set_current(&mut self, index: usize, mirror: MirrorId) -> Result<bool, CatalogError> {
        let id = self.range.check(mirror.get())?;
        let Some(resource) = self.resources.get_mut(index) else {
            return Ok(false);
        };
        let changed = resource.current != id;
        resource.current = id;
        Ok(changed)
    }

    /// Whether any resource is off the mirror it was loaded on
    pub fn is_dirty(&self) -> bool {
        self.resources.iter().any(|r| r.current != r.loaded)
    }

    /// Lines that would be rewritten, in file order
    pub fn changes(&self, template: &MirrorTemplate) -> Vec<LineChange> {
        self.resources
            .iter()
            .filter(|r| r.current != r.loaded)
            .map(|r| LineChange {
                line: r.line_number(),
                path: r.path.clone(),
                old_host: template.host(r.loaded),
                new_host: template.host(r.current),
            })
            .collect()
    }
}
