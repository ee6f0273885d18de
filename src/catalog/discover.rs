//! Catalog discovery inside a repository checkout

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::CatalogConfig;
use crate::utils::error::CatalogError;

const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// Resolve `root` to a catalog file
///
/// A file is returned as is. A directory is searched recursively (entries in
/// name order, hidden and build directories skipped) for `config.file_name`,
/// then the configured fallbacks are tried.
pub fn find_catalog(root: &Path, config: &CatalogConfig) -> Result<PathBuf, CatalogError> {
    if root.is_file() {
        return Ok(root.to_path_buf());
    }
    if !root.is_dir() {
        return Err(CatalogError::NotFound {
            path: root.to_path_buf(),
        });
    }

    if let Some(found) = search(root, &config.file_name) {
        debug!(path = %found.display(), "Discovered catalog");
        return Ok(found);
    }

    config
        .fallbacks
        .iter()
        .map(|candidate| root.join(candidate))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| CatalogError::NotFound {
            path: root.join(&config.file_name),
        })
}

fn search(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(dir).ok()?.filter_map(Result::ok).collect();
    entries.sort_by_key(|entry| entry.file_name());

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_file() && name == file_name {
            return Some(path);
        }
        if file_type.is_dir() && !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref()) {
            subdirs.push(path);
        }
    }

    subdirs.iter().find_map(|sub| search(sub, file_name))
}
