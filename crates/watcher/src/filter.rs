//! Ignore patterns for watched roots
//!
//! Patterns use gitignore syntax and are anchored at the watch root, so
//! `build/` drops the `build` directory and everything below it, `*.swp`
//! drops swap files at any depth, and `!keep.swp` re-includes a file.

use crate::error::{Result, WatchError};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Compiled ignore rules for one root
#[derive(Debug)]
pub struct PathFilter {
    root: PathBuf,
    rules: Gitignore,
}

impl PathFilter {
    /// Compile `patterns` relative to `root`
    ///
    /// Returns `Ok(None)` when there is nothing to filter.
    pub fn build(root: &Path, patterns: &[String]) -> Result<Option<Self>> {
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            builder.add_line(None, pattern).map_err(|e| {
                WatchError::InvalidConfiguration(format!(
                    "bad ignore pattern {:?}: {}",
                    pattern, e
                ))
            })?;
        }

        let rules = builder
            .build()
            .map_err(|e| WatchError::InvalidConfiguration(e.to_string()))?;

        Ok(Some(Self {
            root: root.to_path_buf(),
            rules,
        }))
    }

    /// Check whether a path under the root should be dropped
    ///
    /// The root itself and paths outside it are never ignored.
    pub fn is_ignored(&self, path: &Path) -> bool {
        if path == self.root || !path.starts_with(&self.root) {
            return false;
        }

        // Removed paths no longer stat as directories; such entries can only
        // match directory patterns through one of their parents.
        let is_dir = path.is_dir();
        self.rules
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}
