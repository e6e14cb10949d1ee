//! Source file discovery with glob patterns.
//!
//! Patterns are matched against paths relative to a base directory, and `*`
//! never crosses a `/` (so `*.css` only matches top-level files while
//! `**/*.css` matches at any depth). Results are sorted so that output that
//! depends on input order, like concatenated bundles, is reproducible.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

use sitekit_shared::{Result, SiteError};

/// Compile a glob pattern for relative-path matching.
pub fn glob(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| SiteError::validation(format!("invalid glob '{pattern}': {e}")))
}

/// All files below `base` whose relative path matches `pattern`, sorted.
/// A missing `base` yields no files.
pub fn collect(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob(pattern)?;
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(base).follow_links(true) {
        let entry = entry.map_err(|e| walk_error(base, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(base) else {
            continue;
        };
        if matcher.is_match(relative) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Collect several `(base, pattern)` groups in order. Each group is sorted on
/// its own; a file matched by an earlier group is not repeated.
pub fn collect_groups(groups: &[(&Path, &str)]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for (base, pattern) in groups {
        for file in collect(base, pattern)? {
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }
    }
    Ok(files)
}

fn walk_error(base: &Path, err: walkdir::Error) -> SiteError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| base.to_path_buf());
    match err.into_io_error() {
        Some(io) => SiteError::io(path, io),
        None => SiteError::validation(format!("filesystem loop at {}", path.display())),
    }
}
