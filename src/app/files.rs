// LogTrail - app/files.rs
//
// Resolves the command-line file arguments (plain paths or glob patterns)
// into the concrete set of files to read.

use std::collections::HashSet;
use std::path::PathBuf;

/// Expand `patterns` into regular files.
///
/// Each pattern's matches are sorted; the overall order follows the
/// pattern order and a file matched twice is kept at its first position.
/// A plain path that does not exist yet is kept as-is so it can be tailed
/// once created. Invalid patterns and unreadable matches are returned as
/// warnings.
pub fn resolve_patterns(patterns: &[String]) -> (Vec<PathBuf>, Vec<String>) {
    let mut files = Vec::new();
    let mut seen = HashSet::new();
    let mut warnings = Vec::new();

    for pattern in patterns {
        if !has_glob_meta(pattern) {
            let path = PathBuf::from(pattern);
            if path.is_dir() {
                warnings.push(format!("'{pattern}' is a directory; skipped"));
                continue;
            }
            if seen.insert(path.clone()) {
                files.push(path);
            }
            continue;
        }

        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "Invalid glob pattern");
                warnings.push(format!("Invalid pattern '{pattern}': {e}"));
                continue;
            }
        };

        let mut matched = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => matched.push(path),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(pattern = %pattern, error = %e, "Glob entry unreadable");
                    warnings.push(format!("Cannot read '{}': {}", e.path().display(), e.error()));
                }
            }
        }

        if matched.is_empty() {
            warnings.push(format!("Pattern '{pattern}' matched no files"));
        }

        matched.sort();
        for path in matched {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    tracing::debug!(patterns = patterns.len(), files = files.len(), "Patterns resolved");
    (files, warnings)
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}
