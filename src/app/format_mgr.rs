// LogTrail - app/format_mgr.rs
//
// Loads format definitions from user TOML files on disk and merges them
// with the built-in formats embedded in the binary.
//
// Priority order: user definitions first (in file order), built-ins after.
// A user definition named like a built-in replaces that built-in.

use crate::core::format;
use crate::core::model::FormatDefinition;
use crate::util::constants;
use crate::util::error::FormatError;
use std::path::{Path, PathBuf};

/// Load every available format.
///
/// Broken user files are logged, reported and skipped (non-fatal).
/// Returns the merged list and the errors encountered.
pub fn load_all_formats(user_files: &[PathBuf]) -> (Vec<FormatDefinition>, Vec<FormatError>) {
    let mut formats: Vec<FormatDefinition> = Vec::new();
    let mut errors = Vec::new();

    for path in user_files {
        match load_format_file(path) {
            Ok(defs) => {
                for def in defs {
                    if formats.iter().any(|f| f.name == def.name) {
                        tracing::warn!(
                            format = %def.name,
                            file = %path.display(),
                            "Format name already defined by an earlier file; skipped"
                        );
                        errors.push(FormatError::DuplicateName {
                            name: def.name,
                            path: path.clone(),
                        });
                        continue;
                    }
                    tracing::info!(format = %def.name, file = %path.display(), "Loaded user format");
                    formats.push(def);
                }
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Failed to load format file");
                errors.push(e);
            }
        }
    }

    let user_count = formats.len();
    for builtin in format::load_builtin_formats() {
        if formats.iter().any(|f| f.name == builtin.name) {
            tracing::info!(format = %builtin.name, "User format overrides built-in");
            continue;
        }
        formats.push(builtin);
    }

    if formats.len() > constants::MAX_FORMATS {
        tracing::warn!(
            count = formats.len(),
            max = constants::MAX_FORMATS,
            "Too many formats loaded, truncating"
        );
        errors.push(FormatError::TooManyFormats {
            count: formats.len(),
            max: constants::MAX_FORMATS,
        });
        formats.truncate(constants::MAX_FORMATS);
    }

    tracing::info!(
        user = user_count,
        total = formats.len(),
        "Format loading complete"
    );

    (formats, errors)
}

/// Pick `names` out of `all`, in the order requested.
///
/// An empty `names` selects everything. Unknown names are returned as the
/// second element so the caller can report them.
pub fn select_formats(
    all: &[FormatDefinition],
    names: &[String],
) -> (Vec<FormatDefinition>, Vec<String>) {
    if names.is_empty() {
        return (all.to_vec(), Vec::new());
    }

    let mut selected = Vec::with_capacity(names.len());
    let mut unknown = Vec::new();
    for name in names {
        match all.iter().find(|f| &f.name == name) {
            Some(def) => selected.push(def.clone()),
            None => unknown.push(name.clone()),
        }
    }
    (selected, unknown)
}

/// `.toml` files directly inside `dir`, sorted by name. A missing directory
/// yields nothing.
pub fn format_files_in_dir(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Format directory not readable (skipping)");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("toml"))
        .collect();
    files.sort();
    files
}

/// Read, size-check and parse one format file.
fn load_format_file(path: &Path) -> Result<Vec<FormatDefinition>, FormatError> {
    let metadata = std::fs::metadata(path).map_err(|e| FormatError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if metadata.len() > constants::MAX_FORMAT_FILE_SIZE {
        return Err(FormatError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size: constants::MAX_FORMAT_FILE_SIZE,
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| FormatError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    format::parse_format_toml(&content, path)
}
