// LogTrail - core/format.rs
//
// Format definition loading and validation.
// Core layer: accepts TOML strings, never touches the filesystem.
// I/O is handled by app::format_mgr which feeds content here.
//
// A format file holds one or more `[[format]]` tables; their order in the
// file is their priority order.

use crate::core::model::FormatDefinition;
use crate::core::parser::FormatParser;
use crate::util::error::FormatError;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Raw TOML shape of a format file.
#[derive(Debug, Deserialize)]
pub struct FormatFile {
    #[serde(default, rename = "format")]
    pub formats: Vec<FormatDefinition>,
}

/// Parse a TOML string into its format definitions, validating each one.
///
/// `source_path` is used for error messages only (not for I/O).
pub fn parse_format_toml(
    toml_content: &str,
    source_path: &Path,
) -> Result<Vec<FormatDefinition>, FormatError> {
    let file: FormatFile = toml::from_str(toml_content).map_err(|e| FormatError::TomlParse {
        path: source_path.to_path_buf(),
        source: e,
    })?;

    let mut seen = HashSet::new();
    for def in &file.formats {
        validate(def)?;
        if !seen.insert(def.name.as_str()) {
            return Err(FormatError::DuplicateName {
                name: def.name.clone(),
                path: source_path.to_path_buf(),
            });
        }
    }

    if file.formats.is_empty() {
        tracing::warn!(source = %source_path.display(), "Format file defines no [[format]] tables");
    }

    Ok(file.formats)
}

/// Validate a definition and prove that it compiles.
///
/// Checks required fields, then compiles every pattern so broken regex
/// syntax is rejected here rather than on first use.
pub fn validate(def: &FormatDefinition) -> Result<(), FormatError> {
    if def.name.trim().is_empty() {
        return Err(FormatError::MissingField {
            format: "(empty)".to_string(),
            field: "name",
        });
    }
    if def.pattern.is_empty() {
        return Err(FormatError::MissingField {
            format: def.name.clone(),
            field: "pattern",
        });
    }
    for sub in &def.sub_patterns {
        if sub.source_field.trim().is_empty() {
            return Err(FormatError::MissingField {
                format: def.name.clone(),
                field: "sub_patterns.source_field",
            });
        }
    }

    let parser = FormatParser::new(def)?;
    if parser.has_timestamp_group() && def.timestamp_format.is_empty() {
        tracing::warn!(
            format = %def.name,
            "Pattern captures a timestamp but no timestamp_format is set; \
             every record will be unparsed"
        );
    }
    Ok(())
}

// =============================================================================
// Built-in formats (embedded at compile time)
// =============================================================================

/// Embedded TOML content for built-in formats.
/// Each tuple is (filename, TOML content).
pub fn builtin_format_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "bracketed_level.toml",
            include_str!("../../formats/bracketed_level.toml"),
        ),
        ("log4j.toml", include_str!("../../formats/log4j.toml")),
        ("syslog.toml", include_str!("../../formats/syslog.toml")),
    ]
}

/// Load and validate all built-in formats, in embedding order.
///
/// Invalid built-ins are logged and skipped (non-fatal).
pub fn load_builtin_formats() -> Vec<FormatDefinition> {
    let mut formats = Vec::new();

    for (filename, content) in builtin_format_sources() {
        let path = PathBuf::from(format!("<builtin>/{filename}"));
        match parse_format_toml(content, &path) {
            Ok(defs) => {
                for def in &defs {
                    tracing::debug!(format = %def.name, "Loaded built-in format");
                }
                formats.extend(defs);
            }
            Err(e) => {
                tracing::error!(file = filename, error = %e, "Failed to load built-in format");
            }
        }
    }

    formats
}

// =============================================================================
// Tests
// =============================================================================
