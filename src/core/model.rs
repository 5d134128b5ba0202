// LogTrail - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no platform
// dependencies. These types are the shared vocabulary across all layers.

use crate::util::constants;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// =============================================================================
// Log Record (output of parsing)
// =============================================================================

/// A single structured record extracted from one or more raw log lines.
///
/// Created fresh for every line that matches a format's primary pattern,
/// mutated while that line is parsed and while continuation lines are
/// stitched onto it, then handed to the caller and never touched again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Caller-assigned ordering key. Stable across records that share a
    /// timestamp; the parser itself always leaves this at 0.
    pub sequence: u64,

    /// Parsed timestamp. `None` is the "unparsed" sentinel: the line had no
    /// timestamp group, the group was empty, or it did not fit the declared
    /// format. Sorts before every parsed timestamp.
    pub timestamp: Option<NaiveDateTime>,

    /// Message text, including any continuation lines.
    pub message: String,

    /// Original source text, including any continuation lines.
    pub raw_line: String,

    /// File name (no directory) of the source file.
    pub file_name: String,

    /// Full path of the source file. Set by the reader.
    pub file_path: PathBuf,

    /// Line number of the first line contributing to this record.
    pub line_number: u64,

    /// Every other captured or derived field, keyed by its authored group name,
    /// in first-insertion order.
    pub fields: IndexMap<String, String>,
}

impl LogRecord {
    /// Start an empty record for a line of `file_name`.
    pub fn new(file_name: &str, line_number: u64) -> Self {
        Self {
            file_name: file_name.to_string(),
            line_number,
            ..Self::default()
        }
    }

    /// Value of an extracted field, or the empty string when absent.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Append a continuation line to both the message and the raw text.
    ///
    /// Each side stops growing once it exceeds `max_entry_size`; the caller
    /// truncates the overflow afterwards.
    pub fn append_continuation(&mut self, line: &str, max_entry_size: usize) {
        if self.message.len() <= max_entry_size {
            self.message.push('\n');
            self.message.push_str(line);
        }
        if self.raw_line.len() <= max_entry_size {
            self.raw_line.push('\n');
            self.raw_line.push_str(line);
        }
    }

    /// Cap message and raw text at `max_entry_size` bytes.
    pub fn enforce_max_size(&mut self, max_entry_size: usize) {
        truncate_text(&mut self.message, max_entry_size);
        truncate_text(&mut self.raw_line, max_entry_size);
    }
}

fn truncate_text(text: &mut String, max: usize) {
    if text.len() <= max || text.ends_with(constants::TRUNCATION_MARKER) {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(constants::TRUNCATION_MARKER);
}

// =============================================================================
// Checkpoint
// =============================================================================

/// Resume point for incremental reads of one file.
///
/// Opaque to the caller: it is handed back unmodified on the next pass.
/// Valid only for the file it came from; a file smaller than `offset` is
/// treated as rotated and re-read from the start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileCheckpoint {
    /// File this checkpoint belongs to.
    pub path: PathBuf,

    /// Byte offset up to which the file has been consumed.
    pub offset: u64,

    /// Last line number consumed.
    pub line_number: u64,
}

impl FileCheckpoint {
    /// Checkpoint for a file that has never been read.
    pub fn start(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            line_number: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// Format definitions (immutable caller input)
// =============================================================================

/// A declarative log format: one primary pattern plus an ordered chain of
/// sub-extractions over the fields it produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatDefinition {
    /// Identifying name (unique within a loaded set).
    pub name: String,

    /// Primary regex with named capture groups. A line starts a new record
    /// only when this matches.
    pub pattern: String,

    /// chrono format string for the `timestamp` group (e.g. `%Y-%m-%d %H:%M:%S`).
    #[serde(default)]
    pub timestamp_format: String,

    /// Sub-extractions, evaluated strictly in declared order.
    #[serde(default)]
    pub sub_patterns: Vec<SubPatternDefinition>,

    /// Transforms applied to groups of the primary pattern.
    #[serde(default)]
    pub field_transforms: Vec<FieldTransform>,

    /// Attach non-matching lines to the preceding record.
    #[serde(default)]
    pub is_multiline: bool,
}

/// A chained regex evaluated against an already extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPatternDefinition {
    /// Field to read: "message" (any casing) or any field name produced earlier.
    pub source_field: String,

    pub pattern: String,

    #[serde(default)]
    pub match_type: MatchPolicy,

    /// Joins per-occurrence values under `MatchPolicy::All`.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Regex option names, e.g. `["IgnoreCase", "Singleline"]`.
    #[serde(default)]
    pub options: Vec<String>,

    /// Transforms applied to this stage's groups.
    #[serde(default)]
    pub field_transforms: Vec<FieldTransform>,
}

fn default_separator() -> String {
    constants::DEFAULT_ALL_MATCH_SEPARATOR.to_string()
}

impl Default for SubPatternDefinition {
    fn default() -> Self {
        Self {
            source_field: String::new(),
            pattern: String::new(),
            match_type: MatchPolicy::default(),
            separator: default_separator(),
            options: Vec::new(),
            field_transforms: Vec::new(),
        }
    }
}

/// How many matches a sub-extraction consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Only the first match; each group overwrites its field.
    #[default]
    #[serde(alias = "first")]
    First,

    /// Every non-overlapping match; per-group values are joined with the
    /// stage's separator and written once.
    #[serde(alias = "all")]
    All,
}

/// Value rewrite for one named field: exact-match substitution, then template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTransform {
    /// Target field name (exact match).
    pub field: String,

    /// Exact-match substitution table, applied first.
    #[serde(default)]
    pub map: Option<HashMap<String, String>>,

    /// Template containing `{value}`, applied after the map.
    #[serde(default)]
    pub format: Option<String>,
}

/// Regex flags a sub-pattern may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexOption {
    /// Case-insensitive matching.
    IgnoreCase,
    /// `^` and `$` match at line boundaries.
    Multiline,
    /// `.` also matches `\n`.
    Singleline,
    /// Whitespace and `#` comments in the pattern are ignored.
    IgnorePatternWhitespace,
}

impl RegexOption {
    /// Look up an option by name, case-insensitively. Returns `None` for
    /// names that are not supported.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ignorecase" => Some(Self::IgnoreCase),
            "multiline" => Some(Self::Multiline),
            "singleline" => Some(Self::Singleline),
            "ignorepatternwhitespace" => Some(Self::IgnorePatternWhitespace),
            _ => None,
        }
    }
}

// =============================================================================
// Tail progress (for background watchers)
// =============================================================================

/// Messages sent from the background tail thread to its owner.
#[derive(Debug, Clone)]
pub enum TailProgress {
    /// Tail started; number of files being watched.
    Started { file_count: usize },

    /// Records parsed during one poll cycle, in sequence order.
    NewRecords {
        records: Vec<LogRecord>,
        checkpoints: Vec<FileCheckpoint>,
    },

    /// A non-fatal error on one file; the watcher keeps going.
    FileError { path: PathBuf, message: String },

    /// The watcher observed the cancel flag and exited.
    Stopped,
}
