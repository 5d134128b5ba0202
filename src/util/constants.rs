// LogTrail - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Every configurable value is validated against the bounds defined here.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogTrail";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogTrail";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Parsing limits
// =============================================================================

/// Maximum size of a single record's message or raw line in bytes. Records
/// growing past this under multiline continuation are truncated so that a
/// pathological file cannot grow one record without bound.
pub const DEFAULT_MAX_ENTRY_SIZE: usize = 64 * 1024; // 64 KB

/// Minimum user-configurable entry size cap.
pub const MIN_MAX_ENTRY_SIZE: usize = 1024;

/// Maximum user-configurable entry size cap.
pub const ABSOLUTE_MAX_ENTRY_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// Marker appended to a message or raw line after truncation.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Placeholder substituted by a field transform's format template.
pub const TRANSFORM_VALUE_PLACEHOLDER: &str = "{value}";

/// Separator used to join all-occurrence sub-pattern matches when the
/// definition does not name one.
pub const DEFAULT_ALL_MATCH_SEPARATOR: &str = ", ";

/// Capture group names with dedicated record slots (compared case-insensitively).
pub const TIMESTAMP_GROUP: &str = "timestamp";
pub const MESSAGE_GROUP: &str = "message";

// =============================================================================
// Encoding detection
// =============================================================================

/// Number of bytes sampled from the start of a file for charset detection.
pub const DEFAULT_DETECTION_SAMPLE_BYTES: usize = 256 * 1024; // 256 KB

/// Minimum user-configurable detection sample.
pub const MIN_DETECTION_SAMPLE_BYTES: usize = 512;

/// Maximum user-configurable detection sample.
pub const ABSOLUTE_MAX_DETECTION_SAMPLE_BYTES: usize = 8 * 1024 * 1024; // 8 MB

// =============================================================================
// Live tail limits
// =============================================================================

/// How often the tail watcher polls each tracked file for new content (ms).
pub const TAIL_POLL_INTERVAL_MS: u64 = 500;

/// How often the cancel flag is checked within each poll sleep interval (ms).
pub const TAIL_CANCEL_CHECK_INTERVAL_MS: u64 = 100;

/// Minimum user-configurable tail poll interval (ms).
pub const MIN_TAIL_POLL_INTERVAL_MS: u64 = 100;

/// Maximum user-configurable tail poll interval (ms).
pub const MAX_TAIL_POLL_INTERVAL_MS: u64 = 10_000; // 10 s

/// Maximum number of files a single tail session tracks.
pub const MAX_TRACKED_FILES: usize = 2_000;

// =============================================================================
// Format definition limits
// =============================================================================

/// Maximum number of format definitions loaded at once.
pub const MAX_FORMATS: usize = 100;

/// Maximum size of a format definition file in bytes.
pub const MAX_FORMAT_FILE_SIZE: u64 = 256 * 1024; // 256 KB

/// Maximum length of a single regex pattern (guards against pathological patterns).
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// Maximum number of sub-patterns chained under one format.
pub const MAX_SUB_PATTERNS: usize = 64;

// =============================================================================
// Logging
// =============================================================================

/// Default tracing filter when nothing else is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// File names
// =============================================================================

/// Name of the optional configuration file in the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory under the config dir scanned for user format definitions.
pub const FORMATS_DIR_NAME: &str = "formats";
