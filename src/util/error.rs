// LogTrail - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation; every variant keeps its cause so the
// full chain reaches the diagnostic log.
//
// Per-line conditions (no match, bad timestamp, missing sub-pattern source)
// are NOT errors and never appear here.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogTrail operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogTrailError {
    /// Format definition loading, validation, or compilation failed.
    Format(FormatError),

    /// A read pass over a log file failed.
    Read(ReadError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// Checkpoint store could not be loaded or saved.
    Checkpoint(CheckpointError),
}

impl fmt::Display for LogTrailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "Format error: {e}"),
            Self::Read(e) => write!(f, "Read error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Checkpoint(e) => write!(f, "Checkpoint error: {e}"),
        }
    }
}

impl std::error::Error for LogTrailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Format(e) => Some(e),
            Self::Read(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Checkpoint(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Format errors
// ---------------------------------------------------------------------------

/// Errors related to format definition loading and compilation.
///
/// All of these are construction-time failures: a definition that produces
/// one must be rejected before any line is parsed with it.
#[derive(Debug)]
pub enum FormatError {
    /// TOML file could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Format file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// A required field is missing from the format definition.
    MissingField {
        format: String,
        field: &'static str,
    },

    /// A regex pattern in the definition is invalid.
    InvalidRegex {
        format: String,
        field: String,
        pattern: String,
        source: regex::Error,
    },

    /// A regex pattern exceeds the maximum allowed length.
    RegexTooLong {
        format: String,
        field: String,
        length: usize,
        max_length: usize,
    },

    /// A sub-pattern names a regex option that is not supported.
    UnknownRegexOption {
        format: String,
        field: String,
        option: String,
    },

    /// Too many sub-patterns are chained under one format.
    TooManySubPatterns {
        format: String,
        count: usize,
        max: usize,
    },

    /// Two definitions in the same file share a name.
    DuplicateName { name: String, path: PathBuf },

    /// Maximum number of formats exceeded.
    TooManyFormats { count: usize, max: usize },

    /// A format was requested by name but none is loaded under that name.
    UnknownFormat { name: String },

    /// I/O error reading a format file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse TOML '{}': {source}", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Format file '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::MissingField { format, field } => {
                write!(f, "Format '{format}': missing required field '{field}'")
            }
            Self::InvalidRegex {
                format,
                field,
                pattern,
                source,
            } => write!(
                f,
                "Format '{format}': invalid regex in '{field}' ('{pattern}'): {source}"
            ),
            Self::RegexTooLong {
                format,
                field,
                length,
                max_length,
            } => write!(
                f,
                "Format '{format}': regex in '{field}' is {length} chars, \
                 exceeds maximum of {max_length}"
            ),
            Self::UnknownRegexOption {
                format,
                field,
                option,
            } => write!(
                f,
                "Format '{format}': unknown regex option '{option}' in '{field}'. \
                 Valid options: IgnoreCase, Multiline, Singleline, IgnorePatternWhitespace"
            ),
            Self::TooManySubPatterns { format, count, max } => write!(
                f,
                "Format '{format}' chains {count} sub-patterns, maximum is {max}"
            ),
            Self::DuplicateName { name, path } => write!(
                f,
                "Duplicate format name '{name}' in '{}'",
                path.display()
            ),
            Self::TooManyFormats { count, max } => {
                write!(f, "Too many formats loaded ({count}), maximum is {max}")
            }
            Self::UnknownFormat { name } => write!(f, "No format named '{name}' is loaded"),
            Self::Io { path, source } => {
                write!(
                    f,
                    "I/O error reading format file '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<FormatError> for LogTrailError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

// ---------------------------------------------------------------------------
// Read errors
// ---------------------------------------------------------------------------

/// Errors raised by an incremental read pass.
///
/// A missing or shrunken file is handled inside the reader and never
/// surfaces here; only genuine I/O failures do.
#[derive(Debug)]
pub enum ReadError {
    /// The file exists but could not be opened, sized, or read.
    Io {
        file: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                file,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                file.display()
            ),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ReadError> for LogTrailError {
    fn from(e: ReadError) -> Self {
        Self::Read(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LogTrailError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Checkpoint store errors
// ---------------------------------------------------------------------------

/// Errors from the binary's JSON checkpoint store.
#[derive(Debug)]
pub enum CheckpointError {
    /// I/O error reading or writing the store.
    Io { path: PathBuf, source: io::Error },

    /// Store content is not valid checkpoint JSON.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Checkpoint store I/O error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "Checkpoint store '{}' is malformed: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<CheckpointError> for LogTrailError {
    fn from(e: CheckpointError) -> Self {
        Self::Checkpoint(e)
    }
}
