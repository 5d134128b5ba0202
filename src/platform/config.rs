// LogTrail - platform/config.rs
//
// Platform-specific directory resolution and config.toml loading with
// startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for LogTrail configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logtrail/ or %APPDATA%\LogTrail\config\)
    pub config_dir: PathBuf,

    /// User format directory (e.g. ~/.config/logtrail/formats/)
    pub user_formats_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let user_formats_dir = config_dir.join(constants::FORMATS_DIR_NAME);

            tracing::debug!(
                config = %config_dir.display(),
                formats = %user_formats_dir.display(),
                "Platform paths resolved"
            );

            Self {
                config_dir,
                user_formats_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                user_formats_dir: fallback.join(constants::FORMATS_DIR_NAME),
                config_dir: fallback,
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are ignored so a newer config file still works with an
/// older binary.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub reader: ReaderSection,
    pub tail: TailSection,
    pub formats: FormatsSection,
    pub logging: LoggingSection,
}

/// `[reader]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    /// Maximum single record size in bytes.
    pub max_entry_size_bytes: Option<usize>,
    /// Bytes sampled from the file head for charset detection.
    pub detection_sample_bytes: Option<usize>,
}

/// `[tail]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct TailSection {
    pub poll_interval_ms: Option<u64>,
}

/// `[formats]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct FormatsSection {
    /// Extra format files, relative paths resolved against the config file.
    pub files: Option<Vec<String>>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Every value is checked against the named bounds in `util::constants`;
/// invalid values produce a warning and fall back to the default.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    // -- Reader --
    pub max_entry_size: usize,
    pub detection_sample_bytes: usize,

    // -- Tail --
    pub poll_interval_ms: u64,

    // -- Formats --
    pub format_files: Vec<PathBuf>,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_entry_size: constants::DEFAULT_MAX_ENTRY_SIZE,
            detection_sample_bytes: constants::DEFAULT_DETECTION_SAMPLE_BYTES,
            poll_interval_ms: constants::TAIL_POLL_INTERVAL_MS,
            format_files: Vec::new(),
            log_level: None,
            log_file: None,
        }
    }
}

/// Load and validate the config file at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal
/// warnings. A missing file yields defaults with no warnings (first run).
/// An unreadable or unparseable file yields defaults plus one warning; the
/// application still starts but the user is told.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<ConfigError>) {
    let mut warnings = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(e) => {
            warnings.push(ConfigError::Io {
                path: config_path.to_path_buf(),
                source: e,
            });
            return (AppConfig::default(), warnings);
        }
    };

    let raw: RawConfig = match toml::from_str(&content) {
        Ok(r) => r,
        Err(e) => {
            warnings.push(ConfigError::TomlParse {
                path: config_path.to_path_buf(),
                source: e,
            });
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    let config = validate(raw, base_dir, &mut warnings);

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Config validation produced warnings");
    }

    (config, warnings)
}

/// Check every raw value against its bounds, accumulating all problems.
fn validate(raw: RawConfig, base_dir: &Path, warnings: &mut Vec<ConfigError>) -> AppConfig {
    let mut config = AppConfig::default();

    // -- Reader: max_entry_size_bytes --
    if let Some(size) = raw.reader.max_entry_size_bytes {
        if (constants::MIN_MAX_ENTRY_SIZE..=constants::ABSOLUTE_MAX_ENTRY_SIZE).contains(&size) {
            config.max_entry_size = size;
        } else {
            warnings.push(out_of_range(
                "reader.max_entry_size_bytes",
                size,
                constants::MIN_MAX_ENTRY_SIZE,
                constants::ABSOLUTE_MAX_ENTRY_SIZE,
                constants::DEFAULT_MAX_ENTRY_SIZE,
            ));
        }
    }

    // -- Reader: detection_sample_bytes --
    if let Some(bytes) = raw.reader.detection_sample_bytes {
        if (constants::MIN_DETECTION_SAMPLE_BYTES..=constants::ABSOLUTE_MAX_DETECTION_SAMPLE_BYTES)
            .contains(&bytes)
        {
            config.detection_sample_bytes = bytes;
        } else {
            warnings.push(out_of_range(
                "reader.detection_sample_bytes",
                bytes,
                constants::MIN_DETECTION_SAMPLE_BYTES,
                constants::ABSOLUTE_MAX_DETECTION_SAMPLE_BYTES,
                constants::DEFAULT_DETECTION_SAMPLE_BYTES,
            ));
        }
    }

    // -- Tail: poll_interval_ms --
    if let Some(ms) = raw.tail.poll_interval_ms {
        if (constants::MIN_TAIL_POLL_INTERVAL_MS..=constants::MAX_TAIL_POLL_INTERVAL_MS)
            .contains(&ms)
        {
            config.poll_interval_ms = ms;
        } else {
            warnings.push(out_of_range(
                "tail.poll_interval_ms",
                ms,
                constants::MIN_TAIL_POLL_INTERVAL_MS,
                constants::MAX_TAIL_POLL_INTERVAL_MS,
                constants::TAIL_POLL_INTERVAL_MS,
            ));
        }
    }

    // -- Formats: files --
    if let Some(files) = raw.formats.files {
        config.format_files = files
            .iter()
            .filter(|f| !f.trim().is_empty())
            .map(|f| {
                let path = PathBuf::from(f);
                if path.is_absolute() {
                    path
                } else {
                    base_dir.join(path)
                }
            })
            .collect();
    }

    // -- Logging: level --
    if let Some(level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level);
        } else {
            warnings.push(ConfigError::ValueOutOfRange {
                field: "logging.level".to_string(),
                value: level,
                expected: "one of error, warn, info, debug, trace (using default info)"
                    .to_string(),
            });
        }
    }

    // -- Logging: file --
    if let Some(file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file);
        }
    }

    config
}

fn out_of_range<T: std::fmt::Display>(
    field: &str,
    value: T,
    min: T,
    max: T,
    default: T,
) -> ConfigError {
    ConfigError::ValueOutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        expected: format!("{min}-{max} (using default {default})"),
    }
}
