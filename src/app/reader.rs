// LogTrail - app/reader.rs
//
// Incremental, checkpointed reading of a single log file.
//
// One pass is one sequential scan from the checkpoint offset to end-of-file:
//   - size == offset   -> Unchanged: no records, checkpoint returned as-is.
//   - size <  offset   -> Rotated: restart at offset 0, line 0, full read.
//   - size >  offset   -> Appended: read from offset, line counter continues.
//
// The encoding is detected once per pass from the head of the file, so a
// pass starting mid-file still sees the BOM (if any). Decoding is lossy.
// A missing file is not an error: the pass is empty and the checkpoint is
// handed back unchanged. Anything else the OS refuses surfaces as ReadError.

use crate::core::composite::CompositeParser;
use crate::core::encoding;
use crate::core::model::{FileCheckpoint, FormatDefinition, LogRecord};
use crate::core::parser::{self, ParseConfig};
use crate::util::constants;
use crate::util::error::{FormatError, ReadError};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Tunables for a reader. Validated values come from `platform::config`.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Maximum bytes kept per record message / raw text.
    pub max_entry_size: usize,
    /// Bytes from the start of the file fed to the charset detector.
    pub detection_sample_bytes: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_entry_size: constants::DEFAULT_MAX_ENTRY_SIZE,
            detection_sample_bytes: constants::DEFAULT_DETECTION_SAMPLE_BYTES,
        }
    }
}

/// Which branch of the pass state machine was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The file does not exist (yet, or any more).
    Missing,
    /// Size equals the checkpoint offset.
    Unchanged,
    /// New bytes were read from the checkpoint offset.
    Appended,
    /// The file shrank and was re-read from the start.
    Rotated,
}

/// Everything one read pass produced.
#[derive(Debug)]
pub struct ReadPass {
    /// Completed records in line order. `sequence` is left at 0.
    pub records: Vec<LogRecord>,
    /// Checkpoint to hand back on the next pass.
    pub checkpoint: FileCheckpoint,
    pub outcome: PassOutcome,
    /// Name of the encoding used to decode, when anything was read.
    pub encoding: Option<&'static str>,
    /// Lines that neither started nor continued a record.
    pub dropped_lines: u64,
}

impl ReadPass {
    fn empty(checkpoint: FileCheckpoint, outcome: PassOutcome) -> Self {
        Self {
            records: Vec::new(),
            checkpoint,
            outcome,
            encoding: None,
            dropped_lines: 0,
        }
    }
}

/// Reads files incrementally through a composite of format parsers.
///
/// Immutable once built, so a single reader can serve many files from
/// several threads at once. Each checkpoint must only ever be advanced by
/// one pass at a time.
pub struct IncrementalReader {
    parser: CompositeParser,
    multiline: bool,
    config: ReaderConfig,
    parse_config: ParseConfig,
}

impl IncrementalReader {
    /// Compile `formats` (in priority order) into a reader.
    ///
    /// Continuation stitching is on when any definition in the set asks
    /// for it.
    pub fn new(formats: &[FormatDefinition], config: ReaderConfig) -> Result<Self, FormatError> {
        let parser = CompositeParser::from_definitions(formats)?;
        let multiline = formats.iter().any(|f| f.is_multiline);

        tracing::debug!(
            formats = parser.len(),
            multiline,
            max_entry_size = config.max_entry_size,
            "Incremental reader ready"
        );

        Ok(Self {
            parser,
            multiline,
            parse_config: ParseConfig {
                max_entry_size: config.max_entry_size,
            },
            config,
        })
    }

    pub fn is_multiline(&self) -> bool {
        self.multiline
    }

    /// Read the whole file from offset 0.
    pub fn read_all(&self, path: &Path) -> Result<ReadPass, ReadError> {
        self.read_incremental(&FileCheckpoint::start(path))
    }

    /// Run one pass from `checkpoint` and return the new records together
    /// with the advanced checkpoint.
    pub fn read_incremental(&self, checkpoint: &FileCheckpoint) -> Result<ReadPass, ReadError> {
        let path = checkpoint.path();

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(file = %path.display(), "File missing; checkpoint unchanged");
                return Ok(ReadPass::empty(checkpoint.clone(), PassOutcome::Missing));
            }
            Err(e) => return Err(io_error(path, "open", e)),
        };

        let size = file
            .metadata()
            .map_err(|e| io_error(path, "metadata", e))?
            .len();

        if size == checkpoint.offset {
            tracing::trace!(file = %path.display(), size, "No new content");
            return Ok(ReadPass::empty(checkpoint.clone(), PassOutcome::Unchanged));
        }

        let (mut start, mut start_line, mut outcome) = if size < checkpoint.offset {
            tracing::info!(
                file = %path.display(),
                old_offset = checkpoint.offset,
                new_size = size,
                "File truncated or rotated; re-reading from start"
            );
            (0, 0, PassOutcome::Rotated)
        } else {
            (checkpoint.offset, checkpoint.line_number, PassOutcome::Appended)
        };

        let mut bytes = read_from(&mut file, start).map_err(|e| io_error(path, "read", e))?;

        // Shrunk between the size check and the read.
        if bytes.is_empty() && start > 0 {
            let now = file
                .metadata()
                .map_err(|e| io_error(path, "metadata", e))?
                .len();
            if now < start {
                tracing::info!(
                    file = %path.display(),
                    offset = start,
                    new_size = now,
                    "File shrank during read; restarting from offset 0"
                );
                start = 0;
                start_line = 0;
                outcome = PassOutcome::Rotated;
                bytes = read_from(&mut file, 0).map_err(|e| io_error(path, "read", e))?;
            }
        }

        let detected = if start == 0 {
            let sample_len = bytes.len().min(self.config.detection_sample_bytes);
            encoding::detect_encoding(&bytes[..sample_len])
        } else {
            let head = read_head(&mut file, self.config.detection_sample_bytes)
                .map_err(|e| io_error(path, "read", e))?;
            encoding::detect_encoding(&head)
        };

        let text = encoding::decode(&bytes, detected, start == 0);
        let result = parser::parse_content(
            &text,
            path,
            &self.parser,
            self.multiline,
            &self.parse_config,
            start_line,
        );

        let new_checkpoint = FileCheckpoint {
            path: path.to_path_buf(),
            offset: start + bytes.len() as u64,
            line_number: result.last_line_number,
        };

        tracing::debug!(
            file = %path.display(),
            outcome = ?outcome,
            encoding = detected.name(),
            bytes = bytes.len(),
            records = result.records.len(),
            dropped = result.dropped_lines,
            offset = new_checkpoint.offset,
            line = new_checkpoint.line_number,
            "Read pass complete"
        );

        Ok(ReadPass {
            records: result.records,
            checkpoint: new_checkpoint,
            outcome,
            encoding: Some(detected.name()),
            dropped_lines: result.dropped_lines,
        })
    }
}

/// Read everything from `offset` to end-of-file.
fn read_from(file: &mut File, offset: u64) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Read at most `limit` bytes from the start of the file.
fn read_head(file: &mut File, limit: usize) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

fn io_error(path: &Path, operation: &'static str, source: io::Error) -> ReadError {
    ReadError::Io {
        file: path.to_path_buf(),
        operation,
        source,
    }
}

// =============================================================================
// Tests
// =============================================================================
