// LogTrail - core/parser.rs
//
// Line-oriented structured extraction driven by format definitions.
// Core layer: works on decoded text only, never touches the filesystem.
//
// A `FormatParser` compiles one definition up front (primary regex plus
// every sub-pattern) and then turns single lines into `LogRecord`s.
// `parse_content` runs any `LineParser` over a block of text and stitches
// continuation lines onto the pending record.

use crate::core::model::{
    FieldTransform, FormatDefinition, LogRecord, MatchPolicy, RegexOption, SubPatternDefinition,
};
use crate::core::transform;
use crate::util::constants;
use crate::util::error::FormatError;
use chrono::format::ParseErrorKind;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use std::path::Path;

// =============================================================================
// LineParser seam
// =============================================================================

/// Anything that can turn one raw line into a record.
///
/// `None` means "this line does not start a record", which is not an error.
pub trait LineParser: Send + Sync {
    fn parse(&self, line: &str, file_name: &str, line_number: u64) -> Option<LogRecord>;
}

// =============================================================================
// Sub-extraction stage
// =============================================================================

/// One compiled link of a format's sub-pattern chain.
#[derive(Debug, Clone)]
pub struct SubExtraction {
    source_field: String,
    regex: Regex,
    group_names: Vec<String>,
    policy: MatchPolicy,
    separator: String,
    transforms: Vec<FieldTransform>,
}

impl SubExtraction {
    /// Compile a sub-pattern definition. `label` names it in error messages.
    pub fn compile(
        format_name: &str,
        label: &str,
        def: &SubPatternDefinition,
    ) -> Result<Self, FormatError> {
        let mut options = Vec::with_capacity(def.options.len());
        for name in &def.options {
            let option =
                RegexOption::from_name(name).ok_or_else(|| FormatError::UnknownRegexOption {
                    format: format_name.to_string(),
                    field: format!("{label}.options"),
                    option: name.clone(),
                })?;
            options.push(option);
        }

        let regex = compile_regex(format_name, &format!("{label}.pattern"), &def.pattern, &options)?;
        let group_names = regex.capture_names().flatten().map(String::from).collect();

        Ok(Self {
            source_field: def.source_field.clone(),
            regex,
            group_names,
            policy: def.match_type,
            separator: def.separator.clone(),
            transforms: def.field_transforms.clone(),
        })
    }

    /// Run this stage against the record's current state.
    ///
    /// Skipped silently when the source field is absent or empty.
    pub fn apply(&self, record: &mut LogRecord) {
        let updates = {
            let Some(source) = self.resolve_source(record) else {
                tracing::trace!(
                    source_field = %self.source_field,
                    line = record.line_number,
                    "Sub-pattern source missing; stage skipped"
                );
                return;
            };
            if source.is_empty() {
                return;
            }
            match self.policy {
                MatchPolicy::First => self.first_match(source),
                MatchPolicy::All => self.all_matches(source),
            }
        };

        for (name, value) in updates {
            record.fields.insert(name, value);
        }
    }

    /// "message" (any casing) reads the record message; anything else reads
    /// the field map, exact name first and case-insensitively as a fallback.
    fn resolve_source<'r>(&self, record: &'r LogRecord) -> Option<&'r str> {
        if self.source_field.eq_ignore_ascii_case(constants::MESSAGE_GROUP) {
            return Some(record.message.as_str());
        }
        record
            .fields
            .get(&self.source_field)
            .or_else(|| {
                record
                    .fields
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&self.source_field))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    fn first_match(&self, source: &str) -> Vec<(String, String)> {
        let Some(caps) = self.regex.captures(source) else {
            return Vec::new();
        };
        self.group_names
            .iter()
            .filter_map(|name| {
                caps.name(name).map(|m| {
                    (
                        name.clone(),
                        transform::apply(m.as_str(), name, &self.transforms),
                    )
                })
            })
            .collect()
    }

    /// Occurrences where a group did not participate are left out of its join.
    fn all_matches(&self, source: &str) -> Vec<(String, String)> {
        let mut collected: IndexMap<&str, Vec<String>> = self
            .group_names
            .iter()
            .map(|name| (name.as_str(), Vec::new()))
            .collect();

        for caps in self.regex.captures_iter(source) {
            for (name, values) in collected.iter_mut() {
                if let Some(m) = caps.name(name) {
                    values.push(transform::apply(m.as_str(), name, &self.transforms));
                }
            }
        }

        collected
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, values)| (name.to_string(), values.join(&self.separator)))
            .collect()
    }
}

// =============================================================================
// Format parser
// =============================================================================

/// Compiled, immutable parser for one format definition.
///
/// Safe to share across threads; regexes are compiled once here.
#[derive(Debug, Clone)]
pub struct FormatParser {
    name: String,
    pattern: Regex,
    timestamp_format: String,
    /// Authored name of the group matching "timestamp" case-insensitively.
    timestamp_group: Option<String>,
    /// Authored name of the group matching "message" case-insensitively.
    message_group: Option<String>,
    /// Every remaining named group, in pattern order.
    field_groups: Vec<String>,
    transforms: Vec<FieldTransform>,
    stages: Vec<SubExtraction>,
    is_multiline: bool,
}

impl FormatParser {
    /// Compile a definition. Fails on any invalid or oversized pattern.
    pub fn new(def: &FormatDefinition) -> Result<Self, FormatError> {
        let pattern = compile_regex(&def.name, "pattern", &def.pattern, &[])?;

        let mut timestamp_group = None;
        let mut message_group = None;
        let mut field_groups = Vec::new();
        // The first group of each reserved name wins; later casings of the
        // same name are ignored rather than becoming fields.
        for name in pattern.capture_names().flatten() {
            if name.eq_ignore_ascii_case(constants::TIMESTAMP_GROUP) {
                timestamp_group.get_or_insert_with(|| name.to_string());
            } else if name.eq_ignore_ascii_case(constants::MESSAGE_GROUP) {
                message_group.get_or_insert_with(|| name.to_string());
            } else {
                field_groups.push(name.to_string());
            }
        }

        if def.sub_patterns.len() > constants::MAX_SUB_PATTERNS {
            return Err(FormatError::TooManySubPatterns {
                format: def.name.clone(),
                count: def.sub_patterns.len(),
                max: constants::MAX_SUB_PATTERNS,
            });
        }

        let stages = def
            .sub_patterns
            .iter()
            .enumerate()
            .map(|(i, sub)| SubExtraction::compile(&def.name, &format!("sub_patterns[{i}]"), sub))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            format = %def.name,
            fields = field_groups.len(),
            stages = stages.len(),
            has_timestamp = timestamp_group.is_some(),
            has_message = message_group.is_some(),
            "Format compiled"
        );

        Ok(Self {
            name: def.name.clone(),
            pattern,
            timestamp_format: def.timestamp_format.clone(),
            timestamp_group,
            message_group,
            field_groups,
            transforms: def.field_transforms.clone(),
            stages,
            is_multiline: def.is_multiline,
        })
    }

    pub fn is_multiline(&self) -> bool {
        self.is_multiline
    }

    /// Whether the primary pattern has a timestamp group (any casing).
    pub fn has_timestamp_group(&self) -> bool {
        self.timestamp_group.is_some()
    }
}

impl LineParser for FormatParser {
    fn parse(&self, line: &str, file_name: &str, line_number: u64) -> Option<LogRecord> {
        let caps = self.pattern.captures(line)?;
        let mut record = LogRecord::new(file_name, line_number);

        if let Some(group) = &self.timestamp_group {
            record.timestamp = caps
                .name(group)
                .map(|m| m.as_str())
                .filter(|raw| !raw.is_empty())
                .and_then(|raw| {
                    let value = transform::apply(raw, constants::TIMESTAMP_GROUP, &self.transforms);
                    let parsed = parse_timestamp(&value, &self.timestamp_format);
                    if parsed.is_none() {
                        tracing::trace!(
                            format = %self.name,
                            value = %value,
                            line = line_number,
                            "Timestamp did not match format"
                        );
                    }
                    parsed
                });
        }

        if let Some(m) = self.message_group.as_ref().and_then(|g| caps.name(g)) {
            record.message = transform::apply(m.as_str(), constants::MESSAGE_GROUP, &self.transforms);
        }

        for name in &self.field_groups {
            if let Some(m) = caps.name(name) {
                record
                    .fields
                    .insert(name.clone(), transform::apply(m.as_str(), name, &self.transforms));
            }
        }

        for stage in &self.stages {
            stage.apply(&mut record);
        }

        Some(record)
    }
}

/// Compile a pattern with the given options and a length guard.
fn compile_regex(
    format_name: &str,
    field: &str,
    pattern: &str,
    options: &[RegexOption],
) -> Result<Regex, FormatError> {
    if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
        return Err(FormatError::RegexTooLong {
            format: format_name.to_string(),
            field: field.to_string(),
            length: pattern.len(),
            max_length: constants::MAX_REGEX_PATTERN_LENGTH,
        });
    }

    let mut builder = RegexBuilder::new(pattern);
    for option in options {
        match option {
            RegexOption::IgnoreCase => builder.case_insensitive(true),
            RegexOption::Multiline => builder.multi_line(true),
            RegexOption::Singleline => builder.dot_matches_new_line(true),
            RegexOption::IgnorePatternWhitespace => builder.ignore_whitespace(true),
        };
    }

    builder.build().map_err(|e| FormatError::InvalidRegex {
        format: format_name.to_string(),
        field: field.to_string(),
        pattern: pattern.to_string(),
        source: e,
    })
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parse `raw` against exactly `format` (chrono strftime syntax).
///
/// Tried as a date-time with offset (normalised to UTC), then a plain
/// date-time, then a date-only format at midnight, then a time-only format
/// on today's local date. Surrounding whitespace is not skipped. `None`
/// otherwise.
///
/// A `Z` suffix stands for `+00:00` when the format ends in a numeric
/// offset (`%z` or `%:z`).
pub fn parse_timestamp(raw: &str, format: &str) -> Option<NaiveDateTime> {
    if format.is_empty() {
        return None;
    }

    parse_exact(raw, format).or_else(|| {
        let utc = if format.ends_with("%:z") {
            "+00:00"
        } else if format.ends_with("%z") {
            "+0000"
        } else {
            return None;
        };
        let bare = raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z'))?;
        parse_exact(&format!("{bare}{utc}"), format)
    })
}

fn parse_exact(raw: &str, format: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_str(raw, format)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, format))
        .ok()
        .or_else(|| match NaiveDate::parse_from_str(raw, format) {
            Ok(date) => date.and_hms_opt(0, 0, 0),
            // No date in the format at all; an impossible date stays unparsed.
            Err(e) if e.kind() == ParseErrorKind::NotEnough => {
                NaiveTime::parse_from_str(raw, format)
                    .ok()
                    .map(|t| Local::now().date_naive().and_time(t))
            }
            Err(_) => None,
        })
}

// =============================================================================
// Multi-line stitching over decoded text
// =============================================================================

/// Limits applied while stitching.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    pub max_entry_size: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_entry_size: constants::DEFAULT_MAX_ENTRY_SIZE,
        }
    }
}

/// Result of parsing one block of text.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Completed records in line order.
    pub records: Vec<LogRecord>,
    /// Lines seen in this block.
    pub lines_processed: u64,
    /// Line number of the last line seen (`start_line` when the block is empty).
    pub last_line_number: u64,
    /// Lines that neither started a record nor continued one.
    pub dropped_lines: u64,
}

/// Parse `content` line by line, continuing the line counter from `start_line`.
///
/// A line the parser accepts flushes any pending record and becomes the new
/// pending record. A rejected line is appended to the pending record when
/// `multiline` is set, and dropped otherwise. The pending record is flushed
/// at the end of the block.
pub fn parse_content(
    content: &str,
    file_path: &Path,
    parser: &dyn LineParser,
    multiline: bool,
    config: &ParseConfig,
    start_line: u64,
) -> ParseResult {
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut records = Vec::new();
    let mut pending: Option<LogRecord> = None;
    let mut line_number = start_line;
    let mut dropped_lines = 0u64;

    for line in split_lines(content) {
        line_number += 1;

        match parser.parse(line, &file_name, line_number) {
            Some(mut record) => {
                if let Some(done) = pending.take() {
                    records.push(done);
                }
                record.raw_line = line.to_string();
                record.file_path = file_path.to_path_buf();
                record.enforce_max_size(config.max_entry_size);
                pending = Some(record);
            }
            None => match pending.as_mut() {
                Some(current) if multiline => {
                    current.append_continuation(line, config.max_entry_size);
                    current.enforce_max_size(config.max_entry_size);
                }
                _ => dropped_lines += 1,
            },
        }
    }

    if let Some(done) = pending.take() {
        records.push(done);
    }

    tracing::debug!(
        file = %file_path.display(),
        records = records.len(),
        lines = line_number - start_line,
        dropped = dropped_lines,
        "Parsing complete"
    );

    ParseResult {
        records,
        lines_processed: line_number - start_line,
        last_line_number: line_number,
        dropped_lines,
    }
}

/// Split on `\r\n`, `\n` or a bare `\r`. A final terminator does not
/// start an extra empty line.
fn split_lines(content: &str) -> impl Iterator<Item = &str> {
    let mut rest = content;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let line = match rest.find(['\r', '\n']) {
            Some(end) => {
                let width = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
                let line = &rest[..end];
                rest = &rest[end + width..];
                line
            }
            None => std::mem::take(&mut rest),
        };
        Some(line)
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    const APP_PATTERN: &str =
        r"^(?<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[(?<level>\w+)\] (?<message>.*)$";

    fn app_format() -> FormatDefinition {
        FormatDefinition {
            name: "ApplicationLog".to_string(),
            pattern: APP_PATTERN.to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            ..FormatDefinition::default()
        }
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn template(field: &str, format: &str) -> FieldTransform {
        FieldTransform {
            field: field.to_string(),
            map: None,
            format: Some(format.to_string()),
        }
    }

    #[test]
    fn test_parse_basic_line() {
        let parser = FormatParser::new(&app_format()).unwrap();
        let record = parser
            .parse("2023-10-26 10:30:45 [INFO] User logged in successfully.", "test.log", 123)
            .unwrap();

        assert_eq!(record.timestamp, Some(ts("2023-10-26 10:30:45")));
        assert_eq!(record.message, "User logged in successfully.");
        assert_eq!(record.field("level"), "INFO");
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.file_name, "test.log");
        assert_eq!(record.line_number, 123);
        assert_eq!(record.sequence, 0);
    }

    #[test]
    fn test_additional_groups_in_pattern_order() {
        let def = FormatDefinition {
            pattern: r"^(?<timestamp>\S+ \S+) \[(?<level>\w+)\] (?<message>.*) \(User:(?<user>\w+), Session:(?<session>\d+)\)$".to_string(),
            ..app_format()
        };
        let parser = FormatParser::new(&def).unwrap();
        let record = parser
            .parse("2023-10-26 11:00:00 [DEBUG] Data processed. (User:alice, Session:12345)", "t.log", 1)
            .unwrap();

        assert_eq!(record.message, "Data processed.");
        let keys: Vec<_> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, ["level", "user", "session"]);
        assert_eq!(record.field("session"), "12345");
    }

    #[test]
    fn test_mismatch_returns_none() {
        let parser = FormatParser::new(&app_format()).unwrap();
        assert!(parser
            .parse("This log line does not match the pattern.", "t.log", 1)
            .is_none());
    }

    #[test]
    fn test_special_groups_are_case_insensitive() {
        let def = FormatDefinition {
            pattern: r"^(?<Timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[(?<Level>\w+)\] (?<Message>.*)$".to_string(),
            ..app_format()
        };
        let parser = FormatParser::new(&def).unwrap();
        let record = parser
            .parse("2023-10-26 10:30:45 [INFO] Important message content.", "t.log", 1)
            .unwrap();

        assert_eq!(record.message, "Important message content.");
        assert_eq!(record.timestamp, Some(ts("2023-10-26 10:30:45")));
        assert!(!record.fields.contains_key("Message"));
        assert!(!record.fields.contains_key("Timestamp"));
        // Ordinary groups keep their authored casing.
        assert_eq!(record.field("Level"), "INFO");
    }

    #[test]
    fn test_repeated_special_group_casings_never_become_fields() {
        let def = FormatDefinition {
            pattern: r"^(?<timestamp>\S+) (?<Timestamp>\S+) (?<message>\S+) (?<Message>.*)$"
                .to_string(),
            timestamp_format: "%Y-%m-%d".to_string(),
            ..app_format()
        };
        let parser = FormatParser::new(&def).unwrap();
        let record = parser
            .parse("2024-01-15 2024-02-20 first second", "t.log", 1)
            .unwrap();

        assert!(record.fields.is_empty(), "fields: {:?}", record.fields);
        assert_eq!(record.message, "first");
        assert_eq!(record.timestamp, Some(ts("2024-01-15 00:00:00")));
    }

    #[test]
    fn test_invalid_timestamp_is_unparsed_not_failure() {
        let def = FormatDefinition {
            pattern: r"^(?<timestamp>.*?) (?<message>.*)$".to_string(),
            timestamp_format: "%Y-%m-%d".to_string(),
            ..FormatDefinition::default()
        };
        let parser = FormatParser::new(&def).unwrap();
        let record = parser.parse("invalid-date Hello", "t.log", 1).unwrap();
        assert_eq!(record.timestamp, None);
        assert_eq!(record.message, "Hello");
    }

    #[test]
    fn test_missing_timestamp_group() {
        let def = FormatDefinition {
            pattern: r"^\[(?<level>\w+)\] (?<message>.*)$".to_string(),
            ..FormatDefinition::default()
        };
        let parser = FormatParser::new(&def).unwrap();
        assert!(!parser.has_timestamp_group());
        let record = parser.parse("[INFO] Simple message", "t.log", 1).unwrap();
        assert_eq!(record.timestamp, None);
        assert_eq!(record.field("level"), "INFO");
        assert_eq!(record.message, "Simple message");
    }

    #[test]
    fn test_missing_message_group_leaves_message_empty() {
        let def = FormatDefinition {
            pattern: r"^(?<code>\d+)$".to_string(),
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def).unwrap().parse("404", "t.log", 1).unwrap();
        assert_eq!(record.message, "");
        assert_eq!(record.field("code"), "404");
    }

    #[test]
    fn test_empty_capture_is_stored() {
        let def = FormatDefinition {
            pattern: r"^\[(?<level>.*?)\] (?<message>.*)$".to_string(),
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("[] Empty level", "t.log", 1)
            .unwrap();
        assert_eq!(record.fields.get("level").map(String::as_str), Some(""));
        assert_eq!(record.message, "Empty level");
    }

    #[test]
    fn test_non_participating_group_is_not_stored() {
        let def = FormatDefinition {
            pattern: r"^(?<message>\w+)(?: user=(?<user>\w+))?$".to_string(),
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def).unwrap().parse("hello", "t.log", 1).unwrap();
        assert!(!record.fields.contains_key("user"));
    }

    #[test]
    fn test_timestamp_transform_runs_before_parse() {
        let def = FormatDefinition {
            pattern: r"^(?<timestamp>\S+) (?<message>.*)$".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            field_transforms: vec![template("timestamp", "2024-01-15 {value}")],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("14:30:22 started", "t.log", 1)
            .unwrap();
        assert_eq!(record.timestamp, Some(ts("2024-01-15 14:30:22")));
    }

    #[test]
    fn test_sub_pattern_extracts_from_message() {
        let def = FormatDefinition {
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: r"user=(?<user>\w+), duration=(?<duration>\d+), status=(?<status_code>\d+)"
                    .to_string(),
                ..SubPatternDefinition::default()
            }],
            ..app_format()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse(
                "2023-10-27 12:00:00 [INFO] Request processed: user=admin, duration=123, status=200",
                "t.log",
                1,
            )
            .unwrap();

        assert_eq!(record.message, "Request processed: user=admin, duration=123, status=200");
        assert_eq!(record.fields.len(), 4);
        assert_eq!(record.field("user"), "admin");
        assert_eq!(record.field("duration"), "123");
        assert_eq!(record.field("status_code"), "200");
    }

    #[test]
    fn test_transforms_on_primary_and_sub_pattern() {
        let def = FormatDefinition {
            name: "TransformLog".to_string(),
            pattern: r"^(?<level>[IWE]) (?<message>.*)$".to_string(),
            field_transforms: vec![
                FieldTransform {
                    field: "level".to_string(),
                    map: Some(HashMap::from([
                        ("I".to_string(), "INFO".to_string()),
                        ("E".to_string(), "ERROR".to_string()),
                    ])),
                    format: None,
                },
                template("message", "Content: {value}"),
            ],
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: r"ID:(?<id>\d+)".to_string(),
                field_transforms: vec![template("id", "UID_{value}")],
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("E Failed to login ID:123", "t.log", 1)
            .unwrap();

        assert_eq!(record.field("level"), "ERROR");
        assert_eq!(record.message, "Content: Failed to login ID:123");
        assert_eq!(record.field("id"), "UID_123");
    }

    #[test]
    fn test_sub_pattern_missing_source_is_skipped() {
        let def = FormatDefinition {
            pattern: r"^(?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "non_existent".to_string(),
                pattern: r"(?<data>.*)".to_string(),
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def).unwrap().parse("Hello world", "t.log", 1).unwrap();
        assert!(!record.fields.contains_key("data"));
    }

    #[test]
    fn test_sub_pattern_empty_source_is_skipped() {
        let def = FormatDefinition {
            pattern: r"^\[(?<tag>\w*)\] (?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "tag".to_string(),
                pattern: r"(?<inner>.*)".to_string(),
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def).unwrap().parse("[] text", "t.log", 1).unwrap();
        assert!(!record.fields.contains_key("inner"));
    }

    #[test]
    fn test_all_matches_joined_with_separator() {
        let def = FormatDefinition {
            pattern: r"(?s)^(?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: r"Item:(?<item>\w+)".to_string(),
                match_type: MatchPolicy::All,
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("Processing list: Item:Apple, Item:Banana, Item:Cherry", "t.log", 1)
            .unwrap();
        assert_eq!(record.field("item"), "Apple, Banana, Cherry");
    }

    #[test]
    fn test_all_matches_transform_each_group_before_join() {
        let def = FormatDefinition {
            pattern: r"^(?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: r"Item:(?<name>\w+)\((?<price>\d+)\)".to_string(),
                match_type: MatchPolicy::All,
                separator: "|".to_string(),
                field_transforms: vec![template("name", "[{value}]"), template("price", "${value}")],
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("Orders: Item:Apple(100), Item:Banana(200), Item:Cherry(300)", "t.log", 1)
            .unwrap();

        assert_eq!(record.field("name"), "[Apple]|[Banana]|[Cherry]");
        assert_eq!(record.field("price"), "$100|$200|$300");
    }

    #[test]
    fn test_all_matches_skip_missing_occurrences() {
        let def = FormatDefinition {
            pattern: r"^(?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: r"Item:(?<name>\w+)(?:\((?<price>\d+)\))?".to_string(),
                match_type: MatchPolicy::All,
                separator: "|".to_string(),
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("Item:Apple(100) Item:Banana Item:Cherry(300)", "t.log", 1)
            .unwrap();

        assert_eq!(record.field("name"), "Apple|Banana|Cherry");
        assert_eq!(record.field("price"), "100|300");
    }

    #[test]
    fn test_all_matches_with_no_occurrence_writes_nothing() {
        let def = FormatDefinition {
            pattern: r"^(?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: r"Item:(?<item>\w+)".to_string(),
                match_type: MatchPolicy::All,
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def).unwrap().parse("nothing here", "t.log", 1).unwrap();
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_singleline_option_lets_dot_cross_newlines() {
        let def = FormatDefinition {
            pattern: r"(?s)^(?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: r"Start(?<content>.*)End".to_string(),
                options: vec!["Singleline".to_string()],
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("Start\nMulti\nLine\nEnd", "t.log", 1)
            .unwrap();
        assert_eq!(record.field("content"), "\nMulti\nLine\n");
    }

    #[test]
    fn test_ignore_case_option() {
        let def = FormatDefinition {
            pattern: r"^(?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "MESSAGE".to_string(),
                pattern: r"error code (?<code>\d+)".to_string(),
                options: vec!["IgnoreCase".to_string()],
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("ERROR CODE 17 raised", "t.log", 1)
            .unwrap();
        assert_eq!(record.field("code"), "17");
    }

    #[test]
    fn test_chained_sub_patterns() {
        let def = FormatDefinition {
            pattern: r"^(?<message>.*)$".to_string(),
            sub_patterns: vec![
                SubPatternDefinition {
                    source_field: "message".to_string(),
                    pattern: r"Data:\{(?<json_data>.*)\}".to_string(),
                    ..SubPatternDefinition::default()
                },
                SubPatternDefinition {
                    source_field: "json_data".to_string(),
                    pattern: r"target:(?<target_value>\w+)".to_string(),
                    ..SubPatternDefinition::default()
                },
            ],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("Info Data:{id:1, target:Success, time:123}", "t.log", 1)
            .unwrap();

        assert_eq!(record.field("json_data"), "id:1, target:Success, time:123");
        assert_eq!(record.field("target_value"), "Success");
    }

    #[test]
    fn test_chain_over_process_info() {
        let def = FormatDefinition {
            pattern: r"^\[(?<proc_info>[^\]]*)\] (?<message>.*)$".to_string(),
            sub_patterns: vec![
                SubPatternDefinition {
                    source_field: "proc_info".to_string(),
                    pattern: r"^(?<process_name>[\w.]+):\d+$".to_string(),
                    ..SubPatternDefinition::default()
                },
                SubPatternDefinition {
                    source_field: "process_name".to_string(),
                    pattern: r"^(?<app_name>\w+)\.exe$".to_string(),
                    field_transforms: vec![template("app_name", "app:{value}")],
                    ..SubPatternDefinition::default()
                },
            ],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("[worker.exe:4120] job finished", "t.log", 1)
            .unwrap();

        assert_eq!(record.field("process_name"), "worker.exe");
        assert_eq!(record.field("app_name"), "app:worker");
    }

    #[test]
    fn test_stage_naming_later_output_is_skipped() {
        // Declared order is evaluation order: no dependency resolution.
        let def = FormatDefinition {
            pattern: r"^(?<message>.*)$".to_string(),
            sub_patterns: vec![
                SubPatternDefinition {
                    source_field: "inner".to_string(),
                    pattern: r"(?<deep>\d+)".to_string(),
                    ..SubPatternDefinition::default()
                },
                SubPatternDefinition {
                    source_field: "message".to_string(),
                    pattern: r"<(?<inner>[^>]+)>".to_string(),
                    ..SubPatternDefinition::default()
                },
            ],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def).unwrap().parse("x <a1> y", "t.log", 1).unwrap();
        assert_eq!(record.field("inner"), "a1");
        assert!(!record.fields.contains_key("deep"));
    }

    #[test]
    fn test_later_stage_overwrites_same_field() {
        let def = FormatDefinition {
            pattern: r"^(?<level>\w+) (?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: r"level=(?<level>\w+)".to_string(),
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        let record = FormatParser::new(&def)
            .unwrap()
            .parse("INFO escalated level=WARN", "t.log", 1)
            .unwrap();
        assert_eq!(record.field("level"), "WARN");
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn test_invalid_primary_regex_fails_construction() {
        let def = FormatDefinition {
            name: "broken".to_string(),
            pattern: "(?<message>[unclosed".to_string(),
            ..FormatDefinition::default()
        };
        match FormatParser::new(&def) {
            Err(FormatError::InvalidRegex { format, field, .. }) => {
                assert_eq!(format, "broken");
                assert_eq!(field, "pattern");
            }
            other => panic!("Expected InvalidRegex, got: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_sub_pattern_fails_construction() {
        let def = FormatDefinition {
            name: "broken-sub".to_string(),
            pattern: r"^(?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: "(?<x>".to_string(),
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        match FormatParser::new(&def) {
            Err(FormatError::InvalidRegex { field, .. }) => {
                assert_eq!(field, "sub_patterns[0].pattern")
            }
            other => panic!("Expected InvalidRegex, got: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_option_fails_construction() {
        let def = FormatDefinition {
            pattern: r"^(?<message>.*)$".to_string(),
            sub_patterns: vec![SubPatternDefinition {
                source_field: "message".to_string(),
                pattern: r"(?<x>\d)".to_string(),
                options: vec!["RightToLeft".to_string()],
                ..SubPatternDefinition::default()
            }],
            ..FormatDefinition::default()
        };
        assert!(matches!(
            FormatParser::new(&def),
            Err(FormatError::UnknownRegexOption { .. })
        ));
    }

    #[test]
    fn test_regex_too_long() {
        let def = FormatDefinition {
            pattern: "a".repeat(constants::MAX_REGEX_PATTERN_LENGTH + 1),
            ..FormatDefinition::default()
        };
        assert!(matches!(
            FormatParser::new(&def),
            Err(FormatError::RegexTooLong { .. })
        ));
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(
            parse_timestamp("2024-01-15 14:30:22", "%Y-%m-%d %H:%M:%S"),
            Some(ts("2024-01-15 14:30:22"))
        );
        assert_eq!(
            parse_timestamp("2024-01-15", "%Y-%m-%d"),
            Some(ts("2024-01-15 00:00:00"))
        );
        assert_eq!(
            parse_timestamp("2024-01-15 14:30:22 +0200", "%Y-%m-%d %H:%M:%S %z"),
            Some(ts("2024-01-15 12:30:22"))
        );
        assert_eq!(
            parse_timestamp("2024-01-15 14:30:22.250", "%Y-%m-%d %H:%M:%S%.f")
                .map(|t| t.and_utc().timestamp_subsec_millis()),
            Some(250)
        );
        // Exact: no separator inference.
        assert_eq!(parse_timestamp("2024/01/15 14:30:22", "%Y-%m-%d %H:%M:%S"), None);
        assert_eq!(parse_timestamp("2024-01-15 14:30:22", ""), None);
    }

    #[test]
    fn test_parse_timestamp_time_only_uses_today() {
        let parsed = parse_timestamp("10:00:05", "%H:%M:%S").unwrap();
        assert_eq!(parsed.time(), NaiveTime::from_hms_opt(10, 0, 5).unwrap());

        let today = Local::now().date_naive();
        assert!(parsed.date() == today || parsed.date() == today.pred_opt().unwrap());

        // A full date-time with an impossible date is not rescued as time-only.
        assert_eq!(parse_timestamp("2024-02-30 10:00:05", "%Y-%m-%d %H:%M:%S"), None);
    }

    #[test]
    fn test_time_only_format_through_parser() {
        let def = FormatDefinition {
            pattern: r"^(?<timestamp>\d{2}:\d{2}:\d{2}) (?<message>.*)$".to_string(),
            timestamp_format: "%H:%M:%S".to_string(),
            ..app_format()
        };
        let parser = FormatParser::new(&def).unwrap();
        let record = parser.parse("10:00:05 hi", "t.log", 1).unwrap();

        assert_eq!(
            record.timestamp.map(|t| t.time()),
            NaiveTime::from_hms_opt(10, 0, 5)
        );
        assert_eq!(record.message, "hi");
    }

    #[test]
    fn test_parse_timestamp_zulu_suffix() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_milli_opt(14, 30, 22, 3);
        assert_eq!(
            parse_timestamp("2024-01-15T14:30:22.003Z", "%Y-%m-%dT%H:%M:%S%.f%:z"),
            expected
        );
        assert_eq!(
            parse_timestamp("2024-01-15T14:30:22.003Z", "%Y-%m-%dT%H:%M:%S%.f%z"),
            expected
        );
        // Only an offset-terminated format accepts the suffix.
        assert_eq!(
            parse_timestamp("2024-01-15T14:30:22Z", "%Y-%m-%dT%H:%M:%S"),
            None
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_surrounding_whitespace() {
        assert_eq!(parse_timestamp(" 2024-01-15 10:00:00 ", "%Y-%m-%d %H:%M:%S"), None);
        assert_eq!(parse_timestamp("2024-01-15 10:00:00\t", "%Y-%m-%d %H:%M:%S"), None);
    }

    // -------------------------------------------------------------------------
    // parse_content
    // -------------------------------------------------------------------------

    fn stitch(content: &str, multiline: bool) -> ParseResult {
        let parser = FormatParser::new(&app_format()).unwrap();
        parse_content(
            content,
            &PathBuf::from("/logs/app.log"),
            &parser,
            multiline,
            &ParseConfig::default(),
            0,
        )
    }

    #[test]
    fn test_content_multiline_continuation() {
        let content = "2024-01-15 14:30:22 [ERROR] Connection failed\n\
                       at com.example.Client.connect(Client.java:42)\n\
                       at com.example.Main.run(Main.java:10)\n\
                       2024-01-15 14:30:23 [INFO] Retry succeeded\n";
        let result = stitch(content, true);

        assert_eq!(result.records.len(), 2);
        assert_eq!(
            result.records[0].message,
            "Connection failed\nat com.example.Client.connect(Client.java:42)\nat com.example.Main.run(Main.java:10)"
        );
        assert!(result.records[0].raw_line.starts_with("2024-01-15 14:30:22 [ERROR]"));
        assert!(result.records[0].raw_line.ends_with("(Main.java:10)"));
        assert_eq!(result.records[1].line_number, 4);
        assert_eq!(result.records[0].file_path, PathBuf::from("/logs/app.log"));
        assert_eq!(result.records[0].file_name, "app.log");
        assert_eq!(result.lines_processed, 4);
        assert_eq!(result.dropped_lines, 0);
    }

    #[test]
    fn test_content_without_multiline_drops_lines() {
        let content = "2024-01-15 14:30:22 [ERROR] Connection failed\n\
                       at com.example.Client.connect(Client.java:42)\n";
        let result = stitch(content, false);

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].message, "Connection failed");
        assert_eq!(result.dropped_lines, 1);
        assert_eq!(result.last_line_number, 2);
    }

    #[test]
    fn test_content_leading_unmatched_lines_are_dropped() {
        let content = "garbage\n2024-01-15 14:30:22 [INFO] ok\n";
        let result = stitch(content, true);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].line_number, 2);
        assert_eq!(result.dropped_lines, 1);
    }

    #[test]
    fn test_content_crlf_and_start_line() {
        let parser = FormatParser::new(&app_format()).unwrap();
        let result = parse_content(
            "2024-01-15 14:30:22 [INFO] a\r\n2024-01-15 14:30:23 [INFO] b\r\n",
            &PathBuf::from("app.log"),
            &parser,
            false,
            &ParseConfig::default(),
            10,
        );
        assert_eq!(result.records[0].message, "a");
        assert_eq!(result.records[0].line_number, 11);
        assert_eq!(result.records[1].line_number, 12);
        assert_eq!(result.last_line_number, 12);
    }

    #[test]
    fn test_content_bare_carriage_return_ends_a_line() {
        let content = "2024-01-15 14:30:22 [INFO] a\r\
                       2024-01-15 14:30:23 [INFO] b\r\n\
                       2024-01-15 14:30:24 [INFO] c\n";
        let result = stitch(content, false);

        let messages: Vec<_> = result.records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["a", "b", "c"]);
        assert_eq!(result.records[2].line_number, 3);
        assert_eq!(result.lines_processed, 3);
        assert_eq!(result.dropped_lines, 0);
    }

    #[test]
    fn test_split_lines_terminators() {
        let lines: Vec<_> = split_lines("a\r\rb\n\nc\r\n").collect();
        assert_eq!(lines, ["a", "", "b", "", "c"]);
        assert_eq!(split_lines("tail").collect::<Vec<_>>(), ["tail"]);
        assert_eq!(split_lines("").count(), 0);
    }

    #[test]
    fn test_content_empty() {
        let result = stitch("", true);
        assert!(result.records.is_empty());
        assert_eq!(result.lines_processed, 0);
        assert_eq!(result.last_line_number, 0);
    }

    #[test]
    fn test_content_entry_truncation() {
        let parser = FormatParser::new(&app_format()).unwrap();
        let mut content = String::from("2024-01-15 14:30:22 [ERROR] start\n");
        for _ in 0..100 {
            content.push_str("continuation line with some padding text\n");
        }
        let config = ParseConfig { max_entry_size: 1024 };
        let result = parse_content(&content, &PathBuf::from("a.log"), &parser, true, &config, 0);

        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert!(record.message.ends_with(constants::TRUNCATION_MARKER));
        assert!(record.message.len() <= 1024 + constants::TRUNCATION_MARKER.len());
        assert!(record.raw_line.len() <= 1024 + constants::TRUNCATION_MARKER.len());
    }
}
