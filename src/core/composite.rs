// LogTrail - core/composite.rs
//
// Priority-ordered fallback over several line parsers, so that several log
// formats can coexist in one file.

use crate::core::model::{FormatDefinition, LogRecord};
use crate::core::parser::{FormatParser, LineParser};
use crate::util::error::FormatError;

/// Tries each parser in order and returns the first record produced.
///
/// Parsers after the first success are not consulted.
pub struct CompositeParser {
    parsers: Vec<Box<dyn LineParser>>,
}

impl CompositeParser {
    pub fn new(parsers: Vec<Box<dyn LineParser>>) -> Self {
        Self { parsers }
    }

    /// Compile every definition in priority order. Any broken definition
    /// rejects the whole set.
    pub fn from_definitions(defs: &[FormatDefinition]) -> Result<Self, FormatError> {
        let parsers = defs
            .iter()
            .map(|def| FormatParser::new(def).map(|p| Box::new(p) as Box<dyn LineParser>))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(parsers))
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl LineParser for CompositeParser {
    fn parse(&self, line: &str, file_name: &str, line_number: u64) -> Option<LogRecord> {
        self.parsers
            .iter()
            .find_map(|parser| parser.parse(line, file_name, line_number))
    }
}
