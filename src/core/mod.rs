// LogTrail - core/mod.rs
//
// Core extraction logic: record model, transforms, parsers, charset handling
// and format definition validation.
// Dependencies: util layer and pure data crates (regex, chrono, encoding).
// Must NOT depend on: platform, app, or perform any filesystem I/O.

pub mod composite;
pub mod encoding;
pub mod format;
pub mod model;
pub mod parser;
pub mod transform;
