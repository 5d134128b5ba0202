// LogTrail - app/mod.rs
//
// Application layer: file I/O, incremental reading, tail orchestration and
// format loading.
// Dependencies: core and util layers.

pub mod checkpoint_store;
pub mod files;
pub mod format_mgr;
pub mod reader;
pub mod tail;
