// LogTrail - lib.rs
//
// Library entry point, exposing the extraction engine, the incremental
// reader and the tail session for integration testing and embedding.
//
// The command-line front end lives in `main.rs` and is not part of the
// library surface.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
