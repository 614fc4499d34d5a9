//! Integration tests for the CRASHGATE engine.
//!
//! Each module drives the public API end to end: a full session through
//! the orchestrator, config hot reload from disk, and feed replay.

mod hot_reload;
mod replay;
mod session_scenarios;
