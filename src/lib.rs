//! CRASHGATE: rules orchestration engine for round-based crash games
//!
//! Library crate exposing all modules for use by integration tests
//! and the replay binary.

pub mod clock;
pub mod config;
pub mod types;
pub mod rules;
pub mod engine;
