//! Replay engine: drives the rules orchestrator over a recorded round feed.

pub mod executor;
pub mod feed;
pub mod replay;
