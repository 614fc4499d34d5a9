//! Round feed loading.
//!
//! A feed is a JSON array of rounds as the sensor and prediction layers
//! would have handed them over: the merged prediction, its confidence and
//! the realized crash multiplier.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::types::{validate_multiplier, EngineError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRound {
    pub round_id: String,
    pub predicted_multiplier: f64,
    pub confidence: f64,
    pub final_multiplier: f64,
    /// When absent the replay clock advances by a fixed round interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl FeedRound {
    fn validate(&self) -> Result<(), EngineError> {
        validate_multiplier("final_multiplier", self.final_multiplier)?;
        validate_multiplier("predicted_multiplier", self.predicted_multiplier)?;
        if !self.confidence.is_finite() {
            return Err(EngineError::Feed(format!(
                "round {}: confidence is not finite",
                self.round_id
            )));
        }
        Ok(())
    }
}

/// Parse and validate a feed document.
pub fn parse_feed(json: &str) -> Result<Vec<FeedRound>> {
    let rounds: Vec<FeedRound> =
        serde_json::from_str(json).context("Failed to parse round feed")?;
    for round in &rounds {
        round
            .validate()
            .with_context(|| format!("Invalid round {}", round.round_id))?;
    }
    Ok(rounds)
}

/// Load a feed from a JSON file.
pub fn load_feed(path: impl AsRef<Path>) -> Result<Vec<FeedRound>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read round feed from {}", path.display()))?;
    let rounds = parse_feed(&json)
        .with_context(|| format!("Failed to load round feed from {}", path.display()))?;
    info!(path = %path.display(), rounds = rounds.len(), "Round feed loaded");
    Ok(rounds)
}
