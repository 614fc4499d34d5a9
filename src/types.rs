//! Shared types for the CRASHGATE engine.
//!
//! These types form the data model used across the rules and engine
//! modules. Per-round values (records, decisions) are immutable once
//! built; long-lived state lives with the component that owns it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

/// A completed round as stored in the historical cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_id: String,
    /// Realized crash multiplier.
    pub multiplier: f64,
    pub completed_at: DateTime<Utc>,
    /// Compounding level that was active when the round settled.
    pub compound_level: u32,
}

impl RoundRecord {
    pub fn new(
        round_id: impl Into<String>,
        multiplier: f64,
        completed_at: DateTime<Utc>,
        compound_level: u32,
    ) -> Self {
        Self {
            round_id: round_id.into(),
            multiplier,
            completed_at,
            compound_level,
        }
    }
}

impl fmt::Display for RoundRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "round {} @ {:.2}x (L{}, {})",
            self.round_id,
            self.multiplier,
            self.compound_level,
            self.completed_at.format("%H:%M:%S"),
        )
    }
}

/// How a round settled for the engine's own stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Won,
    Lost,
    /// No bet was placed (or the bet pushed at zero P&L).
    Skipped,
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundOutcome::Won => write!(f, "WON"),
            RoundOutcome::Lost => write!(f, "LOST"),
            RoundOutcome::Skipped => write!(f, "SKIPPED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Regime
// ---------------------------------------------------------------------------

/// Coarse classification of recent game behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Tight,
    Normal,
    Loose,
    Volatile,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Tight => write!(f, "TIGHT"),
            Regime::Normal => write!(f, "NORMAL"),
            Regime::Loose => write!(f, "LOOSE"),
            Regime::Volatile => write!(f, "VOLATILE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cashout
// ---------------------------------------------------------------------------

/// Exit policy tag attached to a cashout decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashoutMode {
    Default,
    Defensive,
    Aggressive,
    RegimeTight,
    RegimeVolatile,
}

impl fmt::Display for CashoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CashoutMode::Default => write!(f, "default"),
            CashoutMode::Defensive => write!(f, "defensive"),
            CashoutMode::Aggressive => write!(f, "aggressive"),
            CashoutMode::RegimeTight => write!(f, "regime_tight"),
            CashoutMode::RegimeVolatile => write!(f, "regime_volatile"),
        }
    }
}

/// Chosen exit multiplier for the upcoming bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashoutDecision {
    pub multiplier: f64,
    pub mode: CashoutMode,
    pub reason: String,
}

impl fmt::Display for CashoutDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x [{}] {}", self.multiplier, self.mode, self.reason)
    }
}

// ---------------------------------------------------------------------------
// Stop conditions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCategory {
    ProfitTarget,
    LossLimit,
    TimeLimit,
    EarlyAbort,
}

impl fmt::Display for StopCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCategory::ProfitTarget => write!(f, "profit_target"),
            StopCategory::LossLimit => write!(f, "loss_limit"),
            StopCategory::TimeLimit => write!(f, "time_limit"),
            StopCategory::EarlyAbort => write!(f, "early_abort"),
        }
    }
}

/// Result of a session stop-condition evaluation. Advisory: the round
/// loop decides whether to actually halt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopDecision {
    pub should_stop: bool,
    pub reason: String,
    pub category: Option<StopCategory>,
}

impl StopDecision {
    pub fn keep_going() -> Self {
        Self {
            should_stop: false,
            reason: String::new(),
            category: None,
        }
    }

    pub fn stop(category: StopCategory, reason: impl Into<String>) -> Self {
        Self {
            should_stop: true,
            reason: reason.into(),
            category: Some(category),
        }
    }
}

impl fmt::Display for StopDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            Some(category) if self.should_stop => write!(f, "STOP [{category}] {}", self.reason),
            _ => write!(f, "continue"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for CRASHGATE.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input ({field}): {message}")]
    InvalidInput { field: &'static str, message: String },

    #[error("Round feed error: {0}")]
    Feed(String),

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
}

/// Reject NaN, infinite and negative multipliers.
pub fn validate_multiplier(field: &'static str, value: f64) -> Result<f64, EngineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidInput {
            field,
            message: format!("expected a finite non-negative multiplier, got {value}"),
        });
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
