//! Entry filter.
//!
//! Stateless veto evaluator run once per round. Every condition is checked
//! (no short-circuit) so a denial carries the complete list of reasons.
//! A bet is permitted only when no condition fires.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use super::history::HistoricalCache;
use crate::config::{CapitalConfig, EntryFiltersConfig};
use crate::types::Regime;

/// Window used by the recent-spike veto.
const RECENT_WINDOW: usize = 3;

/// A veto condition that fired, with the values that tripped it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum EntryCondition {
    PrevMultTooHigh { multiplier: f64, threshold: f64 },
    RecentSpike { multiplier: f64, threshold: f64 },
    CompoundLevelAtMax { level: u32, max: u32 },
    CooldownActive { rounds_remaining: u32 },
    VolatileRegime,
    PrevMultOutOfBand { multiplier: f64, min: f64, max: f64 },
    LowConfidence { confidence: f64, min: f64 },
    LowPrediction { predicted: f64, min: f64 },
    BalanceBelowMinimum { balance: Decimal, minimum: Decimal },
}

impl EntryCondition {
    pub fn name(&self) -> &'static str {
        match self {
            EntryCondition::PrevMultTooHigh { .. } => "prev_mult_too_high",
            EntryCondition::RecentSpike { .. } => "recent_spike",
            EntryCondition::CompoundLevelAtMax { .. } => "compound_level_at_max",
            EntryCondition::CooldownActive { .. } => "cooldown_active",
            EntryCondition::VolatileRegime => "volatile_regime",
            EntryCondition::PrevMultOutOfBand { .. } => "prev_mult_out_of_band",
            EntryCondition::LowConfidence { .. } => "low_confidence",
            EntryCondition::LowPrediction { .. } => "low_prediction",
            EntryCondition::BalanceBelowMinimum { .. } => "balance_below_minimum",
        }
    }
}

impl fmt::Display for EntryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryCondition::PrevMultTooHigh { multiplier, threshold } => {
                write!(f, "previous round {multiplier:.2}x >= {threshold:.2}x")
            }
            EntryCondition::RecentSpike { multiplier, threshold } => {
                write!(f, "recent round {multiplier:.2}x >= {threshold:.2}x")
            }
            EntryCondition::CompoundLevelAtMax { level, max } => {
                write!(f, "compound level {level} >= {max}")
            }
            EntryCondition::CooldownActive { rounds_remaining } => {
                write!(f, "cooldown active ({rounds_remaining} rounds left)")
            }
            EntryCondition::VolatileRegime => write!(f, "regime VOLATILE"),
            EntryCondition::PrevMultOutOfBand { multiplier, min, max } => {
                write!(f, "previous round {multiplier:.2}x outside [{min:.2}, {max:.2}]")
            }
            EntryCondition::LowConfidence { confidence, min } => {
                write!(f, "confidence {confidence:.2} < {min:.2}")
            }
            EntryCondition::LowPrediction { predicted, min } => {
                write!(f, "predicted {predicted:.2}x < {min:.2}x")
            }
            EntryCondition::BalanceBelowMinimum { balance, minimum } => {
                write!(f, "balance {balance:.2} < minimum {minimum:.2}")
            }
        }
    }
}

/// Inputs for one entry evaluation.
#[derive(Debug, Clone)]
pub struct EntryContext<'a> {
    pub history: &'a HistoricalCache,
    pub regime: Regime,
    pub compound_level: u32,
    /// Rounds left on an active cooldown (0 = none).
    pub cooldown_remaining: u32,
    pub predicted_multiplier: f64,
    pub confidence: f64,
    pub balance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDecision {
    pub permit: bool,
    pub failed: Vec<EntryCondition>,
    pub regime: Regime,
    /// Overrides the condition summary (engine disabled, evaluation error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EntryDecision {
    /// Permit without evaluating any filter.
    pub fn bypassed(regime: Regime, note: impl Into<String>) -> Self {
        Self {
            permit: true,
            failed: Vec::new(),
            regime,
            note: Some(note.into()),
        }
    }

    /// Deny without a specific filter firing.
    pub fn denied(regime: Regime, note: impl Into<String>) -> Self {
        Self {
            permit: false,
            failed: Vec::new(),
            regime,
            note: Some(note.into()),
        }
    }

    /// One line summarising the outcome.
    pub fn reason(&self) -> String {
        if let Some(note) = &self.note {
            return note.clone();
        }
        if self.failed.is_empty() {
            return "all entry filters passed".to_string();
        }
        self.failed
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn failed_names(&self) -> Vec<&'static str> {
        self.failed.iter().map(EntryCondition::name).collect()
    }
}

pub struct EntryFilter;

impl EntryFilter {
    /// Evaluate every veto and collect the ones that fire.
    pub fn evaluate(
        ctx: &EntryContext<'_>,
        filters: &EntryFiltersConfig,
        capital: &CapitalConfig,
    ) -> EntryDecision {
        let deny = &filters.do_not_bet_if;
        let only = &filters.bet_only_if;
        let mut failed = Vec::new();

        let previous = ctx.history.latest().map(|r| r.multiplier);

        if let Some(prev) = previous {
            if prev >= deny.prev_mult_at_least {
                failed.push(EntryCondition::PrevMultTooHigh {
                    multiplier: prev,
                    threshold: deny.prev_mult_at_least,
                });
            }
        }

        if let Some(spike) = ctx
            .history
            .last_multipliers(RECENT_WINDOW)
            .into_iter()
            .filter(|m| *m >= deny.any_last3_at_least)
            .max_by(f64::total_cmp)
        {
            failed.push(EntryCondition::RecentSpike {
                multiplier: spike,
                threshold: deny.any_last3_at_least,
            });
        }

        if ctx.compound_level >= deny.compound_level_at_least {
            failed.push(EntryCondition::CompoundLevelAtMax {
                level: ctx.compound_level,
                max: deny.compound_level_at_least,
            });
        }

        if deny.during_cooldown && ctx.cooldown_remaining > 0 {
            failed.push(EntryCondition::CooldownActive {
                rounds_remaining: ctx.cooldown_remaining,
            });
        }

        if ctx.regime == Regime::Volatile && !only.allow_volatile {
            failed.push(EntryCondition::VolatileRegime);
        }

        if let Some(prev) = previous {
            if prev < only.prev_mult_min || prev > only.prev_mult_max {
                failed.push(EntryCondition::PrevMultOutOfBand {
                    multiplier: prev,
                    min: only.prev_mult_min,
                    max: only.prev_mult_max,
                });
            }
        }

        if only.min_confidence > 0.0 && ctx.confidence < only.min_confidence {
            failed.push(EntryCondition::LowConfidence {
                confidence: ctx.confidence,
                min: only.min_confidence,
            });
        }

        if only.min_predicted_multiplier > 0.0
            && ctx.predicted_multiplier < only.min_predicted_multiplier
        {
            failed.push(EntryCondition::LowPrediction {
                predicted: ctx.predicted_multiplier,
                min: only.min_predicted_multiplier,
            });
        }

        if let Some(balance) = ctx.balance {
            if balance < capital.min_balance {
                failed.push(EntryCondition::BalanceBelowMinimum {
                    balance,
                    minimum: capital.min_balance,
                });
            }
        }

        EntryDecision {
            permit: failed.is_empty(),
            failed,
            regime: ctx.regime,
            note: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
