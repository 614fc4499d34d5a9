//! Stake compounding.
//!
//! One transition per bet, evaluated in order:
//!
//! 1. Forced reset to base stake / level 0 when the level is already at
//!    max, the previous round hit the high-multiplier reset threshold, a
//!    losing streak ran at or above the stake floor, or the regime is TIGHT.
//! 2. After a win, compound: `stake × win_multiplier` capped at max stake,
//!    level + 1.
//! 3. After a loss, retreat: `stake / loss_divisor` floored at base stake,
//!    level − 1 (never below 0).
//!
//! A level that blocks entry (at max, or at the entry filter's veto level)
//! is released on the next round without a bet, since no bet means no
//! transition would ever run to reset it.
//!
//! Stake always stays within `[base_stake, max_stake]` and the level within
//! `[0, max_steps]`.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::config::{CapitalConfig, StakeCompoundingConfig};
use crate::types::{EngineError, Regime, RoundOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeState {
    pub current_stake: Decimal,
    pub base_stake: Decimal,
    pub max_stake: Decimal,
    pub compound_level: u32,
    pub max_compound_steps: u32,
}

impl StakeState {
    fn clamp(&mut self) {
        self.current_stake = self.current_stake.max(self.base_stake).min(self.max_stake);
        self.compound_level = self.compound_level.min(self.max_compound_steps);
    }
}

/// Why the stake was forced back to base.
#[derive(Debug, Clone, PartialEq)]
pub enum ResetReason {
    CompoundingDisabled,
    MaxLevel { level: u32 },
    HighMultiplier { multiplier: f64 },
    LossStreak { losses: u32 },
    Regime(Regime),
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::CompoundingDisabled => write!(f, "compounding disabled"),
            ResetReason::MaxLevel { level } => write!(f, "level {level} at max"),
            ResetReason::HighMultiplier { multiplier } => {
                write!(f, "previous round {multiplier:.2}x")
            }
            ResetReason::LossStreak { losses } => write!(f, "{losses} consecutive losses"),
            ResetReason::Regime(regime) => write!(f, "regime {regime}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StakeTransition {
    Reset(ResetReason),
    Compounded,
    Retreated,
    /// No settled bet since the last transition.
    Held,
}

impl fmt::Display for StakeTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeTransition::Reset(reason) => write!(f, "reset ({reason})"),
            StakeTransition::Compounded => write!(f, "compounded"),
            StakeTransition::Retreated => write!(f, "retreated"),
            StakeTransition::Held => write!(f, "held"),
        }
    }
}

/// Inputs for one stake transition.
#[derive(Debug, Clone)]
pub struct StakeInput {
    /// Outcome of the last settled bet, if one has not been applied yet.
    pub outcome: Option<RoundOutcome>,
    /// Multiplier of the most recent completed round.
    pub last_multiplier: Option<f64>,
    pub consecutive_losses: u32,
    pub regime: Regime,
}

#[derive(Debug, Clone)]
pub struct StakeManager {
    state: StakeState,
}

impl StakeManager {
    pub fn new(capital: &CapitalConfig, compounding: &StakeCompoundingConfig) -> Self {
        Self {
            state: StakeState {
                current_stake: capital.start_bet,
                base_stake: capital.start_bet,
                max_stake: capital.max_bet,
                compound_level: 0,
                max_compound_steps: compounding.max_steps,
            },
        }
    }

    pub fn state(&self) -> &StakeState {
        &self.state
    }

    pub fn current_stake(&self) -> Decimal {
        self.state.current_stake
    }

    pub fn compound_level(&self) -> u32 {
        self.state.compound_level
    }

    /// Adopt new bounds after a config reload, keeping stake and level.
    pub fn apply_config(&mut self, capital: &CapitalConfig, compounding: &StakeCompoundingConfig) {
        self.state.base_stake = capital.start_bet;
        self.state.max_stake = capital.max_bet.max(capital.start_bet);
        self.state.max_compound_steps = compounding.max_steps;
        self.state.clamp();
    }

    pub fn reset(&mut self) {
        self.state.current_stake = self.state.base_stake;
        self.state.compound_level = 0;
    }

    /// Advance the stake for the next bet.
    pub fn next(
        &mut self,
        input: &StakeInput,
        config: &StakeCompoundingConfig,
    ) -> Result<StakeTransition, EngineError> {
        if let Some(reason) = self.reset_reason(input, config) {
            self.reset();
            return Ok(StakeTransition::Reset(reason));
        }

        let state = &mut self.state;
        let transition = match input.outcome {
            Some(RoundOutcome::Won) if state.compound_level < state.max_compound_steps => {
                let raised = state
                    .current_stake
                    .checked_mul(config.win_multiplier)
                    .ok_or_else(|| overflow("stake × win_multiplier"))?;
                state.current_stake = raised.min(state.max_stake);
                state.compound_level += 1;
                StakeTransition::Compounded
            }
            Some(RoundOutcome::Lost) => {
                let lowered = state
                    .current_stake
                    .checked_div(config.loss_divisor)
                    .ok_or_else(|| overflow("stake / loss_divisor"))?;
                state.current_stake = lowered.max(state.base_stake);
                state.compound_level = state.compound_level.saturating_sub(1);
                StakeTransition::Retreated
            }
            _ => StakeTransition::Held,
        };
        state.clamp();
        Ok(transition)
    }

    /// Release a blocking level on a round where no bet was placed.
    ///
    /// `veto_level` is the compound level at which entry is refused.
    pub fn release_idle(&mut self, veto_level: u32) -> Option<ResetReason> {
        let level = self.state.compound_level;
        if level == 0 || (level < self.state.max_compound_steps && level < veto_level) {
            return None;
        }
        self.reset();
        Some(ResetReason::MaxLevel { level })
    }

    fn reset_reason(
        &self,
        input: &StakeInput,
        config: &StakeCompoundingConfig,
    ) -> Option<ResetReason> {
        let state = &self.state;
        if !config.enabled {
            return Some(ResetReason::CompoundingDisabled);
        }
        if state.compound_level >= state.max_compound_steps {
            return Some(ResetReason::MaxLevel {
                level: state.compound_level,
            });
        }
        if let Some(multiplier) = input.last_multiplier {
            if multiplier >= config.reset_on_high_mult {
                return Some(ResetReason::HighMultiplier { multiplier });
            }
        }
        if config.reset_after_losses > 0
            && input.consecutive_losses >= config.reset_after_losses
            && state.current_stake >= config.reset_loss_stake_floor
        {
            return Some(ResetReason::LossStreak {
                losses: input.consecutive_losses,
            });
        }
        if input.regime == Regime::Tight {
            return Some(ResetReason::Regime(input.regime));
        }
        None
    }
}

fn overflow(op: &str) -> EngineError {
    EngineError::Arithmetic(format!("{op} is out of range"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
