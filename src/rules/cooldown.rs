//! Cooldown manager.
//!
//! After each completed round the trigger rules are checked in fixed
//! priority order; the first match arms the cooldown with its own skip
//! count. Simultaneous matches never stack. The counter then ticks down
//! exactly once per round and clears the cooldown when it reaches zero.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::config::CooldownsConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CooldownState {
    pub active: bool,
    pub rounds_remaining: u32,
    pub reason: String,
    pub activated_at: Option<DateTime<Utc>>,
}

/// A cooldown rule that fired.
#[derive(Debug, Clone, PartialEq)]
pub enum CooldownTrigger {
    HighMultiplier { multiplier: f64, threshold: f64 },
    LossStreak { losses: u32, stake: Decimal },
    MaxCompound { level: u32, max: u32 },
}

impl fmt::Display for CooldownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CooldownTrigger::HighMultiplier { multiplier, threshold } => {
                write!(f, "high multiplier {multiplier:.2}x >= {threshold:.2}x")
            }
            CooldownTrigger::LossStreak { losses, stake } => {
                write!(f, "{losses} consecutive losses at stake {stake:.2}")
            }
            CooldownTrigger::MaxCompound { level, max } => {
                write!(f, "compound level {level} reached max {max}")
            }
        }
    }
}

/// What the manager looks at after a round settles.
#[derive(Debug, Clone)]
pub struct CooldownInput {
    pub last_multiplier: f64,
    pub consecutive_losses: u32,
    /// Stake of the bet that just settled.
    pub stake: Decimal,
    pub compound_level: u32,
    pub max_compound: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CooldownManager {
    state: CooldownState,
}

impl CooldownManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CooldownState {
        &self.state
    }

    pub fn rounds_remaining(&self) -> u32 {
        self.state.rounds_remaining
    }

    /// Check triggers in priority order and arm the first match.
    pub fn check_triggers(
        &mut self,
        input: &CooldownInput,
        config: &CooldownsConfig,
        now: DateTime<Utc>,
    ) -> Option<(CooldownTrigger, u32)> {
        let high = &config.after_high_mult;
        let streak = &config.after_consecutive_losses;
        let compound = &config.after_max_compound;

        let fired = if high.enabled
            && high.skip_rounds > 0
            && input.last_multiplier >= high.threshold
        {
            Some((
                CooldownTrigger::HighMultiplier {
                    multiplier: input.last_multiplier,
                    threshold: high.threshold,
                },
                high.skip_rounds,
            ))
        } else if streak.enabled
            && streak.skip_rounds > 0
            && streak.count > 0
            && input.consecutive_losses >= streak.count
            && input.stake >= streak.min_stake
        {
            Some((
                CooldownTrigger::LossStreak {
                    losses: input.consecutive_losses,
                    stake: input.stake,
                },
                streak.skip_rounds,
            ))
        } else if compound.enabled
            && compound.skip_rounds > 0
            && input.max_compound > 0
            && input.compound_level >= input.max_compound
        {
            Some((
                CooldownTrigger::MaxCompound {
                    level: input.compound_level,
                    max: input.max_compound,
                },
                compound.skip_rounds,
            ))
        } else {
            None
        };

        if let Some((trigger, skip)) = &fired {
            self.state = CooldownState {
                active: true,
                rounds_remaining: *skip,
                reason: trigger.to_string(),
                activated_at: Some(now),
            };
        }
        fired
    }

    /// Consume one round of cooldown.
    pub fn tick(&mut self) {
        if !self.state.active {
            return;
        }
        self.state.rounds_remaining = self.state.rounds_remaining.saturating_sub(1);
        if self.state.rounds_remaining == 0 {
            self.state = CooldownState::default();
        }
    }

    pub fn reset(&mut self) {
        self.state = CooldownState::default();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
