//! Cashout target selection.
//!
//! Priority chain, first match wins:
//! defensive (session loss over trigger) → aggressive (profitable, level 0,
//! favourable regime, not yet used this window) → regime-forced defensive
//! (TIGHT / VOLATILE) → default.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::minutes;
use crate::config::{CashoutConfig, CashoutModeSetting};
use crate::types::{CashoutDecision, CashoutMode, Regime};

/// Rolling window gating the aggressive mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggressiveWindow {
    pub started_at: Option<DateTime<Utc>>,
    pub used: bool,
}

impl AggressiveWindow {
    /// Start a fresh window when none is open or the current one expired.
    fn roll(&mut self, now: DateTime<Utc>, length: Duration) {
        let expired = match self.started_at {
            Some(start) => now - start >= length,
            None => true,
        };
        if expired {
            self.started_at = Some(now);
            self.used = false;
        }
    }
}

#[derive(Debug, Clone)]
pub struct CashoutContext {
    pub session_profit: Decimal,
    pub session_loss: Decimal,
    pub compound_level: u32,
    pub regime: Regime,
}

#[derive(Debug, Clone, Default)]
pub struct CashoutSelector {
    window: AggressiveWindow,
}

impl CashoutSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_window(&mut self) {
        self.window = AggressiveWindow::default();
    }

    pub fn select(
        &mut self,
        ctx: &CashoutContext,
        config: &CashoutConfig,
        now: DateTime<Utc>,
    ) -> CashoutDecision {
        match config.mode {
            CashoutModeSetting::Auto => {}
            CashoutModeSetting::Default => {
                return decision(config.standard.multiplier, CashoutMode::Default, "pinned by config")
            }
            CashoutModeSetting::Defensive => {
                return decision(config.defensive.multiplier, CashoutMode::Defensive, "pinned by config")
            }
            CashoutModeSetting::Aggressive => {
                return decision(config.aggressive.multiplier, CashoutMode::Aggressive, "pinned by config")
            }
        }

        let aggressive = &config.aggressive;
        self.window.roll(now, minutes(aggressive.window_duration_min));

        if ctx.session_loss >= config.defensive.trigger_loss {
            return decision(
                config.defensive.multiplier,
                CashoutMode::Defensive,
                format!(
                    "session loss {:.2} >= {:.2}",
                    ctx.session_loss, config.defensive.trigger_loss
                ),
            );
        }

        if ctx.session_profit >= aggressive.min_profit
            && ctx.compound_level == 0
            && ctx.regime == aggressive.require_regime
            && !self.window.used
        {
            self.window.used = true;
            return decision(
                aggressive.multiplier,
                CashoutMode::Aggressive,
                format!(
                    "profit {:.2} >= {:.2} in {} regime",
                    ctx.session_profit, aggressive.min_profit, ctx.regime
                ),
            );
        }

        match ctx.regime {
            Regime::Tight => decision(
                config.defensive.multiplier,
                CashoutMode::RegimeTight,
                "TIGHT regime",
            ),
            Regime::Volatile => decision(
                config.defensive.multiplier,
                CashoutMode::RegimeVolatile,
                "VOLATILE regime",
            ),
            _ => decision(config.standard.multiplier, CashoutMode::Default, "default target"),
        }
    }
}

fn decision(multiplier: f64, mode: CashoutMode, reason: impl Into<String>) -> CashoutDecision {
    CashoutDecision {
        multiplier,
        mode,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
