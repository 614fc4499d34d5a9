//! Paper settlement.
//!
//! Settles a bet against the realized multiplier without touching any real
//! game surface: the bet pays `stake × (target − 1)` if the round reached
//! the cashout target, otherwise the stake is lost.

use rust_decimal::prelude::*;
use tracing::debug;

use crate::types::{CashoutMode, EngineError};

/// A settled paper bet.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub round_id: String,
    pub stake: Decimal,
    pub target: f64,
    pub mode: CashoutMode,
    pub final_multiplier: f64,
    pub pnl: Decimal,
}

impl Settlement {
    pub fn won(&self) -> bool {
        self.pnl > Decimal::ZERO
    }
}

pub struct PaperExecutor;

impl PaperExecutor {
    pub fn settle(
        round_id: &str,
        stake: Decimal,
        target: f64,
        mode: CashoutMode,
        final_multiplier: f64,
    ) -> Result<Settlement, EngineError> {
        let pnl = if final_multiplier >= target {
            let gain = Decimal::from_f64(target - 1.0).ok_or_else(|| {
                EngineError::Arithmetic(format!("cashout target {target} is not representable"))
            })?;
            (stake * gain).round_dp(2)
        } else {
            -stake
        };

        debug!(
            round_id,
            stake = %stake,
            target = format!("{target:.2}x"),
            crashed_at = format!("{final_multiplier:.2}x"),
            pnl = %pnl,
            "[PAPER] Bet settled"
        );

        Ok(Settlement {
            round_id: round_id.to_string(),
            stake,
            target,
            mode,
            final_multiplier,
            pnl,
        })
    }
}
