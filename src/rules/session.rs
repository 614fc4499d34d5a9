//! Session tracking and stop conditions.
//!
//! Accumulates profit and loss separately, counts rounds, tracks the
//! two-window session clock (window 0 is the opening stretch, window 1
//! everything after) and evaluates the stop conditions in order:
//! profit target → max loss → time limit → early abort (window 0 only).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;

use super::minutes;
use crate::config::EngineConfig;
use crate::types::{CashoutMode, RoundOutcome, StopCategory, StopDecision};

/// Rounds at or above this multiplier feed the early-abort FIFO.
pub const HIGH_MULT_THRESHOLD: f64 = 10.0;
pub const HIGH_MULT_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetrics {
    pub started_at: DateTime<Utc>,
    pub total_profit: Decimal,
    pub total_loss: Decimal,
    pub net_pnl: Decimal,
    pub rounds_played: u64,
    pub rounds_won: u64,
    pub rounds_lost: u64,
    /// 0 inside the opening window, 1 afterwards.
    pub window_index: u8,
    pub max_stake: Decimal,
    pub aggressive_failures: u32,
    pub recent_high_mults: VecDeque<f64>,
}

impl SessionMetrics {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            total_profit: Decimal::ZERO,
            total_loss: Decimal::ZERO,
            net_pnl: Decimal::ZERO,
            rounds_played: 0,
            rounds_won: 0,
            rounds_lost: 0,
            window_index: 0,
            max_stake: Decimal::ZERO,
            aggressive_failures: 0,
            recent_high_mults: VecDeque::with_capacity(HIGH_MULT_CAPACITY),
        }
    }

    /// Win rate as a percentage. Returns 0.0 if nothing was played.
    pub fn win_rate(&self) -> f64 {
        if self.rounds_played == 0 {
            0.0
        } else {
            self.rounds_won as f64 / self.rounds_played as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionTracker {
    metrics: SessionMetrics,
}

impl SessionTracker {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            metrics: SessionMetrics::new(now),
        }
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.metrics.started_at
    }

    /// Fold one completed round into the running totals.
    pub fn record_round(
        &mut self,
        outcome: RoundOutcome,
        pnl: Decimal,
        mode: Option<CashoutMode>,
        multiplier: f64,
    ) {
        let m = &mut self.metrics;
        if pnl > Decimal::ZERO {
            m.total_profit += pnl;
        } else if pnl < Decimal::ZERO {
            m.total_loss += pnl.abs();
        }
        m.net_pnl = m.total_profit - m.total_loss;

        match outcome {
            RoundOutcome::Won => {
                m.rounds_played += 1;
                m.rounds_won += 1;
            }
            RoundOutcome::Lost => {
                m.rounds_played += 1;
                m.rounds_lost += 1;
                if mode == Some(CashoutMode::Aggressive) {
                    m.aggressive_failures += 1;
                }
            }
            RoundOutcome::Skipped => {}
        }

        if multiplier >= HIGH_MULT_THRESHOLD {
            m.recent_high_mults.push_back(multiplier);
            while m.recent_high_mults.len() > HIGH_MULT_CAPACITY {
                m.recent_high_mults.pop_front();
            }
        }
    }

    pub fn observe_stake(&mut self, stake: Decimal) {
        if stake > self.metrics.max_stake {
            self.metrics.max_stake = stake;
        }
    }

    /// Recompute the window index from elapsed time.
    pub fn refresh_window(&mut self, now: DateTime<Utc>, window_minutes: u64) -> u8 {
        let index = if self.elapsed(now) < minutes(window_minutes) { 0 } else { 1 };
        self.metrics.window_index = index;
        index
    }

    /// Evaluate the stop conditions; the first one that holds wins.
    pub fn should_stop(&mut self, config: &EngineConfig, now: DateTime<Utc>) -> StopDecision {
        let early = &config.stop_conditions.early_abort;
        let window = self.refresh_window(now, early.window_minutes);
        let m = &self.metrics;

        let target = config.profit_target();
        if m.total_profit >= target {
            return StopDecision::stop(
                StopCategory::ProfitTarget,
                format!("profit {:.2} reached target {:.2}", m.total_profit, target),
            );
        }

        let max_loss = config.max_loss();
        if m.total_loss >= max_loss {
            return StopDecision::stop(
                StopCategory::LossLimit,
                format!("loss {:.2} reached limit {:.2}", m.total_loss, max_loss),
            );
        }

        let duration = config.duration_minutes();
        let elapsed = self.elapsed(now);
        if elapsed >= minutes(duration) {
            return StopDecision::stop(
                StopCategory::TimeLimit,
                format!("{} minutes elapsed (limit {duration})", elapsed.num_minutes()),
            );
        }

        if window == 0 && early.enabled {
            if m.total_loss >= early.loss_threshold {
                return StopDecision::stop(
                    StopCategory::EarlyAbort,
                    format!(
                        "early loss {:.2} >= {:.2}",
                        m.total_loss, early.loss_threshold
                    ),
                );
            }
            if early.max_aggressive_failures > 0
                && m.aggressive_failures >= early.max_aggressive_failures
            {
                return StopDecision::stop(
                    StopCategory::EarlyAbort,
                    format!("{} failed aggressive rounds", m.aggressive_failures),
                );
            }
            if early.high_mult_count > 0 && m.recent_high_mults.len() >= early.high_mult_count {
                return StopDecision::stop(
                    StopCategory::EarlyAbort,
                    format!("{} high multipliers early in session", m.recent_high_mults.len()),
                );
            }
        }

        StopDecision::keep_going()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
