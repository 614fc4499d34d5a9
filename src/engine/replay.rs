//! Replay driver.
//!
//! Plays a recorded feed through the orchestrator's five decision points,
//! settling bets on paper. The engine's clock is a [`ManualClock`] pinned to
//! the feed's timestamps (or advanced by a fixed interval when a round has
//! none), so every time-based rule sees the same timeline it would have
//! seen live.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::fmt;
use tracing::{error, info};

use super::executor::{PaperExecutor, Settlement};
use super::feed::FeedRound;
use crate::clock::ManualClock;
use crate::config::LiveConfig;
use crate::rules::{EngineStatus, RulesOrchestrator};
use crate::types::StopDecision;

#[derive(Debug, Clone)]
pub struct ReplaySettings {
    /// Clock step for rounds without a timestamp.
    pub round_interval: Duration,
    /// Paper balance reported to the capital guard. `None` disables it.
    pub starting_balance: Option<Decimal>,
    /// Stop the replay at the first stop signal.
    pub halt_on_stop: bool,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            round_interval: Duration::seconds(10),
            starting_balance: None,
            halt_on_stop: true,
        }
    }
}

/// What happened in one replayed round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round_id: String,
    pub permitted: bool,
    pub reason: String,
    pub settlement: Option<Settlement>,
    pub stop: Option<StopDecision>,
}

#[derive(Debug, Clone)]
pub struct ReplaySummary {
    pub rounds: usize,
    pub bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub net_pnl: Decimal,
    pub balance: Option<Decimal>,
    pub stop: Option<StopDecision>,
    pub status: EngineStatus,
}

impl fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rounds={} bets={} (W{}/L{}) net={:.2}",
            self.rounds, self.bets, self.wins, self.losses, self.net_pnl
        )?;
        if let Some(balance) = self.balance {
            write!(f, " balance={balance:.2}")?;
        }
        match &self.stop {
            Some(stop) => write!(f, " | {stop}"),
            None => write!(f, " | completed"),
        }
    }
}

pub struct ReplayDriver {
    orchestrator: RulesOrchestrator,
    clock: ManualClock,
    settings: ReplaySettings,
    balance: Option<Decimal>,
    rounds: usize,
    bets: usize,
    wins: usize,
    losses: usize,
    net_pnl: Decimal,
    stop: Option<StopDecision>,
}

impl ReplayDriver {
    pub fn new(config: LiveConfig, settings: ReplaySettings, start: DateTime<Utc>) -> Self {
        let clock = ManualClock::new(start);
        let mut orchestrator = RulesOrchestrator::new(config, Box::new(clock.clone()));
        if let Some(balance) = settings.starting_balance {
            orchestrator.update_balance(balance);
        }
        Self {
            orchestrator,
            clock,
            balance: settings.starting_balance,
            settings,
            rounds: 0,
            bets: 0,
            wins: 0,
            losses: 0,
            net_pnl: Decimal::ZERO,
            stop: None,
        }
    }

    pub fn orchestrator(&self) -> &RulesOrchestrator {
        &self.orchestrator
    }

    /// Whether a stop signal was seen and the settings say to honour it.
    pub fn halted(&self) -> bool {
        self.settings.halt_on_stop && self.stop.is_some()
    }

    /// Drive one round through the full decision sequence.
    pub fn play_round(&mut self, round: &FeedRound) -> RoundReport {
        match round.timestamp {
            Some(at) => self.clock.set(at),
            None if self.rounds > 0 => self.clock.advance(self.settings.round_interval),
            None => {}
        }
        self.rounds += 1;

        let orc = &mut self.orchestrator;
        let (permitted, reason) = orc.evaluate_entry(round.predicted_multiplier, round.confidence);

        let settlement = if permitted {
            let (stake, _level) = orc.calculate_stake_for_bet();
            let (target, mode) = orc.calculate_cashout_target(round.predicted_multiplier);
            match PaperExecutor::settle(&round.round_id, stake, target, mode, round.final_multiplier) {
                Ok(s) => Some(s),
                Err(e) => {
                    error!(round_id = %round.round_id, error = %e, "Paper settlement failed, treating as no bet");
                    None
                }
            }
        } else {
            None
        };

        let (pnl, mode) = match &settlement {
            Some(s) => (s.pnl, Some(s.mode)),
            None => (Decimal::ZERO, None),
        };
        let (should_stop, stop) =
            orc.process_round_result(&round.round_id, round.final_multiplier, pnl, mode);

        if let Some(s) = &settlement {
            self.bets += 1;
            if s.won() {
                self.wins += 1;
            } else {
                self.losses += 1;
            }
            self.net_pnl += s.pnl;
            if let Some(balance) = self.balance.as_mut() {
                *balance += s.pnl;
                let current = *balance;
                self.orchestrator.update_balance(current);
            }
        }
        if should_stop && self.stop.is_none() {
            self.stop = stop.clone();
        }

        RoundReport {
            round_id: round.round_id.clone(),
            permitted,
            reason,
            settlement,
            stop,
        }
    }

    /// Replay a whole feed, stopping early on a stop signal if configured.
    pub fn run(&mut self, rounds: &[FeedRound]) -> ReplaySummary {
        for round in rounds {
            if self.halted() {
                break;
            }
            self.play_round(round);
        }
        let summary = self.summary();
        info!(summary = %summary, "Replay finished");
        summary
    }

    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            rounds: self.rounds,
            bets: self.bets,
            wins: self.wins,
            losses: self.losses,
            net_pnl: self.net_pnl,
            balance: self.balance,
            stop: self.stop.clone(),
            status: self.orchestrator.status(),
        }
    }
}
