//! Rules engine: per-round decisions and session bookkeeping.
//!
//! [`RulesOrchestrator`] owns every rule component and sequences them once
//! per round, in this order:
//!
//! 1. [`RulesOrchestrator::evaluate_entry`]
//! 2. [`RulesOrchestrator::calculate_stake_for_bet`]
//! 3. [`RulesOrchestrator::calculate_cashout_target`]
//! 4. (the round plays out)
//! 5. [`RulesOrchestrator::process_round_result`]
//!
//! [`RulesOrchestrator::reset_session`] starts a new session between rounds.
//!
//! None of them fail: an internal error is logged and answered with the
//! most conservative decision (deny entry, base stake, default cashout).

/// Emit at `info` when the config flag is set, else at `debug`.
macro_rules! decision_event {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            ::tracing::info!($($arg)+)
        } else {
            ::tracing::debug!($($arg)+)
        }
    };
}

pub mod cashout;
pub mod cooldown;
pub mod entry;
pub mod history;
pub mod regime;
pub mod session;
pub mod stake;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::{EngineConfig, LiveConfig, ReloadOutcome};
use crate::types::{
    validate_multiplier, CashoutDecision, CashoutMode, EngineError, Regime, RoundOutcome,
    RoundRecord, StopDecision,
};
use cashout::{CashoutContext, CashoutSelector};
use cooldown::{CooldownInput, CooldownManager, CooldownState};
use entry::{EntryContext, EntryDecision, EntryFilter};
use history::HistoricalCache;
use regime::{RegimeClassification, RegimeDetector};
use session::{SessionMetrics, SessionTracker};
use stake::{StakeInput, StakeManager};

/// Longest window/TTL honoured (ten years); larger config values saturate.
const MAX_MINUTES: u64 = 10 * 365 * 24 * 60;

pub(crate) fn minutes(m: u64) -> Duration {
    Duration::minutes(m.min(MAX_MINUTES) as i64)
}

pub(crate) fn seconds(s: u64) -> Duration {
    Duration::seconds(s.min(MAX_MINUTES * 60) as i64)
}

// ---------------------------------------------------------------------------
// Status snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the engine for external observability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub enabled: bool,
    pub regime: Regime,
    pub regime_confidence: f64,
    pub stake: Decimal,
    pub compound_level: u32,
    pub cooldown: CooldownState,
    pub session_profit: Decimal,
    pub session_loss: Decimal,
    pub net_pnl: Decimal,
    pub rounds_played: u64,
    pub consecutive_losses: u32,
    pub window_index: u8,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | regime={} ({:.0}%) | stake={:.2} L{} | cooldown={} | profit={:.2} loss={:.2} net={:.2} | rounds={} | loss_streak={}",
            if self.enabled { "ENABLED" } else { "DISABLED" },
            self.regime,
            self.regime_confidence * 100.0,
            self.stake,
            self.compound_level,
            if self.cooldown.active {
                format!("{} ({})", self.cooldown.rounds_remaining, self.cooldown.reason)
            } else {
                "off".to_string()
            },
            self.session_profit,
            self.session_loss,
            self.net_pnl,
            self.rounds_played,
            self.consecutive_losses,
        )
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Sequences the rule components and exposes the per-round decision API.
///
/// Single-threaded by contract: the round loop calls the decision points
/// in order and all state changes happen between rounds.
pub struct RulesOrchestrator {
    config: LiveConfig,
    clock: Box<dyn Clock>,
    history: HistoricalCache,
    detector: RegimeDetector,
    regime: RegimeClassification,
    cooldown: CooldownManager,
    stake: StakeManager,
    cashout: CashoutSelector,
    session: SessionTracker,
    consecutive_losses: u32,
    /// Outcome of the last settled bet, consumed by the next stake calculation.
    pending_outcome: Option<RoundOutcome>,
    /// Stake of the most recent bet.
    last_stake: Decimal,
    balance: Option<Decimal>,
}

impl RulesOrchestrator {
    pub fn new(config: LiveConfig, clock: Box<dyn Clock>) -> Self {
        let now = clock.now();
        let cfg = config.current();
        Self {
            history: HistoricalCache::new(cfg.regime_model.evaluation_window_rounds),
            detector: RegimeDetector::new(),
            regime: RegimeClassification::insufficient(now),
            cooldown: CooldownManager::new(),
            stake: StakeManager::new(&cfg.capital, &cfg.stake_compounding),
            cashout: CashoutSelector::new(),
            session: SessionTracker::new(now),
            consecutive_losses: 0,
            pending_outcome: None,
            last_stake: cfg.capital.start_bet,
            balance: None,
            config,
            clock,
        }
    }

    // -- 1. Entry ----------------------------------------------------------

    /// Decide whether to bet this round. Returns the permit flag and a
    /// human-readable reason.
    pub fn evaluate_entry(&mut self, predicted_multiplier: f64, confidence: f64) -> (bool, String) {
        let decision = self.evaluate_entry_detailed(predicted_multiplier, confidence);
        (decision.permit, decision.reason())
    }

    /// Like [`Self::evaluate_entry`] but returns every failed condition.
    pub fn evaluate_entry_detailed(
        &mut self,
        predicted_multiplier: f64,
        confidence: f64,
    ) -> EntryDecision {
        match self.try_evaluate_entry(predicted_multiplier, confidence) {
            Ok(decision) => decision,
            Err(e) => {
                error!(error = %e, "Entry evaluation failed, denying entry");
                EntryDecision::denied(self.regime.regime, format!("entry evaluation failed: {e}"))
            }
        }
    }

    fn try_evaluate_entry(
        &mut self,
        predicted_multiplier: f64,
        confidence: f64,
    ) -> Result<EntryDecision, EngineError> {
        self.check_config_reload();

        validate_multiplier("predicted_multiplier", predicted_multiplier)?;
        if !confidence.is_finite() {
            return Err(EngineError::InvalidInput {
                field: "confidence",
                message: format!("expected a finite value, got {confidence}"),
            });
        }

        let cfg = self.config.current();
        let now = self.clock.now();
        self.refresh_regime(&cfg, now);

        if !cfg.session.rules_enabled {
            return Ok(EntryDecision::bypassed(self.regime.regime, "rules engine disabled"));
        }

        let ctx = EntryContext {
            history: &self.history,
            regime: self.regime.regime,
            compound_level: self.stake.compound_level(),
            cooldown_remaining: self.cooldown.rounds_remaining(),
            predicted_multiplier,
            confidence,
            balance: self.balance,
        };
        let decision = EntryFilter::evaluate(&ctx, &cfg.entry_filters, &cfg.capital);

        decision_event!(
            cfg.logging.log_entry_decisions,
            permit = decision.permit,
            regime = %decision.regime,
            predicted = format!("{predicted_multiplier:.2}x"),
            confidence = format!("{:.0}%", confidence * 100.0),
            failed = ?decision.failed_names(),
            "Entry evaluated"
        );
        Ok(decision)
    }

    // -- 2. Stake ----------------------------------------------------------

    /// Stake and compounding level for the bet about to be placed.
    pub fn calculate_stake_for_bet(&mut self) -> (Decimal, u32) {
        let cfg = self.config.current();
        if !cfg.session.rules_enabled {
            self.pending_outcome = None;
            return (cfg.capital.start_bet, 0);
        }

        let input = StakeInput {
            outcome: self.pending_outcome.take(),
            last_multiplier: self.history.latest().map(|r| r.multiplier),
            consecutive_losses: self.consecutive_losses,
            regime: self.regime.regime,
        };

        match self.stake.next(&input, &cfg.stake_compounding) {
            Ok(transition) => {
                decision_event!(
                    cfg.logging.log_stake,
                    stake = %self.stake.current_stake(),
                    level = self.stake.compound_level(),
                    max_stake = %self.stake.state().max_stake,
                    transition = %transition,
                    "Stake calculated"
                );
            }
            Err(e) => {
                error!(error = %e, "Stake calculation failed, falling back to base stake");
                self.stake.reset();
            }
        }

        let stake = self.stake.current_stake();
        self.last_stake = stake;
        self.session.observe_stake(stake);
        (stake, self.stake.compound_level())
    }

    // -- 3. Cashout --------------------------------------------------------

    /// Exit multiplier and mode for the bet about to be placed.
    pub fn calculate_cashout_target(&mut self, predicted_multiplier: f64) -> (f64, CashoutMode) {
        let decision = self.calculate_cashout_decision(predicted_multiplier);
        (decision.multiplier, decision.mode)
    }

    pub fn calculate_cashout_decision(&mut self, predicted_multiplier: f64) -> CashoutDecision {
        let cfg = self.config.current();
        let fallback = CashoutDecision {
            multiplier: cfg.cashout.standard.multiplier,
            mode: CashoutMode::Default,
            reason: "default target".to_string(),
        };

        if let Err(e) = validate_multiplier("predicted_multiplier", predicted_multiplier) {
            error!(error = %e, "Cashout selection failed, using default target");
            return fallback;
        }
        if !cfg.session.rules_enabled {
            return fallback;
        }

        let metrics = self.session.metrics();
        let ctx = CashoutContext {
            session_profit: metrics.total_profit,
            session_loss: metrics.total_loss,
            compound_level: self.stake.compound_level(),
            regime: self.regime.regime,
        };
        let decision = self.cashout.select(&ctx, &cfg.cashout, self.clock.now());

        decision_event!(
            cfg.logging.log_cashout,
            target = format!("{:.2}x", decision.multiplier),
            mode = %decision.mode,
            predicted = format!("{predicted_multiplier:.2}x"),
            reason = %decision.reason,
            "Cashout target selected"
        );
        decision
    }

    // -- 5. Settlement -----------------------------------------------------

    /// Fold a finished round into engine state and evaluate stop conditions.
    ///
    /// `cashout_mode` is `None` when no bet was placed this round.
    pub fn process_round_result(
        &mut self,
        round_id: &str,
        final_multiplier: f64,
        pnl: Decimal,
        cashout_mode: Option<CashoutMode>,
    ) -> (bool, Option<StopDecision>) {
        let cfg = self.config.current();
        let now = self.clock.now();

        if let Err(e) = self.try_record_round(&cfg, now, round_id, final_multiplier, pnl, cashout_mode) {
            error!(round_id, error = %e, "Round result rejected");
        }

        let stop = self.session.should_stop(&cfg, now);
        if stop.should_stop {
            warn!(
                round_id,
                category = ?stop.category,
                reason = %stop.reason,
                "Session stop condition reached"
            );
            (true, Some(stop))
        } else {
            (false, None)
        }
    }

    fn try_record_round(
        &mut self,
        cfg: &EngineConfig,
        now: DateTime<Utc>,
        round_id: &str,
        final_multiplier: f64,
        pnl: Decimal,
        cashout_mode: Option<CashoutMode>,
    ) -> Result<RoundOutcome, EngineError> {
        let multiplier = validate_multiplier("final_multiplier", final_multiplier)?;

        let outcome = match cashout_mode {
            None => RoundOutcome::Skipped,
            Some(_) if pnl > Decimal::ZERO => RoundOutcome::Won,
            Some(_) if pnl < Decimal::ZERO => RoundOutcome::Lost,
            Some(_) => RoundOutcome::Skipped,
        };

        self.session.record_round(outcome, pnl, cashout_mode, multiplier);
        match outcome {
            RoundOutcome::Won => self.consecutive_losses = 0,
            RoundOutcome::Lost => self.consecutive_losses += 1,
            RoundOutcome::Skipped => {}
        }
        // Outcomes settled with the rules off must not steer the first
        // stake after they are switched back on.
        if outcome != RoundOutcome::Skipped && cfg.session.rules_enabled {
            self.pending_outcome = Some(outcome);
        }

        let level = self.stake.compound_level();
        self.history
            .push(RoundRecord::new(round_id, multiplier, now, level));

        // Streak and compounding triggers only make sense on a settled bet;
        // on skipped rounds they would re-arm forever.
        let settled = outcome != RoundOutcome::Skipped;
        let input = CooldownInput {
            last_multiplier: multiplier,
            consecutive_losses: if settled { self.consecutive_losses } else { 0 },
            stake: self.last_stake,
            compound_level: if settled { level } else { 0 },
            max_compound: cfg.stake_compounding.max_steps,
        };
        if let Some((trigger, skip)) = self.cooldown.check_triggers(&input, &cfg.cooldowns, now) {
            decision_event!(
                cfg.logging.log_cooldowns,
                round_id,
                skip_rounds = skip,
                reason = %trigger,
                "Cooldown armed"
            );
        }
        self.cooldown.tick();

        if !settled {
            let veto_level = cfg.entry_filters.do_not_bet_if.compound_level_at_least;
            if let Some(reason) = self.stake.release_idle(veto_level) {
                self.pending_outcome = None;
                decision_event!(
                    cfg.logging.log_stake,
                    round_id,
                    stake = %self.stake.current_stake(),
                    reason = %reason,
                    "Stake reset on idle round"
                );
            }
        }

        let m = self.session.metrics();
        decision_event!(
            cfg.logging.log_session,
            round_id,
            multiplier = format!("{multiplier:.2}x"),
            outcome = %outcome,
            pnl = %pnl,
            net = %m.net_pnl,
            loss_streak = self.consecutive_losses,
            cooldown = self.cooldown.rounds_remaining(),
            "Round processed"
        );
        Ok(outcome)
    }

    // -- Session -----------------------------------------------------------

    /// Start a new session. The round cache and stake baseline survive.
    pub fn reset_session(&mut self) {
        let now = self.clock.now();
        self.session = SessionTracker::new(now);
        self.consecutive_losses = 0;
        self.cashout.reset_window();
        self.cooldown.reset();
        info!("Session reset");
    }

    /// Report an externally observed balance for the capital guard.
    pub fn update_balance(&mut self, balance: Decimal) {
        let cfg = self.config.get();
        if balance < cfg.capital.preferred_balance {
            warn!(
                balance = %balance,
                preferred = %cfg.capital.preferred_balance,
                "Balance below preferred level"
            );
        }
        self.balance = Some(balance);
    }

    // -- Observability -----------------------------------------------------

    pub fn status(&self) -> EngineStatus {
        let cfg = self.config.get();
        let m = self.session.metrics();
        EngineStatus {
            enabled: cfg.session.rules_enabled,
            regime: self.regime.regime,
            regime_confidence: self.regime.confidence,
            stake: self.stake.current_stake(),
            compound_level: self.stake.compound_level(),
            cooldown: self.cooldown.state().clone(),
            session_profit: m.total_profit,
            session_loss: m.total_loss,
            net_pnl: m.net_pnl,
            rounds_played: m.rounds_played,
            consecutive_losses: self.consecutive_losses,
            window_index: m.window_index,
        }
    }

    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.current()
    }

    pub fn history(&self) -> &HistoricalCache {
        &self.history
    }

    pub fn regime(&self) -> &RegimeClassification {
        &self.regime
    }

    pub fn session_metrics(&self) -> &SessionMetrics {
        self.session.metrics()
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    // -- Internals ---------------------------------------------------------

    fn check_config_reload(&mut self) {
        match self.config.check_reload() {
            ReloadOutcome::Unchanged => {}
            ReloadOutcome::Reloaded => {
                let cfg = self.config.current();
                self.stake.apply_config(&cfg.capital, &cfg.stake_compounding);
                if cfg.regime_model.evaluation_window_rounds != self.history.capacity() {
                    warn!(
                        capacity = self.history.capacity(),
                        configured = cfg.regime_model.evaluation_window_rounds,
                        "evaluation_window_rounds changed; cache capacity applies on restart"
                    );
                }
            }
            ReloadOutcome::Failed(reason) => {
                warn!(path = ?self.config.path(), reason = %reason, "Continuing with previous config");
            }
        }
    }

    fn refresh_regime(&mut self, cfg: &EngineConfig, now: DateTime<Utc>) {
        let classification = self.detector.detect(
            &self.history,
            &cfg.regime_model,
            &cfg.regime_thresholds,
            now,
        );
        if classification.regime != self.regime.regime {
            decision_event!(
                cfg.logging.log_regime,
                from = %self.regime.regime,
                to = %classification.regime,
                confidence = classification.confidence,
                samples = classification.samples,
                "Regime changed"
            );
        }
        self.regime = classification;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, MockClock};
    use crate::types::StopCategory;
    use rust_decimal_macros::dec;

    // ---- helpers -----------------------------------------------------------

    fn fixed_clock(now: DateTime<Utc>) -> Box<dyn Clock> {
        let mut clock = MockClock::new();
        clock.expect_now().return_const(now);
        Box::new(clock)
    }

    fn make_orchestrator(config: EngineConfig) -> RulesOrchestrator {
        RulesOrchestrator::new(LiveConfig::fixed(config), fixed_clock(Utc::now()))
    }

    /// Play one full round through all five decision points.
    fn play(
        orc: &mut RulesOrchestrator,
        id: &str,
        final_multiplier: f64,
    ) -> (bool, Option<StopDecision>) {
        let (permit, _) = orc.evaluate_entry(2.0, 0.8);
        if !permit {
            return orc.process_round_result(id, final_multiplier, Decimal::ZERO, None);
        }
        let (stake, _) = orc.calculate_stake_for_bet();
        let (target, mode) = orc.calculate_cashout_target(2.0);
        let pnl = if final_multiplier >= target {
            stake * Decimal::try_from(target - 1.0).unwrap()
        } else {
            -stake
        };
        orc.process_round_result(id, final_multiplier, pnl, Some(mode))
    }

    // ---- tests -------------------------------------------------------------

    #[test]
    fn test_fresh_engine_permits_and_uses_base_stake() {
        let mut orc = make_orchestrator(EngineConfig::default());
        let (permit, reason) = orc.evaluate_entry(2.1, 0.7);
        assert!(permit, "{reason}");
        assert_eq!(orc.calculate_stake_for_bet(), (dec!(15), 0));
        assert_eq!(orc.calculate_cashout_target(2.1), (2.0, CashoutMode::Default));
    }

    #[test]
    fn test_win_compounds_next_stake() {
        let mut orc = make_orchestrator(EngineConfig::default());
        orc.evaluate_entry(2.0, 0.8);
        orc.calculate_stake_for_bet();
        orc.process_round_result("r1", 2.5, dec!(15), Some(CashoutMode::Default));

        orc.evaluate_entry(2.0, 0.8);
        assert_eq!(orc.calculate_stake_for_bet(), (dec!(21.0), 1));
        assert_eq!(orc.session_metrics().max_stake, dec!(21.0));
    }

    #[test]
    fn test_stake_applied_once_per_settlement() {
        let mut orc = make_orchestrator(EngineConfig::default());
        orc.calculate_stake_for_bet();
        orc.process_round_result("r1", 2.5, dec!(15), Some(CashoutMode::Default));
        assert_eq!(orc.calculate_stake_for_bet(), (dec!(21.0), 1));
        assert_eq!(orc.calculate_stake_for_bet(), (dec!(21.0), 1));
    }

    #[test]
    fn test_three_losses_at_floor_arm_cooldown() {
        let mut cfg = EngineConfig::default();
        cfg.capital.start_bet = dec!(25);
        // Keep the stake manager from resetting the streak first.
        cfg.stake_compounding.reset_after_losses = 0;
        let mut orc = make_orchestrator(cfg);

        for id in ["r1", "r2", "r3"] {
            orc.calculate_stake_for_bet();
            orc.process_round_result(id, 1.1, dec!(-25), Some(CashoutMode::Default));
        }
        let status = orc.status();
        assert_eq!(status.consecutive_losses, 3);
        assert!(status.cooldown.active);
        // Armed with 2, ticked once in the same round.
        assert_eq!(status.cooldown.rounds_remaining, 1);
        assert_eq!(status.cooldown.reason, "3 consecutive losses at stake 25.00");

        let (permit, reason) = orc.evaluate_entry(2.0, 0.8);
        assert!(!permit);
        assert!(reason.contains("cooldown"));
    }

    #[test]
    fn test_skipped_rounds_do_not_rearm_loss_cooldown() {
        let mut cfg = EngineConfig::default();
        cfg.capital.start_bet = dec!(25);
        cfg.stake_compounding.reset_after_losses = 0;
        cfg.cooldowns.after_consecutive_losses.skip_rounds = 3;
        let mut orc = make_orchestrator(cfg);

        for id in ["r1", "r2", "r3"] {
            orc.calculate_stake_for_bet();
            orc.process_round_result(id, 1.1, dec!(-25), Some(CashoutMode::Default));
        }
        assert_eq!(orc.status().cooldown.rounds_remaining, 2);
        orc.process_round_result("r4", 1.8, Decimal::ZERO, None);
        assert_eq!(orc.status().cooldown.rounds_remaining, 1);
        orc.process_round_result("r5", 1.8, Decimal::ZERO, None);
        assert!(!orc.status().cooldown.active);
        assert_eq!(orc.consecutive_losses(), 3);
    }

    #[test]
    fn test_high_multiplier_round_arms_cooldown_and_vetoes() {
        let mut orc = make_orchestrator(EngineConfig::default());
        orc.process_round_result("r1", 15.0, Decimal::ZERO, None);
        let (permit, reason) = orc.evaluate_entry(2.0, 0.8);
        assert!(!permit);
        assert!(reason.contains("15.00x"));
        assert!(reason.contains("cooldown"));
    }

    #[test]
    fn test_invalid_inputs_fail_safe() {
        let mut orc = make_orchestrator(EngineConfig::default());
        let (permit, _) = orc.evaluate_entry(f64::NAN, 0.5);
        assert!(!permit);

        let (target, mode) = orc.calculate_cashout_target(f64::INFINITY);
        assert_eq!((target, mode), (2.0, CashoutMode::Default));

        let (stop, decision) =
            orc.process_round_result("bad", -3.0, dec!(-15), Some(CashoutMode::Default));
        assert!(!stop);
        assert!(decision.is_none());
        assert!(orc.history().is_empty());
        assert_eq!(orc.session_metrics().total_loss, Decimal::ZERO);
    }

    #[test]
    fn test_rules_disabled_permits_with_base_values() {
        let mut cfg = EngineConfig::default();
        cfg.session.rules_enabled = false;
        let mut orc = make_orchestrator(cfg);
        orc.process_round_result("r1", 50.0, Decimal::ZERO, None);

        let (permit, reason) = orc.evaluate_entry(2.0, 0.8);
        assert!(permit);
        assert_eq!(reason, "rules engine disabled");
        assert_eq!(orc.calculate_stake_for_bet(), (dec!(15), 0));
        assert!(!orc.status().enabled);
    }

    #[test]
    fn test_loss_limit_stops_session() {
        let mut cfg = EngineConfig::default();
        cfg.stop_conditions.early_abort.enabled = false;
        let mut orc = make_orchestrator(cfg);
        let (stop, decision) =
            orc.process_round_result("r1", 1.0, dec!(-40), Some(CashoutMode::Default));
        assert!(stop);
        assert_eq!(decision.unwrap().category, Some(StopCategory::LossLimit));
    }

    #[test]
    fn test_reset_session_keeps_history_and_stake() {
        let mut orc = make_orchestrator(EngineConfig::default());
        orc.calculate_stake_for_bet();
        orc.process_round_result("r1", 2.5, dec!(15), Some(CashoutMode::Default));
        orc.calculate_stake_for_bet();
        orc.process_round_result("r2", 1.0, dec!(-21), Some(CashoutMode::Default));
        orc.process_round_result("r3", 12.0, Decimal::ZERO, None);
        assert!(orc.status().cooldown.active);

        orc.reset_session();
        let status = orc.status();
        assert_eq!(status.session_profit, Decimal::ZERO);
        assert_eq!(status.session_loss, Decimal::ZERO);
        assert_eq!(status.consecutive_losses, 0);
        assert!(!status.cooldown.active);
        assert_eq!(status.stake, dec!(21.0));
        assert_eq!(orc.history().len(), 3);
    }

    #[test]
    fn test_regime_ttl_uses_injected_clock() {
        let clock = ManualClock::default();
        let mut orc = RulesOrchestrator::new(
            LiveConfig::fixed(EngineConfig::default()),
            Box::new(clock.clone()),
        );
        for (i, m) in [1.1, 1.2, 1.3, 1.4, 1.8].iter().enumerate() {
            orc.process_round_result(&format!("r{i}"), *m, Decimal::ZERO, None);
        }
        orc.evaluate_entry(2.0, 0.8);
        assert_eq!(orc.regime().regime, Regime::Tight);

        for i in 5..10 {
            orc.process_round_result(&format!("r{i}"), 3.0, Decimal::ZERO, None);
        }
        clock.advance(Duration::seconds(60));
        orc.evaluate_entry(2.0, 0.8);
        assert_eq!(orc.regime().regime, Regime::Tight);

        clock.advance(Duration::seconds(120));
        orc.evaluate_entry(2.0, 0.8);
        assert_ne!(orc.regime().regime, Regime::Tight);
    }

    #[test]
    fn test_status_display() {
        let orc = make_orchestrator(EngineConfig::default());
        let line = orc.status().to_string();
        assert!(line.starts_with("ENABLED"));
        assert!(line.contains("stake=15.00 L0"));
        assert!(line.contains("cooldown=off"));
    }

    #[test]
    fn test_play_helper_runs_full_rounds() {
        let mut orc = make_orchestrator(EngineConfig::default());
        for (i, m) in [2.4, 1.3, 2.2, 5.0, 1.9].iter().enumerate() {
            play(&mut orc, &format!("r{i}"), *m);
        }
        assert_eq!(orc.history().len(), 5);
        assert!(orc.session_metrics().rounds_played >= 1);
    }
}
