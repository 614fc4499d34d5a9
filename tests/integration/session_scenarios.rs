//! Multi-round sessions through the five decision points.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crashgate::clock::ManualClock;
use crashgate::config::{EngineConfig, LiveConfig};
use crashgate::rules::RulesOrchestrator;
use crashgate::types::{CashoutMode, Regime, StopCategory, StopDecision};

struct Session {
    orc: RulesOrchestrator,
    clock: ManualClock,
    next_id: u32,
}

impl Session {
    fn new(config: EngineConfig) -> Self {
        let clock = ManualClock::new(Utc::now());
        let orc = RulesOrchestrator::new(LiveConfig::fixed(config), Box::new(clock.clone()));
        Self { orc, clock, next_id: 0 }
    }

    /// Play one round 10s after the previous one. Returns whether a bet was
    /// placed, its stake and mode, and any stop signal.
    fn round(
        &mut self,
        final_multiplier: f64,
    ) -> (bool, Decimal, Option<CashoutMode>, Option<StopDecision>) {
        self.clock.advance(Duration::seconds(10));
        self.next_id += 1;
        let id = format!("r{}", self.next_id);

        let (permit, _) = self.orc.evaluate_entry(2.0, 0.8);
        if !permit {
            let (_, stop) = self.orc.process_round_result(&id, final_multiplier, Decimal::ZERO, None);
            return (false, Decimal::ZERO, None, stop);
        }
        let (stake, _) = self.orc.calculate_stake_for_bet();
        let (target, mode) = self.orc.calculate_cashout_target(2.0);
        let pnl = if final_multiplier >= target {
            (stake * Decimal::try_from(target - 1.0).unwrap()).round_dp(2)
        } else {
            -stake
        };
        let (_, stop) = self.orc.process_round_result(&id, final_multiplier, pnl, Some(mode));
        (true, stake, Some(mode), stop)
    }
}

fn quiet_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.stop_conditions.early_abort.enabled = false;
    cfg
}

#[test]
fn test_win_compounds_then_loss_retreats() {
    let mut s = Session::new(quiet_config());

    let (bet, stake, mode, _) = s.round(2.5);
    assert!(bet);
    assert_eq!(stake, dec!(15));
    assert_eq!(mode, Some(CashoutMode::Default));

    let (bet, stake, _, _) = s.round(1.2);
    assert!(bet);
    assert_eq!(stake, dec!(21.0));
    assert_eq!(s.orc.status().compound_level, 1);

    let (_, stake, _, _) = s.round(2.5);
    assert_eq!(stake, dec!(15));
    assert_eq!(s.orc.status().compound_level, 0);
}

#[test]
fn test_high_multiplier_blocks_following_rounds() {
    let mut s = Session::new(quiet_config());

    assert!(s.round(14.0).0);
    assert!(s.orc.status().cooldown.active);

    assert!(!s.round(2.0).0);
    assert!(!s.round(2.0).0);
    assert!(s.round(2.0).0);
    assert!(!s.orc.status().cooldown.active);
}

#[test]
fn test_loss_limit_stops_session() {
    let mut cfg = quiet_config();
    cfg.cooldowns.after_consecutive_losses.enabled = false;
    let mut s = Session::new(cfg);

    let mut stop = None;
    for _ in 0..10 {
        let (_, _, _, signal) = s.round(1.05);
        if signal.is_some() {
            stop = signal;
            break;
        }
    }
    let stop = stop.expect("session should stop on losses");
    assert_eq!(stop.category, Some(StopCategory::LossLimit));
    assert!(s.orc.session_metrics().total_loss >= dec!(40));
}

#[test]
fn test_defensive_mode_after_losses() {
    let mut cfg = quiet_config();
    cfg.cooldowns.after_consecutive_losses.enabled = false;
    let mut s = Session::new(cfg);

    s.round(1.1);
    s.round(1.1);
    // 30 lost so far, past the 25 defensive trigger.
    let (bet, _, mode, _) = s.round(1.8);
    assert!(bet);
    assert_eq!(mode, Some(CashoutMode::Defensive));
}

#[test]
fn test_regime_forms_after_enough_rounds() {
    let mut s = Session::new(quiet_config());
    for m in [1.2, 1.3, 1.1, 1.6, 1.4] {
        s.round(m);
    }
    s.orc.evaluate_entry(2.0, 0.8);
    assert_eq!(s.orc.regime().regime, Regime::Tight);
    assert!(s.orc.regime().confidence > 0.5);
}

#[test]
fn test_time_limit_and_reset() {
    let mut s = Session::new(quiet_config());
    s.round(2.5);
    s.clock.advance(Duration::minutes(31));
    let (_, _, _, stop) = s.round(2.5);
    assert_eq!(stop.and_then(|d| d.category), Some(StopCategory::TimeLimit));

    s.orc.reset_session();
    assert_eq!(s.orc.session_metrics().rounds_played, 0);
    let (_, _, _, stop) = s.round(2.5);
    assert!(stop.is_none());
}

#[test]
fn test_disabled_engine_uses_base_values() {
    let mut cfg = quiet_config();
    cfg.session.rules_enabled = false;
    let mut s = Session::new(cfg);

    s.round(2.5);
    // Previous 2.5 win would normally compound; disabled keeps the base.
    let (bet, stake, mode, _) = s.round(50.0);
    assert!(bet);
    assert_eq!(stake, dec!(15));
    assert_eq!(mode, Some(CashoutMode::Default));
    let (bet, _, _, _) = s.round(2.0);
    assert!(bet);
}

#[test]
fn test_full_compounding_cycle_resumes_play() {
    let mut s = Session::new(quiet_config());

    let stakes: Vec<Decimal> = (0..4).map(|_| s.round(2.5).1).collect();
    assert_eq!(stakes, vec![dec!(15), dec!(21), dec!(29.4), dec!(41.16)]);
    let status = s.orc.status();
    assert_eq!(status.compound_level, 3);
    assert!(status.cooldown.active);

    // Max level and the max-compound cooldown veto the next round, which
    // releases the level back to base.
    let (bet, _, _, _) = s.round(2.5);
    assert!(!bet);
    let status = s.orc.status();
    assert_eq!(status.compound_level, 0);
    assert_eq!(status.stake, dec!(15));
    assert!(!status.cooldown.active);

    let (bet, stake, _, _) = s.round(2.5);
    assert!(bet);
    assert_eq!(stake, dec!(15));
    let (bet, stake, _, _) = s.round(2.5);
    assert!(bet);
    assert_eq!(stake, dec!(21));
}

#[test]
fn test_level_veto_below_max_does_not_lock_out() {
    let mut cfg = quiet_config();
    cfg.entry_filters.do_not_bet_if.compound_level_at_least = 2;
    let mut s = Session::new(cfg);

    assert!(s.round(2.5).0);
    assert!(s.round(2.5).0);
    assert_eq!(s.orc.status().compound_level, 1);
    assert!(s.round(2.5).0);
    assert_eq!(s.orc.status().compound_level, 2);

    assert!(!s.round(2.5).0);
    assert_eq!(s.orc.status().compound_level, 0);
    assert!(s.round(2.5).0);
}
