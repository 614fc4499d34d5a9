//! Feed replay with paper settlement.

use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;

use crashgate::config::{EngineConfig, LiveConfig};
use crashgate::engine::feed::parse_feed;
use crashgate::engine::replay::{ReplayDriver, ReplaySettings};
use crashgate::types::StopCategory;

const FEED: &str = r#"[
    {"round_id": "1", "predicted_multiplier": 2.1, "confidence": 0.7, "final_multiplier": 2.4, "timestamp": "2026-03-01T20:00:00Z"},
    {"round_id": "2", "predicted_multiplier": 2.0, "confidence": 0.6, "final_multiplier": 3.1, "timestamp": "2026-03-01T20:00:12Z"},
    {"round_id": "3", "predicted_multiplier": 2.2, "confidence": 0.7, "final_multiplier": 1.3, "timestamp": "2026-03-01T20:00:25Z"},
    {"round_id": "4", "predicted_multiplier": 1.9, "confidence": 0.5, "final_multiplier": 12.0, "timestamp": "2026-03-01T20:00:41Z"},
    {"round_id": "5", "predicted_multiplier": 2.0, "confidence": 0.6, "final_multiplier": 1.9, "timestamp": "2026-03-01T20:00:55Z"},
    {"round_id": "6", "predicted_multiplier": 2.0, "confidence": 0.6, "final_multiplier": 2.2, "timestamp": "2026-03-01T20:01:08Z"}
]"#;

fn start() -> DateTime<Utc> {
    "2026-03-01T20:00:00Z".parse().unwrap()
}

fn no_early_abort() -> LiveConfig {
    let mut cfg = EngineConfig::default();
    cfg.stop_conditions.early_abort.enabled = false;
    LiveConfig::fixed(cfg)
}

#[test]
fn test_replay_settles_and_skips() {
    let rounds = parse_feed(FEED).unwrap();
    let mut driver = ReplayDriver::new(
        no_early_abort(),
        ReplaySettings {
            starting_balance: Some(dec!(200)),
            ..ReplaySettings::default()
        },
        start(),
    );
    let reports: Vec<_> = rounds.iter().map(|r| driver.play_round(r)).collect();

    // 15 won at 2x, compounded 21 won at 2x, 29.4 lost at 1.3.
    assert_eq!(reports[0].settlement.as_ref().unwrap().pnl, dec!(15));
    assert_eq!(reports[1].settlement.as_ref().unwrap().stake, dec!(21.0));
    assert!(!reports[2].settlement.as_ref().unwrap().won());
    // After the 12x round the next two are vetoed.
    assert!(reports[3].permitted);
    assert!(!reports[4].permitted);
    assert!(!reports[5].permitted);

    let summary = driver.summary();
    assert_eq!(summary.rounds, 6);
    assert_eq!(summary.bets, 4);
    assert_eq!(summary.wins + summary.losses, summary.bets);
    assert_eq!(summary.balance, Some(dec!(200) + summary.net_pnl));
    assert_eq!(driver.orchestrator().history().len(), 6);
}

#[test]
fn test_replay_stops_on_profit_target() {
    let mut cfg = EngineConfig::default();
    cfg.stop_conditions.early_abort.enabled = false;
    cfg.stop_conditions.profit_target = Some(dec!(25));
    let rounds = parse_feed(FEED).unwrap();

    let mut driver = ReplayDriver::new(LiveConfig::fixed(cfg), ReplaySettings::default(), start());
    let summary = driver.run(&rounds);

    assert_eq!(summary.rounds, 2);
    let stop = summary.stop.unwrap();
    assert_eq!(stop.category, Some(StopCategory::ProfitTarget));
}

#[test]
fn test_replay_continues_past_stop_when_asked() {
    let mut cfg = EngineConfig::default();
    cfg.stop_conditions.profit_target = Some(dec!(25));
    let rounds = parse_feed(FEED).unwrap();

    let mut driver = ReplayDriver::new(
        LiveConfig::fixed(cfg),
        ReplaySettings {
            halt_on_stop: false,
            ..ReplaySettings::default()
        },
        start(),
    );
    let summary = driver.run(&rounds);
    assert_eq!(summary.rounds, 6);
    assert!(summary.stop.is_some());
}

#[test]
fn test_long_winning_run_keeps_betting() {
    let mut cfg = EngineConfig::default();
    cfg.stop_conditions.early_abort.enabled = false;
    let rounds: Vec<_> = (0..30)
        .map(|i| crashgate::engine::feed::FeedRound {
            round_id: format!("w{i}"),
            predicted_multiplier: 2.5,
            confidence: 0.8,
            final_multiplier: 2.5,
            timestamp: None,
        })
        .collect();

    let mut driver = ReplayDriver::new(
        LiveConfig::fixed(cfg),
        ReplaySettings {
            halt_on_stop: false,
            ..ReplaySettings::default()
        },
        start(),
    );
    let reports: Vec<_> = rounds.iter().map(|r| driver.play_round(r)).collect();

    let late_bets = reports[5..].iter().filter(|r| r.settlement.is_some()).count();
    assert!(late_bets >= 20, "only {late_bets} bets after the first cycle");
    assert!(reports
        .iter()
        .filter_map(|r| r.settlement.as_ref())
        .all(|s| s.stake <= dec!(60)));
}
