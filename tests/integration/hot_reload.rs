//! Config edits on disk take effect at the next entry evaluation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crashgate::clock::ManualClock;
use crashgate::config::LiveConfig;
use crashgate::rules::RulesOrchestrator;
use crashgate::types::CashoutMode;

fn temp_path() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("crashgate_it_config_{}.toml", uuid::Uuid::new_v4()));
    p
}

fn rewrite(path: &Path, body: &str, bump_secs: u64) {
    fs::write(path, body).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(bump_secs))
        .unwrap();
}

fn orchestrator(path: &Path) -> RulesOrchestrator {
    let live = LiveConfig::open(path).unwrap();
    RulesOrchestrator::new(live, Box::new(ManualClock::new(Utc::now())))
}

#[test]
fn test_missing_config_is_created_with_defaults() {
    let path = temp_path();
    let orc = orchestrator(&path);
    assert!(path.exists());
    assert_eq!(orc.config().capital.start_bet, dec!(15));
    fs::remove_file(&path).unwrap();
}

#[test]
fn test_tightened_filter_applies_next_round() {
    let path = temp_path();
    let mut orc = orchestrator(&path);

    let (permit, _) = orc.evaluate_entry(2.0, 0.5);
    assert!(permit);
    orc.process_round_result("r1", 1.8, Decimal::ZERO, None);

    rewrite(&path, "[entry_filters.bet_only_if]\nmin_confidence = 0.9\n", 5);
    let (permit, reason) = orc.evaluate_entry(2.0, 0.5);
    assert!(!permit);
    assert!(!reason.is_empty());
    assert_eq!(orc.config().entry_filters.bet_only_if.min_confidence, 0.9);

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_disable_switch_takes_effect() {
    let path = temp_path();
    let mut orc = orchestrator(&path);
    orc.process_round_result("r1", 25.0, Decimal::ZERO, None);
    assert!(!orc.evaluate_entry(2.0, 0.8).0);

    rewrite(&path, "[session]\nrules_enabled = false\n", 5);
    let (permit, reason) = orc.evaluate_entry(2.0, 0.8);
    assert!(permit);
    assert_eq!(reason, "rules engine disabled");
    assert!(!orc.status().enabled);

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_broken_edit_keeps_previous_config() {
    let path = temp_path();
    let mut orc = orchestrator(&path);

    rewrite(&path, "[capital]\nstart_bet = 20\nmax_bet = 80\n", 5);
    orc.evaluate_entry(2.0, 0.8);
    assert_eq!(orc.config().capital.start_bet, dec!(20));

    rewrite(&path, "[capital\nstart_bet = ", 10);
    let (permit, _) = orc.evaluate_entry(2.0, 0.8);
    assert!(permit);
    assert_eq!(orc.config().capital.start_bet, dec!(20));
    let (stake, _) = orc.calculate_stake_for_bet();
    assert_eq!(stake, dec!(20));

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_outcomes_while_disabled_do_not_carry_over() {
    let path = temp_path();
    fs::write(&path, "[session]\nrules_enabled = false\n").unwrap();
    let mut orc = orchestrator(&path);

    assert!(orc.evaluate_entry(2.0, 0.8).0);
    let (stake, _) = orc.calculate_stake_for_bet();
    assert_eq!(stake, dec!(15));
    orc.process_round_result("r1", 2.5, dec!(15), Some(CashoutMode::Default));

    rewrite(&path, "[session]\nrules_enabled = true\n", 5);
    assert!(orc.evaluate_entry(2.0, 0.8).0);
    let (stake, level) = orc.calculate_stake_for_bet();
    assert_eq!(stake, dec!(15));
    assert_eq!(level, 0);

    fs::remove_file(&path).unwrap();
}
