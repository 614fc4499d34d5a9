//! Configuration loading from TOML with hot-reload support.
//!
//! Reads `crashgate.toml` and deserializes into strongly-typed structs,
//! one per option group. Every group is `#[serde(default)]`, so a partial
//! document fills the gaps from the documented defaults. A missing file
//! is created from those defaults.
//!
//! [`LiveConfig`] watches the file's modification time and swaps in a
//! freshly parsed config atomically. A broken edit never replaces the
//! last good config.

use anyhow::{ensure, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{error, info, warn};

use crate::types::Regime;

/// Default config file path.
pub const DEFAULT_CONFIG_FILE: &str = "crashgate.toml";

const DEFAULT_HEADER: &str = "# CRASHGATE rule configuration.\n\
# Edited values are picked up at the start of the next entry evaluation.\n\n";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub session: SessionConfig,
    pub capital: CapitalConfig,
    pub stake_compounding: StakeCompoundingConfig,
    pub cashout: CashoutConfig,
    pub entry_filters: EntryFiltersConfig,
    pub cooldowns: CooldownsConfig,
    pub regime_model: RegimeModelConfig,
    pub regime_thresholds: RegimeThresholds,
    pub stop_conditions: StopConditionsConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Session & capital
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Master switch. When off, entry is always permitted and stake/cashout
    /// fall back to base values.
    pub rules_enabled: bool,
    pub duration_minutes: u64,
    pub profit_target: Decimal,
    pub max_loss: Decimal,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rules_enabled: true,
            duration_minutes: 30,
            profit_target: dec!(50),
            max_loss: dec!(40),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalConfig {
    /// Entry is vetoed once a reported balance drops below this.
    pub min_balance: Decimal,
    /// Below this a warning is logged, play continues.
    pub preferred_balance: Decimal,
    /// Base stake for compounding.
    pub start_bet: Decimal,
    /// Stake ceiling.
    pub max_bet: Decimal,
}

impl Default for CapitalConfig {
    fn default() -> Self {
        Self {
            min_balance: dec!(50),
            preferred_balance: dec!(200),
            start_bet: dec!(15),
            max_bet: dec!(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakeCompoundingConfig {
    pub enabled: bool,
    pub win_multiplier: Decimal,
    pub loss_divisor: Decimal,
    pub max_steps: u32,
    /// A previous round at or above this multiplier forces a stake reset.
    pub reset_on_high_mult: f64,
    /// Consecutive losses that force a reset (while stake >= floor).
    pub reset_after_losses: u32,
    pub reset_loss_stake_floor: Decimal,
}

impl Default for StakeCompoundingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            win_multiplier: dec!(1.4),
            loss_divisor: dec!(1.4),
            max_steps: 3,
            reset_on_high_mult: 10.0,
            reset_after_losses: 2,
            reset_loss_stake_floor: dec!(25),
        }
    }
}

// ---------------------------------------------------------------------------
// Cashout
// ---------------------------------------------------------------------------

/// `auto` runs the priority chain, anything else pins that mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashoutModeSetting {
    Auto,
    Default,
    Defensive,
    Aggressive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CashoutConfig {
    pub mode: CashoutModeSetting,
    #[serde(rename = "default")]
    pub standard: StandardCashout,
    pub defensive: DefensiveCashout,
    pub aggressive: AggressiveCashout,
}

impl Default for CashoutConfig {
    fn default() -> Self {
        Self {
            mode: CashoutModeSetting::Auto,
            standard: StandardCashout::default(),
            defensive: DefensiveCashout::default(),
            aggressive: AggressiveCashout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardCashout {
    pub multiplier: f64,
}

impl Default for StandardCashout {
    fn default() -> Self {
        Self { multiplier: 2.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefensiveCashout {
    pub multiplier: f64,
    /// Session loss at which defensive mode kicks in.
    pub trigger_loss: Decimal,
}

impl Default for DefensiveCashout {
    fn default() -> Self {
        Self {
            multiplier: 1.5,
            trigger_loss: dec!(25),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggressiveCashout {
    pub multiplier: f64,
    pub min_profit: Decimal,
    pub require_regime: Regime,
    /// Aggressive mode may fire once per window of this many minutes.
    pub window_duration_min: u64,
}

impl Default for AggressiveCashout {
    fn default() -> Self {
        Self {
            multiplier: 3.0,
            min_profit: dec!(30),
            require_regime: Regime::Loose,
            window_duration_min: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry filters & cooldowns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryFiltersConfig {
    pub do_not_bet_if: DoNotBetIf,
    pub bet_only_if: BetOnlyIf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoNotBetIf {
    pub prev_mult_at_least: f64,
    /// Veto when any of the last three rounds reached this.
    pub any_last3_at_least: f64,
    pub compound_level_at_least: u32,
    pub during_cooldown: bool,
}

impl Default for DoNotBetIf {
    fn default() -> Self {
        Self {
            prev_mult_at_least: 10.0,
            any_last3_at_least: 20.0,
            compound_level_at_least: 3,
            during_cooldown: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetOnlyIf {
    pub prev_mult_min: f64,
    pub prev_mult_max: f64,
    pub allow_volatile: bool,
    /// 0 disables the gate.
    pub min_confidence: f64,
    /// 0 disables the gate.
    pub min_predicted_multiplier: f64,
}

impl Default for BetOnlyIf {
    fn default() -> Self {
        Self {
            prev_mult_min: 1.0,
            prev_mult_max: 8.0,
            allow_volatile: false,
            min_confidence: 0.0,
            min_predicted_multiplier: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownsConfig {
    pub after_high_mult: HighMultCooldown,
    pub after_consecutive_losses: LossStreakCooldown,
    pub after_max_compound: MaxCompoundCooldown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighMultCooldown {
    pub enabled: bool,
    pub threshold: f64,
    pub skip_rounds: u32,
}

impl Default for HighMultCooldown {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 10.0,
            skip_rounds: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossStreakCooldown {
    pub enabled: bool,
    pub count: u32,
    pub min_stake: Decimal,
    pub skip_rounds: u32,
}

impl Default for LossStreakCooldown {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 3,
            min_stake: dec!(25),
            skip_rounds: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxCompoundCooldown {
    pub enabled: bool,
    pub skip_rounds: u32,
}

impl Default for MaxCompoundCooldown {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_rounds: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Regime model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeModelConfig {
    pub enabled: bool,
    /// Capacity of the round cache. Read once at engine construction.
    pub evaluation_window_rounds: usize,
    pub cache_duration_seconds: u64,
}

impl Default for RegimeModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            evaluation_window_rounds: 10,
            cache_duration_seconds: 180,
        }
    }
}

/// Percentages are expressed 0–100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    #[serde(rename = "TIGHT")]
    pub tight: TightThresholds,
    #[serde(rename = "NORMAL")]
    pub normal: NormalThresholds,
    #[serde(rename = "LOOSE")]
    pub loose: LooseThresholds,
    #[serde(rename = "VOLATILE")]
    pub volatile: VolatileThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TightThresholds {
    pub median_max: f64,
    pub pct_below_1_5_min: f64,
}

impl Default for TightThresholds {
    fn default() -> Self {
        Self {
            median_max: 2.0,
            pct_below_1_5_min: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalThresholds {
    pub median_min: f64,
    pub median_max: f64,
}

impl Default for NormalThresholds {
    fn default() -> Self {
        Self {
            median_min: 2.0,
            median_max: 2.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LooseThresholds {
    pub median_min: f64,
}

impl Default for LooseThresholds {
    fn default() -> Self {
        Self { median_min: 2.8 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatileThresholds {
    pub median_min: f64,
    pub high_tail_pct_min: f64,
}

impl Default for VolatileThresholds {
    fn default() -> Self {
        Self {
            median_min: 3.5,
            high_tail_pct_min: 20.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Stop conditions & logging
// ---------------------------------------------------------------------------

/// Unset limits fall back to the `session` group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopConditionsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_target: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_loss: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u64>,
    pub early_abort: EarlyAbortConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyAbortConfig {
    pub enabled: bool,
    /// Length of session window 0; early-abort checks only run inside it.
    pub window_minutes: u64,
    pub loss_threshold: Decimal,
    pub max_aggressive_failures: u32,
    pub high_mult_count: usize,
}

impl Default for EarlyAbortConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_minutes: 15,
            loss_threshold: dec!(20),
            max_aggressive_failures: 2,
            high_mult_count: 2,
        }
    }
}

/// Flags promote the matching decision events from `debug` to `info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_entry_decisions: bool,
    pub log_regime: bool,
    pub log_stake: bool,
    pub log_cashout: bool,
    pub log_cooldowns: bool,
    pub log_session: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_entry_decisions: true,
            log_regime: true,
            log_stake: true,
            log_cashout: true,
            log_cooldowns: true,
            log_session: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(contents).context("Failed to parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load the file, writing the default document first if it is missing.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let defaults = EngineConfig::default();
            defaults.write_to(path)?;
            info!(path = %path.display(), "No config found, wrote defaults");
            return Ok(defaults);
        }
        Self::load(path)
    }

    /// Serialize this config as a TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        let body = toml::to_string_pretty(self).context("Failed to serialise engine config")?;
        Ok(format!("{DEFAULT_HEADER}{body}"))
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Reject configurations the rules cannot operate on.
    pub fn validate(&self) -> Result<()> {
        let cap = &self.capital;
        ensure!(cap.start_bet > Decimal::ZERO, "capital.start_bet must be positive");
        ensure!(
            cap.max_bet >= cap.start_bet,
            "capital.max_bet ({}) must be >= start_bet ({})",
            cap.max_bet,
            cap.start_bet
        );
        ensure!(cap.min_balance >= Decimal::ZERO, "capital.min_balance must be >= 0");

        let sc = &self.stake_compounding;
        ensure!(sc.win_multiplier >= Decimal::ONE, "stake_compounding.win_multiplier must be >= 1");
        ensure!(sc.loss_divisor >= Decimal::ONE, "stake_compounding.loss_divisor must be >= 1");

        let co = &self.cashout;
        for (name, m) in [
            ("cashout.default.multiplier", co.standard.multiplier),
            ("cashout.defensive.multiplier", co.defensive.multiplier),
            ("cashout.aggressive.multiplier", co.aggressive.multiplier),
        ] {
            ensure!(m.is_finite() && m > 1.0, "{name} must be > 1.0, got {m}");
        }
        ensure!(
            co.aggressive.window_duration_min > 0,
            "cashout.aggressive.window_duration_min must be positive"
        );

        let band = &self.entry_filters.bet_only_if;
        ensure!(
            band.prev_mult_min <= band.prev_mult_max,
            "entry_filters.bet_only_if.prev_mult_min must be <= prev_mult_max"
        );

        ensure!(
            self.regime_model.evaluation_window_rounds > 0,
            "regime_model.evaluation_window_rounds must be positive"
        );
        let rt = &self.regime_thresholds;
        ensure!(
            rt.normal.median_min <= rt.normal.median_max,
            "regime_thresholds.NORMAL.median_min must be <= median_max"
        );
        for (name, pct) in [
            ("TIGHT.pct_below_1_5_min", rt.tight.pct_below_1_5_min),
            ("VOLATILE.high_tail_pct_min", rt.volatile.high_tail_pct_min),
        ] {
            ensure!((0.0..=100.0).contains(&pct), "regime_thresholds.{name} must be within 0..=100");
        }

        ensure!(
            self.stop_conditions.early_abort.window_minutes > 0,
            "stop_conditions.early_abort.window_minutes must be positive"
        );
        Ok(())
    }

    /// Effective profit target (stop_conditions, else session).
    pub fn profit_target(&self) -> Decimal {
        self.stop_conditions
            .profit_target
            .unwrap_or(self.session.profit_target)
    }

    pub fn max_loss(&self) -> Decimal {
        self.stop_conditions.max_loss.unwrap_or(self.session.max_loss)
    }

    pub fn duration_minutes(&self) -> u64 {
        self.stop_conditions
            .duration_minutes
            .unwrap_or(self.session.duration_minutes)
    }
}

// ---------------------------------------------------------------------------
// Hot reload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged,
    Reloaded,
    /// The file changed but could not be used; the previous config stays live.
    Failed(String),
}

/// File-backed config with modification-time reload detection.
///
/// Readers take an `Arc` snapshot; a reload swaps the whole structure, so a
/// decision in progress never sees half-updated thresholds.
#[derive(Debug)]
pub struct LiveConfig {
    path: Option<PathBuf>,
    current: Arc<EngineConfig>,
    last_modified: Option<SystemTime>,
}

impl LiveConfig {
    /// Load (or create) the config file and remember its modification time.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = EngineConfig::load_or_create(&path)?;
        let last_modified = modified_time(&path).ok();
        info!(path = %path.display(), "Engine config loaded");
        Ok(Self {
            path: Some(path),
            current: Arc::new(config),
            last_modified,
        })
    }

    /// An in-memory config that never reloads.
    pub fn fixed(config: EngineConfig) -> Self {
        Self {
            path: None,
            current: Arc::new(config),
            last_modified: None,
        }
    }

    pub fn current(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.current)
    }

    pub fn get(&self) -> &EngineConfig {
        &self.current
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the file if its modification time moved.
    pub fn check_reload(&mut self) -> ReloadOutcome {
        let Some(path) = self.path.clone() else {
            return ReloadOutcome::Unchanged;
        };

        let modified = match modified_time(&path) {
            Ok(m) => m,
            Err(e) => {
                // Only report the first failure until the file comes back.
                if self.last_modified.take().is_some() {
                    warn!(path = %path.display(), error = %e, "Config file unavailable, keeping current config");
                    return ReloadOutcome::Failed(e.to_string());
                }
                return ReloadOutcome::Unchanged;
            }
        };

        if self.last_modified == Some(modified) {
            return ReloadOutcome::Unchanged;
        }
        self.last_modified = Some(modified);

        match EngineConfig::load(&path) {
            Ok(config) => {
                self.current = Arc::new(config);
                info!(path = %path.display(), "Engine config reloaded");
                ReloadOutcome::Reloaded
            }
            Err(e) => {
                error!(path = %path.display(), error = %format!("{e:#}"), "Config reload failed, keeping last good config");
                ReloadOutcome::Failed(format!("{e:#}"))
            }
        }
    }
}

fn modified_time(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to stat config file: {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
