//! CRASHGATE: rules orchestration engine for round-based crash games
//!
//! Entry point. Loads configuration and a recorded round feed, then
//! replays the feed through the rules engine with paper settlement until
//! the feed runs out, a stop condition fires or Ctrl+C is pressed.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, warn};

use crashgate::clock::{Clock, SystemClock};
use crashgate::config::{LiveConfig, DEFAULT_CONFIG_FILE};
use crashgate::engine::feed;
use crashgate::engine::replay::{ReplayDriver, ReplaySettings, RoundReport};

const DEFAULT_LOG_FILTER: &str = "crashgate=info";

const BANNER: &str = r#"
  ___ ___    _   ___ _  _  ___   _ _____ ___
 / __| _ \  /_\ / __| || |/ __| /_\_   _| __|
| (__|   / / _ \\__ \ __ | (_ |/ _ \| | | _|
 \___|_|_\/_/ \_\___/_||_|\___/_/ \_\_| |___|

  Round rules engine · paper replay
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path =
        std::env::var("CRASHGATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let feed_path = std::env::args()
        .nth(1)
        .context("usage: crashgate <feed.json>")?;

    println!("{BANNER}");

    let live = LiveConfig::open(&config_path)?;
    let rounds = feed::load_feed(&feed_path)?;

    let tick_ms = env_parse::<u64>("CRASHGATE_TICK_MS").unwrap_or(0);
    let settings = ReplaySettings {
        starting_balance: env_parse::<Decimal>("CRASHGATE_BALANCE"),
        ..ReplaySettings::default()
    };

    let start = rounds
        .first()
        .and_then(|r| r.timestamp)
        .unwrap_or_else(|| SystemClock.now());
    let mut driver = ReplayDriver::new(live, settings, start);

    info!(
        config = %config_path,
        feed = %feed_path,
        rounds = rounds.len(),
        tick_ms,
        status = %driver.orchestrator().status(),
        "CRASHGATE starting replay"
    );

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut pending = rounds.iter();
    loop {
        tokio::select! {
            _ = interval.tick(), if tick_ms > 0 => {}
            _ = std::future::ready(()), if tick_ms == 0 => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }

        let Some(round) = pending.next() else {
            info!("Feed exhausted.");
            break;
        };
        let report = driver.play_round(round);
        log_round_report(&report);

        if driver.halted() {
            if let Some(stop) = &report.stop {
                warn!(reason = %stop.reason, category = ?stop.category, "Stop condition met, ending replay");
            }
            break;
        }
    }

    let summary = driver.summary();
    let metrics = driver.orchestrator().session_metrics();
    info!(
        summary = %summary,
        win_rate = format!("{:.1}%", metrics.win_rate()),
        max_stake = %metrics.max_stake,
        status = %summary.status,
        "CRASHGATE replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary.status)?);

    Ok(())
}

/// Log a one-line round summary.
fn log_round_report(report: &RoundReport) {
    match &report.settlement {
        Some(s) => info!(
            round_id = %report.round_id,
            stake = %s.stake,
            target = format!("{:.2}x", s.target),
            mode = %s.mode,
            result = format!("{:.2}x", s.final_multiplier),
            pnl = %s.pnl,
            "Bet settled"
        ),
        None => info!(round_id = %report.round_id, reason = %report.reason, "Round skipped"),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the default filter;
/// `CRASHGATE_LOG_JSON` switches the output to one JSON object per event.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (text, json) = if std::env::var_os("CRASHGATE_LOG_JSON").is_some() {
        (None, Some(fmt::layer().json().flatten_event(true)))
    } else {
        (Some(fmt::layer().with_target(true)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}
