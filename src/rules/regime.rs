//! Market regime detection.
//!
//! Summarises the cached round window into [`RegimeFeatures`] and
//! classifies it as TIGHT / NORMAL / LOOSE / VOLATILE. Rules are a tagged
//! list evaluated in fixed priority order; the first match wins and NORMAL
//! is the fallback.
//!
//! A classification is reused until its TTL elapses, even if new rounds
//! arrived in the meantime.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::history::HistoricalCache;
use super::seconds;
use crate::config::{RegimeModelConfig, RegimeThresholds};
use crate::types::Regime;

/// Fewer cached rounds than this and we don't classify.
pub const MIN_SAMPLES: usize = 5;
/// Multipliers strictly below this count as "low".
pub const LOW_MULT: f64 = 1.5;
/// Multipliers at or above this count towards the high tail.
pub const HIGH_TAIL_MULT: f64 = 10.0;

pub const INSUFFICIENT_DATA_CONFIDENCE: f64 = 0.30;
pub const NORMAL_CONFIDENCE: f64 = 0.85;

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// Summary statistics over the cache window. Percentages are 0–100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeFeatures {
    pub median: f64,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub pct_below_1_5: f64,
    pub high_tail_pct: f64,
    pub min: f64,
    pub max: f64,
}

impl RegimeFeatures {
    /// Compute features over `samples`. An empty slice yields all zeros.
    pub fn compute(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let low = samples.iter().filter(|&&x| x < LOW_MULT).count() as f64;
        let high = samples.iter().filter(|&&x| x >= HIGH_TAIL_MULT).count() as f64;

        Self {
            median,
            mean,
            variance,
            std_dev: variance.sqrt(),
            pct_below_1_5: low / n * 100.0,
            high_tail_pct: high / n * 100.0,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A named classification rule with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum RegimeRule {
    Tight { median_max: f64, pct_below_min: f64 },
    Volatile { median_min: f64, high_tail_min: f64 },
    Loose { median_min: f64 },
}

impl RegimeRule {
    /// Rules in evaluation order.
    pub fn ordered(thresholds: &RegimeThresholds) -> [RegimeRule; 3] {
        [
            RegimeRule::Tight {
                median_max: thresholds.tight.median_max,
                pct_below_min: thresholds.tight.pct_below_1_5_min,
            },
            RegimeRule::Volatile {
                median_min: thresholds.volatile.median_min,
                high_tail_min: thresholds.volatile.high_tail_pct_min,
            },
            RegimeRule::Loose {
                median_min: thresholds.loose.median_min,
            },
        ]
    }

    pub fn matches(&self, f: &RegimeFeatures) -> bool {
        match *self {
            RegimeRule::Tight { median_max, pct_below_min } => {
                f.median <= median_max && f.pct_below_1_5 >= pct_below_min
            }
            RegimeRule::Volatile { median_min, high_tail_min } => {
                f.median >= median_min || f.high_tail_pct >= high_tail_min
            }
            RegimeRule::Loose { median_min } => f.median >= median_min,
        }
    }

    pub fn regime(&self) -> Regime {
        match self {
            RegimeRule::Tight { .. } => Regime::Tight,
            RegimeRule::Volatile { .. } => Regime::Volatile,
            RegimeRule::Loose { .. } => Regime::Loose,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            RegimeRule::Tight { .. } => 0.80,
            RegimeRule::Volatile { .. } => 0.75,
            RegimeRule::Loose { .. } => 0.80,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeClassification {
    pub regime: Regime,
    pub confidence: f64,
    pub features: RegimeFeatures,
    pub evaluated_at: DateTime<Utc>,
    /// Rounds analysed (0 when there was not enough data).
    pub samples: usize,
}

impl RegimeClassification {
    /// Low-confidence NORMAL used when the window is too small.
    pub fn insufficient(now: DateTime<Utc>) -> Self {
        Self {
            regime: Regime::Normal,
            confidence: INSUFFICIENT_DATA_CONFIDENCE,
            features: RegimeFeatures::default(),
            evaluated_at: now,
            samples: 0,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.evaluated_at < ttl
    }
}

/// Classify a sample set. Deterministic for a fixed input.
pub fn classify(
    samples: &[f64],
    thresholds: &RegimeThresholds,
    now: DateTime<Utc>,
) -> RegimeClassification {
    if samples.len() < MIN_SAMPLES {
        return RegimeClassification::insufficient(now);
    }

    let features = RegimeFeatures::compute(samples);
    let (regime, confidence) = RegimeRule::ordered(thresholds)
        .iter()
        .find(|rule| rule.matches(&features))
        .map(|rule| (rule.regime(), rule.confidence()))
        .unwrap_or((Regime::Normal, NORMAL_CONFIDENCE));

    RegimeClassification {
        regime,
        confidence,
        features,
        evaluated_at: now,
        samples: samples.len(),
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Regime classifier with a time-to-live cache.
#[derive(Debug, Clone, Default)]
pub struct RegimeDetector {
    cached: Option<RegimeClassification>,
}

impl RegimeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached classification while fresh, otherwise reclassify
    /// the full cache window.
    pub fn detect(
        &mut self,
        cache: &HistoricalCache,
        model: &RegimeModelConfig,
        thresholds: &RegimeThresholds,
        now: DateTime<Utc>,
    ) -> RegimeClassification {
        if !model.enabled {
            return RegimeClassification::insufficient(now);
        }

        let ttl = seconds(model.cache_duration_seconds);
        if let Some(cached) = &self.cached {
            if cached.is_fresh(now, ttl) {
                return cached.clone();
            }
        }

        let samples = cache.multipliers();
        let result = classify(&samples, thresholds, now);
        if result.samples == 0 {
            // Not cached: the first sufficient window classifies immediately.
            debug!(samples = samples.len(), "Not enough rounds to classify regime");
            return result;
        }

        debug!(
            regime = %result.regime,
            confidence = result.confidence,
            median = format!("{:.2}", result.features.median),
            pct_below_1_5 = format!("{:.0}%", result.features.pct_below_1_5),
            high_tail = format!("{:.0}%", result.features.high_tail_pct),
            in_normal_band = result.features.median >= thresholds.normal.median_min
                && result.features.median <= thresholds.normal.median_max,
            "Regime reclassified"
        );
        self.cached = Some(result.clone());
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
