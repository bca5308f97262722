// 🚨 Anomaly Scoring - z-score against the market rate
// Advisory check: flags amounts far from the category's expected spend.
//
// The spread is a fixed fraction of the expected amount (20% by default),
// standing in for a real standard deviation. This is a known simplification.
//
// The threshold test uses the unrounded z-score; only the reported value is
// rounded to 2 decimal places, so results never flap at the boundary.

use crate::rates::RateTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;
pub const DEFAULT_SPREAD_RATIO: f64 = 0.20;

pub const MSG_HIGHER: &str = "Warning: Amount significantly higher than market rate!";
pub const MSG_LOWER: &str = "Warning: Amount significantly lower than market rate!";
pub const MSG_NORMAL: &str = "Transaction appears normal";
pub const MSG_UNKNOWN: &str = "Unknown project type";

// ============================================================================
// SCORE RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Higher,
    Lower,
    Normal,
    UnknownCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub is_anomalous: bool,

    /// Rounded to 2 decimal places (display only)
    pub z_score: f64,

    /// Market rate used as the baseline (0 when the category is unknown)
    pub expected_amount: f64,

    /// Percentage above (+) or below (-) the market rate, 2 decimal places
    pub deviation_pct: f64,

    pub direction: Direction,
    pub message: String,
}

impl ScoreResult {
    fn unknown_category() -> Self {
        ScoreResult {
            is_anomalous: false,
            z_score: 0.0,
            expected_amount: 0.0,
            deviation_pct: 0.0,
            direction: Direction::UnknownCategory,
            message: MSG_UNKNOWN.to_string(),
        }
    }

    pub fn is_unknown_category(&self) -> bool {
        self.direction == Direction::UnknownCategory
    }
}

// ============================================================================
// SCORING POLICY
// ============================================================================

/// Threshold and spread settings, with optional per-category thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    #[serde(default = "default_threshold")]
    pub z_threshold: f64,

    #[serde(default = "default_spread_ratio")]
    pub spread_ratio: f64,

    /// Category-specific thresholds override `z_threshold`
    #[serde(default)]
    pub category_thresholds: HashMap<String, f64>,
}

fn default_threshold() -> f64 {
    DEFAULT_Z_THRESHOLD
}

fn default_spread_ratio() -> f64 {
    DEFAULT_SPREAD_RATIO
}

impl ScoringPolicy {
    pub fn threshold_for(&self, category: &str) -> f64 {
        self.category_thresholds
            .get(category)
            .copied()
            .unwrap_or(self.z_threshold)
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        ScoringPolicy {
            z_threshold: DEFAULT_Z_THRESHOLD,
            spread_ratio: DEFAULT_SPREAD_RATIO,
            category_thresholds: HashMap::new(),
        }
    }
}

// ============================================================================
// ANOMALY SCORER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AnomalyScorer {
    policy: ScoringPolicy,
}

impl AnomalyScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ScoringPolicy) -> Self {
        AnomalyScorer { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Unrounded z-score, or None when the category has no market rate
    pub fn z_score(&self, rates: &RateTable, amount: f64, category: &str) -> Option<f64> {
        let expected = rates.expected_amount(category)?;
        let spread = expected * self.policy.spread_ratio;
        Some((amount - expected) / spread)
    }

    /// Classify an amount against its category's market rate
    pub fn score(&self, rates: &RateTable, amount: f64, category: &str) -> ScoreResult {
        let expected = match rates.expected_amount(category) {
            Some(expected) => expected,
            None => {
                tracing::debug!(category, "scoring skipped: unknown project type");
                return ScoreResult::unknown_category();
            }
        };

        let spread = expected * self.policy.spread_ratio;
        let z = (amount - expected) / spread;
        let is_anomalous = z.abs() > self.policy.threshold_for(category);

        let direction = match (is_anomalous, amount > expected) {
            (false, _) => Direction::Normal,
            (true, true) => Direction::Higher,
            (true, false) => Direction::Lower,
        };

        let message = match direction {
            Direction::Higher => MSG_HIGHER,
            Direction::Lower => MSG_LOWER,
            _ => MSG_NORMAL,
        };

        if is_anomalous {
            tracing::info!(category, amount, expected, z_score = z, "anomalous amount");
        }

        ScoreResult {
            is_anomalous,
            z_score: round2(z),
            expected_amount: expected,
            deviation_pct: round2((amount - expected) / expected * 100.0),
            direction,
            message: message.to_string(),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// TESTS
// ============================================================================
