// ⚙️ Settings - TOML file + FUND_TRACKER_* environment overrides
//
// Precedence: defaults < config file < environment.

use crate::ledger::{BudgetGate, FundLedger, DEFAULT_GATE_RATIO, DEFAULT_TOTAL_BUDGET};
use crate::rates::RateTable;
use crate::scoring::{AnomalyScorer, ScoringPolicy, DEFAULT_SPREAD_RATIO, DEFAULT_Z_THRESHOLD};
use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "FUND_TRACKER_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fixed fund for the session
    pub total_budget: f64,

    /// Market rates JSON. None = embedded defaults
    pub rates_path: Option<PathBuf>,

    pub z_threshold: f64,
    pub spread_ratio: f64,

    /// Hard gate multiplier on the market rate
    pub gate_ratio: f64,

    /// Per-category z thresholds
    pub category_thresholds: HashMap<String, f64>,

    /// HTTP listen address (server mode)
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            total_budget: DEFAULT_TOTAL_BUDGET,
            rates_path: None,
            z_threshold: DEFAULT_Z_THRESHOLD,
            spread_ratio: DEFAULT_SPREAD_RATIO,
            gate_ratio: DEFAULT_GATE_RATIO,
            category_thresholds: HashMap::new(),
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Settings {
    /// Load from an optional TOML file, then apply process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env(std::env::vars())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Settings::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).context("Failed to parse TOML")?;
        Ok(settings)
    }

    /// Apply `FUND_TRACKER_*` overrides from the given variables
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match name {
                "TOTAL_BUDGET" => self.total_budget = parse_number(&key, &value)?,
                "Z_THRESHOLD" => self.z_threshold = parse_number(&key, &value)?,
                "SPREAD_RATIO" => self.spread_ratio = parse_number(&key, &value)?,
                "GATE_RATIO" => self.gate_ratio = parse_number(&key, &value)?,
                "RATES_PATH" => self.rates_path = Some(PathBuf::from(value)),
                "BIND_ADDR" => self.bind_addr = value,
                _ => tracing::debug!(key = %key, "ignoring unknown setting"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("total_budget", self.total_budget),
            ("z_threshold", self.z_threshold),
            ("spread_ratio", self.spread_ratio),
            ("gate_ratio", self.gate_ratio),
        ] {
            if !value.is_finite() || value <= 0.0 {
                bail!("Invalid {}: {} (must be a positive number)", name, value);
            }
        }

        for (category, threshold) in &self.category_thresholds {
            if !threshold.is_finite() || *threshold <= 0.0 {
                bail!("Invalid threshold for {}: {}", category, threshold);
            }
        }

        Ok(())
    }

    pub fn scoring_policy(&self) -> ScoringPolicy {
        ScoringPolicy {
            z_threshold: self.z_threshold,
            spread_ratio: self.spread_ratio,
            category_thresholds: self.category_thresholds.clone(),
        }
    }

    /// Rate table per settings: file (degrading to empty) or embedded
    pub fn rate_table(&self) -> RateTable {
        match &self.rates_path {
            Some(path) => RateTable::load_or_empty(path),
            None => RateTable::embedded(),
        }
    }

    pub fn build_ledger(&self, rates: RateTable) -> Result<FundLedger> {
        FundLedger::with_checks(
            self.total_budget,
            rates,
            AnomalyScorer::with_policy(self.scoring_policy()),
            BudgetGate::new(self.gate_ratio),
        )
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("{} must be a number, got {:?}", key, value))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.total_budget, 50_000_000.0);
        assert_eq!(settings.z_threshold, 2.0);
        assert_eq!(settings.spread_ratio, 0.20);
        assert_eq!(settings.gate_ratio, 1.2);
        assert!(settings.rates_path.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            total_budget = 10000000
            rates_path = "data/market-rates.json"

            [category_thresholds]
            "School Building" = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(settings.total_budget, 10_000_000.0);
        assert_eq!(settings.rates_path, Some(PathBuf::from("data/market-rates.json")));
        assert_eq!(settings.gate_ratio, 1.2);
        assert_eq!(settings.category_thresholds.get("School Building"), Some(&2.5));
        assert_eq!(settings.scoring_policy().threshold_for("School Building"), 2.5);
        assert_eq!(settings.scoring_policy().threshold_for("Water Supply"), 2.0);
    }

    #[test]
    fn test_example_config_parses() {
        let settings = Settings::from_toml_str(include_str!("../fund-tracker.example.toml")).unwrap();

        assert_eq!(settings.total_budget, 50_000_000.0);
        assert_eq!(settings.rates_path, Some(PathBuf::from("data/market-rates.json")));
        assert!(settings.category_thresholds.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();

        settings
            .apply_env(env(&[
                ("FUND_TRACKER_TOTAL_BUDGET", "75000000"),
                ("FUND_TRACKER_GATE_RATIO", " 1.5 "),
                ("FUND_TRACKER_BIND_ADDR", "0.0.0.0:8080"),
                ("FUND_TRACKER_SOMETHING_ELSE", "x"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert_eq!(settings.total_budget, 75_000_000.0);
        assert_eq!(settings.gate_ratio, 1.5);
        assert_eq!(settings.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_env_rejects_non_numeric() {
        let mut settings = Settings::default();

        let result = settings.apply_env(env(&[("FUND_TRACKER_Z_THRESHOLD", "high")]));

        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        let mut settings = Settings::default();
        settings.total_budget = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.spread_ratio = -0.2;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings
            .category_thresholds
            .insert("Water Supply".to_string(), 0.0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_build_ledger_uses_settings() {
        let mut settings = Settings::default();
        settings.total_budget = 5_000_000.0;
        settings.gate_ratio = 2.0;

        let mut ledger = settings.build_ledger(settings.rate_table()).unwrap();

        assert_eq!(ledger.total_budget(), 5_000_000.0);
        assert!(ledger.record("K. Sen", 1_900_000.0, "Road Construction").is_ok());
    }
}
