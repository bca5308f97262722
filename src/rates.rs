// 💹 Market Rate Table - expected spend per project category
// The scoring baseline: what a "normal" amount looks like for each category
//
// Loaded once (embedded defaults or a JSON file), then read-only.
// A failed load never crashes anything: the table comes back empty and
// every lookup reports "unknown category".

use anyhow::{anyhow, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// LOAD STATUS
// ============================================================================

/// Where the table came from, and whether it can be trusted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    /// Nothing loaded yet (lookups all miss)
    NotLoaded,

    /// Built-in defaults
    Embedded,

    /// Loaded from an external resource
    Loaded { source: String, entries: usize },

    /// Load attempted and failed, table is empty
    Failed { source: String, reason: String },
}

impl LoadStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadStatus::Embedded | LoadStatus::Loaded { .. })
    }
}

// ============================================================================
// RATE TABLE
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RateTable {
    rates: BTreeMap<String, f64>,
    status: LoadStatus,
}

impl RateTable {
    /// Empty table, nothing loaded
    pub fn empty() -> Self {
        RateTable {
            rates: BTreeMap::new(),
            status: LoadStatus::NotLoaded,
        }
    }

    /// Built-in market rates for the known project categories
    pub fn embedded() -> Self {
        let rates = [
            ("Road Construction", 1_000_000.0),
            ("School Building", 2_000_000.0),
            ("Hospital Equipment", 1_500_000.0),
            ("Water Supply", 800_000.0),
            ("Park Development", 500_000.0),
        ]
        .into_iter()
        .map(|(name, rate)| (name.to_string(), rate))
        .collect();

        RateTable {
            rates,
            status: LoadStatus::Embedded,
        }
    }

    /// Build from explicit pairs. Non-positive or non-finite rates are skipped.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut rates = BTreeMap::new();
        for (name, rate) in entries {
            let name = name.into();
            if is_valid_rate(rate) {
                rates.insert(name, rate);
            } else {
                tracing::warn!(category = %name, rate, "skipping non-positive market rate");
            }
        }

        let entries = rates.len();
        RateTable {
            rates,
            status: LoadStatus::Loaded {
                source: "inline".to_string(),
                entries,
            },
        }
    }

    /// Parse `{ "<category>": <number>, ... }`
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(content).context("Failed to parse market rates JSON")?;

        let mut rates = BTreeMap::new();
        for (name, value) in raw {
            match value.as_f64() {
                Some(rate) if is_valid_rate(rate) => {
                    rates.insert(name, rate);
                }
                _ => {
                    tracing::warn!(category = %name, value = %value, "skipping invalid market rate");
                }
            }
        }

        let entries = rates.len();
        Ok(RateTable {
            rates,
            status: LoadStatus::Loaded {
                source: "json".to_string(),
                entries,
            },
        })
    }

    /// Load rates from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read market rates file: {:?}", path))?;

        let mut table = RateTable::from_json_str(&content)?;
        if table.is_empty() {
            return Err(anyhow!("Market rates file {:?} has no usable entries", path));
        }
        table.status = LoadStatus::Loaded {
            source: path.display().to_string(),
            entries: table.len(),
        };
        Ok(table)
    }

    /// Load rates from a file, degrading to an empty table on any failure
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match RateTable::from_file(path) {
            Ok(table) => {
                tracing::info!(path = %path.display(), entries = table.len(), "market rates loaded");
                table
            }
            Err(e) => RateTable::failed(path, &e),
        }
    }

    /// Async variant of `load_or_empty`, for callers that await readiness
    #[cfg(feature = "server")]
    pub async fn load_async<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let loaded = match tokio::fs::read_to_string(path).await {
            Ok(content) => RateTable::from_json_str(&content),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to read market rates file: {:?}", path))),
        };

        match loaded {
            Ok(mut table) if !table.is_empty() => {
                table.status = LoadStatus::Loaded {
                    source: path.display().to_string(),
                    entries: table.len(),
                };
                tracing::info!(path = %path.display(), entries = table.len(), "market rates loaded");
                table
            }
            Ok(_) => RateTable::failed(
                path,
                &anyhow!("Market rates file {:?} has no usable entries", path),
            ),
            Err(e) => RateTable::failed(path, &e),
        }
    }

    fn failed(path: &Path, error: &anyhow::Error) -> Self {
        let reason = format!("{:#}", error);
        tracing::warn!(path = %path.display(), error = %reason, "market rates unavailable, continuing with empty table");
        RateTable {
            rates: BTreeMap::new(),
            status: LoadStatus::Failed {
                source: path.display().to_string(),
                reason,
            },
        }
    }

    // ========================================================================
    // QUERIES (read-only)
    // ========================================================================

    /// Expected ("market") amount for a category, exact match
    pub fn expected_amount(&self, category: &str) -> Option<f64> {
        self.rates.get(category).copied()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.rates.contains_key(category)
    }

    /// Category names, sorted
    pub fn categories(&self) -> Vec<&str> {
        self.rates.keys().map(|k| k.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Hint text for an amount input, e.g. "Market rate: ₹1,000,000"
    pub fn placeholder_hint(&self, category: &str) -> String {
        match self.expected_amount(category) {
            Some(rate) => format!("Market rate: ₹{}", format_amount(rate)),
            None => "Enter amount".to_string(),
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::embedded()
    }
}

fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

/// Group digits in thousands: 1234567.0 -> "1,234,567"
pub fn format_amount(amount: f64) -> String {
    let rounded = amount.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn rates_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_embedded_rates() {
        let table = RateTable::embedded();

        assert_eq!(table.len(), 5);
        assert_eq!(table.expected_amount("Road Construction"), Some(1_000_000.0));
        assert_eq!(table.expected_amount("School Building"), Some(2_000_000.0));
        assert_eq!(table.expected_amount("Park Development"), Some(500_000.0));
        assert_eq!(table.status(), &LoadStatus::Embedded);
        assert!(table.status().is_ready());
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let table = RateTable::embedded();

        assert_eq!(table.expected_amount("road construction"), None);
        assert_eq!(table.expected_amount("Road Construction "), None);
        assert_eq!(table.expected_amount("Bridge"), None);
    }

    #[test]
    fn test_from_json_skips_invalid_entries() {
        let json = r#"{
            "Road Construction": 1000000,
            "Broken": 0,
            "Negative": -5,
            "Text": "lots",
            "Water Supply": 800000.5
        }"#;

        let table = RateTable::from_json_str(json).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.expected_amount("Water Supply"), Some(800_000.5));
        assert_eq!(table.expected_amount("Broken"), None);
        assert_eq!(table.expected_amount("Negative"), None);
        assert_eq!(table.expected_amount("Text"), None);
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        assert!(RateTable::from_json_str("not json").is_err());
        assert!(RateTable::from_json_str("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_from_entries_skips_non_positive() {
        let table = RateTable::from_entries(vec![
            ("A", 10.0),
            ("B", 0.0),
            ("C", f64::NAN),
            ("D", f64::INFINITY),
        ]);

        assert_eq!(table.categories(), vec!["A"]);
    }

    #[test]
    fn test_load_from_file() {
        let file = rates_file(r#"{"Water Supply": 800000, "Park Development": 500000}"#);
        let path = file.path();

        let table = RateTable::load_or_empty(path);

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.status(),
            &LoadStatus::Loaded {
                source: path.display().to_string(),
                entries: 2
            }
        );
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let dir = TempDir::new().unwrap();

        let table = RateTable::load_or_empty(dir.path().join("missing.json"));

        assert!(table.is_empty());
        assert!(!table.status().is_ready());
        assert!(matches!(table.status(), LoadStatus::Failed { .. }));
        assert_eq!(table.expected_amount("Road Construction"), None);
    }

    #[test]
    fn test_file_with_no_usable_entries_is_a_failure() {
        let file = rates_file(r#"{"Road Construction": 0}"#);

        let table = RateTable::load_or_empty(file.path());

        assert!(table.is_empty());
        assert!(matches!(table.status(), LoadStatus::Failed { .. }));
    }

    #[test]
    fn test_bundled_rates_file_matches_embedded() {
        let table = RateTable::from_json_str(include_str!("../data/market-rates.json")).unwrap();
        let embedded = RateTable::embedded();

        assert_eq!(
            table.iter().collect::<Vec<_>>(),
            embedded.iter().collect::<Vec<_>>()
        );
    }

    #[cfg(feature = "server")]
    #[tokio::test]
    async fn test_load_async_missing_file() {
        let dir = TempDir::new().unwrap();

        let table = RateTable::load_async(dir.path().join("missing.json")).await;

        assert!(table.is_empty());
        assert!(matches!(table.status(), LoadStatus::Failed { .. }));
    }

    #[cfg(feature = "server")]
    #[tokio::test]
    async fn test_load_async_reads_file() {
        let file = rates_file(r#"{"School Building": 2000000}"#);

        let table = RateTable::load_async(file.path()).await;

        assert_eq!(table.expected_amount("School Building"), Some(2_000_000.0));
        assert!(table.status().is_ready());
    }

    #[test]
    fn test_categories_sorted() {
        let table = RateTable::embedded();

        assert_eq!(
            table.categories(),
            vec![
                "Hospital Equipment",
                "Park Development",
                "Road Construction",
                "School Building",
                "Water Supply",
            ]
        );
    }

    #[test]
    fn test_placeholder_hint() {
        let table = RateTable::embedded();

        assert_eq!(table.placeholder_hint("Road Construction"), "Market rate: ₹1,000,000");
        assert_eq!(table.placeholder_hint("Unknown"), "Enter amount");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1000.0), "1,000");
        assert_eq!(format_amount(50_000_000.0), "50,000,000");
        assert_eq!(format_amount(-1_234_567.0), "-1,234,567");
    }
}
