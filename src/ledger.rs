// 🏦 Fund Ledger - fixed budget, running total, append-only history
//
// Every `record` call is one atomic transition: either the transaction is
// appended and `used_amount` grows by exactly its amount, or nothing changes.
//
// Two kinds of checks run on the way in:
// - AnomalyScorer: advisory only, the result rides along on the receipt
// - BudgetGate + funds check: hard gates, failure rejects the transaction

use crate::rates::RateTable;
use crate::scoring::{round2, AnomalyScorer, ScoreResult};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TOTAL_BUDGET: f64 = 50_000_000.0;
pub const DEFAULT_GATE_RATIO: f64 = 1.2;

// ============================================================================
// TRANSACTION
// ============================================================================

/// A recorded spend. Only `FundLedger::record` creates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable identity (UUID v4)
    pub id: String,

    /// Who submitted the spend
    pub submitter: String,

    pub amount: f64,

    /// Project category (should match a market rate entry)
    pub category: String,

    pub recorded_at: DateTime<Utc>,
}

impl Transaction {
    fn new(submitter: &str, amount: f64, category: &str) -> Self {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            submitter: submitter.to_string(),
            amount,
            category: category.to_string(),
            recorded_at: Utc::now(),
        }
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Accepted outcome of `FundLedger::record`
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub transaction: Transaction,

    /// Advisory anomaly check (never blocks recording)
    pub advisory: ScoreResult,

    /// Budget left after this transaction
    pub remaining: f64,
}

/// Why a transaction was refused. The ledger is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("exceeds market rate threshold: amount exceeds market rate by {excess_pct:.2}% (limit {threshold:.2})")]
    ExceedsMarketRate {
        amount: f64,
        expected: f64,
        threshold: f64,
        excess_pct: f64,
    },

    #[error("insufficient funds: requested {amount:.2}, remaining {remaining:.2}")]
    InsufficientFunds { amount: f64, remaining: f64 },

    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("missing submitter name")]
    MissingSubmitter,
}

impl Rejection {
    /// Short, stable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::ExceedsMarketRate { .. } => "exceeds market rate threshold",
            Rejection::InsufficientFunds { .. } => "insufficient funds",
            Rejection::InvalidAmount { .. } => "invalid amount",
            Rejection::MissingSubmitter => "missing submitter",
        }
    }
}

// ============================================================================
// BUDGET GATE
// ============================================================================

/// Hard market-rate gate: rejects amounts above `expected * ratio`.
/// Unknown categories pass (there is nothing to compare against).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetGate {
    ratio: f64,
}

impl BudgetGate {
    pub fn new(ratio: f64) -> Self {
        BudgetGate { ratio }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn check(&self, rates: &RateTable, amount: f64, category: &str) -> Result<(), Rejection> {
        let expected = match rates.expected_amount(category) {
            Some(expected) => expected,
            None => return Ok(()),
        };

        let threshold = expected * self.ratio;
        if amount > threshold {
            return Err(Rejection::ExceedsMarketRate {
                amount,
                expected,
                threshold,
                excess_pct: round2((amount - expected) / expected * 100.0),
            });
        }

        Ok(())
    }
}

impl Default for BudgetGate {
    fn default() -> Self {
        BudgetGate::new(DEFAULT_GATE_RATIO)
    }
}

// ============================================================================
// FUND SUMMARY
// ============================================================================

/// Read-only aggregate view for presenters (pie chart, status bars)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSummary {
    pub total_budget: f64,
    pub used_amount: f64,
    pub available_amount: f64,

    /// Percentages of the total budget, 1 decimal place
    pub used_pct: f64,
    pub available_pct: f64,

    pub transaction_count: usize,
}

impl FundSummary {
    /// Labelled slices in display order: used first, then available
    pub fn slices(&self) -> [(&'static str, f64); 2] {
        [
            ("Used Fund", self.used_amount),
            ("Available Fund", self.available_amount),
        ]
    }
}

// ============================================================================
// FUND LEDGER
// ============================================================================

#[derive(Debug)]
pub struct FundLedger {
    total_budget: f64,
    used_amount: f64,
    transactions: Vec<Transaction>,
    rates: RateTable,
    scorer: AnomalyScorer,
    gate: BudgetGate,
}

impl FundLedger {
    /// Ledger with the default scorer and a 1.2x market-rate gate
    pub fn new(total_budget: f64, rates: RateTable) -> Result<Self> {
        FundLedger::with_checks(total_budget, rates, AnomalyScorer::new(), BudgetGate::default())
    }

    pub fn with_checks(
        total_budget: f64,
        rates: RateTable,
        scorer: AnomalyScorer,
        gate: BudgetGate,
    ) -> Result<Self> {
        if !total_budget.is_finite() || total_budget <= 0.0 {
            bail!("Total budget must be a positive amount, got {}", total_budget);
        }

        Ok(FundLedger {
            total_budget,
            used_amount: 0.0,
            transactions: Vec::new(),
            rates,
            scorer,
            gate,
        })
    }

    // ========================================================================
    // QUERIES (read-only)
    // ========================================================================

    pub fn total_budget(&self) -> f64 {
        self.total_budget
    }

    pub fn used_amount(&self) -> f64 {
        self.used_amount
    }

    pub fn remaining(&self) -> f64 {
        self.total_budget - self.used_amount
    }

    /// Transactions in insertion order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub fn scorer(&self) -> &AnomalyScorer {
        &self.scorer
    }

    pub fn gate(&self) -> &BudgetGate {
        &self.gate
    }

    pub fn expected_amount(&self, category: &str) -> Option<f64> {
        self.rates.expected_amount(category)
    }

    /// Advisory score without recording anything
    pub fn score(&self, amount: f64, category: &str) -> ScoreResult {
        self.scorer.score(&self.rates, amount, category)
    }

    pub fn summary(&self) -> FundSummary {
        let available = self.remaining();
        FundSummary {
            total_budget: self.total_budget,
            used_amount: self.used_amount,
            available_amount: available,
            used_pct: round1(self.used_amount / self.total_budget * 100.0),
            available_pct: round1(available / self.total_budget * 100.0),
            transaction_count: self.transactions.len(),
        }
    }

    pub fn transactions_by<'a>(&'a self, submitter: &'a str) -> impl Iterator<Item = &'a Transaction> {
        self.transactions
            .iter()
            .filter(move |tx| tx.submitter == submitter)
    }

    /// Recorded transactions whose advisory score is anomalous
    pub fn flagged(&self) -> Vec<(&Transaction, ScoreResult)> {
        self.transactions
            .iter()
            .map(|tx| (tx, self.score(tx.amount, &tx.category)))
            .filter(|(_, score)| score.is_anomalous)
            .collect()
    }

    // ========================================================================
    // RECORDING
    // ========================================================================

    /// Record a spend, or reject it without touching the ledger
    pub fn record(&mut self, submitter: &str, amount: f64, category: &str) -> Result<Receipt, Rejection> {
        let submitter = submitter.trim();
        if submitter.is_empty() {
            return Err(Rejection::MissingSubmitter);
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Rejection::InvalidAmount { amount });
        }

        // Advisory
        let advisory = self.score(amount, category);

        // Hard gates
        if let Err(rejection) = self.gate.check(&self.rates, amount, category) {
            tracing::warn!(submitter, amount, category, reason = rejection.reason(), "transaction rejected");
            return Err(rejection);
        }

        // Compare the exact value that gets committed, so used_amount never passes the budget
        let new_used = self.used_amount + amount;
        if new_used > self.total_budget {
            let rejection = Rejection::InsufficientFunds {
                amount,
                remaining: self.remaining(),
            };
            tracing::warn!(submitter, amount, category, reason = rejection.reason(), "transaction rejected");
            return Err(rejection);
        }

        // Commit
        let transaction = Transaction::new(submitter, amount, category);
        self.transactions.push(transaction.clone());
        self.used_amount = new_used;

        tracing::info!(
            id = %transaction.id,
            submitter,
            amount,
            category,
            anomalous = advisory.is_anomalous,
            "transaction recorded"
        );

        Ok(Receipt {
            transaction,
            advisory,
            remaining: self.remaining(),
        })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// TESTS
// ============================================================================
