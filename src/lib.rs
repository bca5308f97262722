// MLA Fund Tracker - Core Library
// Exposes all modules for use in the TUI, API server, and tests

pub mod rates;    // Market rate table
pub mod scoring;  // Advisory z-score check
pub mod ledger;   // Budget ledger + hard gates
pub mod config;   // Settings (TOML + env)
pub mod report;   // CSV history export

#[cfg(feature = "server")]
pub mod api;      // JSON API (axum)

// Re-export commonly used types
pub use rates::{format_amount, LoadStatus, RateTable};
pub use scoring::{
    AnomalyScorer, Direction, ScoreResult, ScoringPolicy,
    DEFAULT_SPREAD_RATIO, DEFAULT_Z_THRESHOLD,
};
pub use ledger::{
    BudgetGate, FundLedger, FundSummary, Receipt, Rejection, Transaction,
    DEFAULT_GATE_RATIO, DEFAULT_TOTAL_BUDGET,
};
pub use config::Settings;
pub use report::{export_csv, write_csv};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
