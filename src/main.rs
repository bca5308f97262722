// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fund_tracker::{format_amount, RateTable, Settings};

#[derive(Parser)]
#[command(name = "fund-tracker", version, about = "Track a fixed fund and flag off-market spending")]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive dashboard (default)
    Ui {
        /// Write the transaction history to this CSV file on exit
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// List market rates
    Rates,

    /// Score an amount against a category's market rate
    Score {
        #[arg(value_parser = parse_amount)]
        amount: f64,
        category: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Ui { export: None });

    init_logging(matches!(command, Command::Ui { .. }));

    let settings = Settings::load(cli.config.as_deref())?;
    let rates = settings.rate_table();

    match command {
        Command::Ui { export } => run_ui_mode(&settings, rates, export),
        Command::Rates => run_rates(&rates),
        Command::Score { amount, category, json } => run_score(&settings, rates, amount, &category, json),
    }
}

/// Finite amounts only; NaN or inf would score as "normal"
fn parse_amount(s: &str) -> Result<f64, String> {
    let amount: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("{:?} is not a number", s))?;
    if !amount.is_finite() {
        return Err(format!("{:?} is not a finite amount", s));
    }
    Ok(amount)
}

/// The dashboard owns the terminal, so it only logs when RUST_LOG asks for it
fn init_logging(interactive: bool) {
    if interactive && std::env::var("RUST_LOG").is_err() {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new("off"))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::sink))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "fund_tracker=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run_rates(rates: &RateTable) -> Result<()> {
    println!("💹 Market Rates ({:?})", rates.status());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if rates.is_empty() {
        println!("(no market rates loaded, every category will score as unknown)");
    }
    for (category, rate) in rates.iter() {
        println!("{:<24} ₹{:>14}", category, format_amount(rate));
    }

    Ok(())
}

fn run_score(settings: &Settings, rates: RateTable, amount: f64, category: &str, json: bool) -> Result<()> {
    let ledger = settings.build_ledger(rates)?;
    let result = ledger.score(amount, category);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let icon = if result.is_anomalous { "⚠️ " } else { "✓" };
    println!("{} {}", icon, result.message);
    println!("   Category:    {}", category);
    println!("   Amount:      ₹{}", format_amount(amount));
    if !result.is_unknown_category() {
        println!("   Market rate: ₹{}", format_amount(result.expected_amount));
        println!("   z-score:     {:.2}", result.z_score);
        println!("   Deviation:   {:+.2}%", result.deviation_pct);
        if ledger.gate().check(ledger.rates(), amount, category).is_err() {
            println!(
                "   ✗ Would be rejected: above {:.0}% of market rate",
                ledger.gate().ratio() * 100.0
            );
        }
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(settings: &Settings, rates: RateTable, export: Option<PathBuf>) -> Result<()> {
    if !rates.status().is_ready() {
        eprintln!("⚠️  Market rates unavailable: {:?}", rates.status());
        eprintln!("   Type a project category; transactions will be recorded without market checks.");
    }

    let ledger = settings.build_ledger(rates)?;
    let mut app = ui::App::new(ledger);
    ui::run_ui(&mut app)?;

    if let Some(path) = export {
        fund_tracker::export_csv(&path, app.ledger.transactions())?;
        println!("✓ Exported {} transactions to {:?}", app.ledger.transactions().len(), path);
    }

    let summary = app.ledger.summary();
    println!(
        "Used ₹{} of ₹{} ({:.1}%)",
        format_amount(summary.used_amount),
        format_amount(summary.total_budget),
        summary.used_pct
    );

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_settings: &Settings, _rates: RateTable, _export: Option<PathBuf>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin fund-server --features server");
    std::process::exit(1);
}

// ============================================================================
// TESTS
// ============================================================================
