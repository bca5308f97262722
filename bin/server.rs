// MLA Fund Tracker - Web Server
// REST API with Axum over a single shared ledger

use anyhow::{Context, Result};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fund_tracker::api::{router, AppState};
use fund_tracker::{RateTable, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fund_tracker=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Optional settings file as the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;

    // Rates are awaited before serving, so no request sees a half-loaded table
    let rates = match &settings.rates_path {
        Some(path) => RateTable::load_async(path).await,
        None => RateTable::embedded(),
    };
    if !rates.status().is_ready() {
        tracing::warn!(status = ?rates.status(), "serving without market rates");
    }

    let ledger = settings.build_ledger(rates)?;
    tracing::info!(total_budget = ledger.total_budget(), categories = ledger.rates().len(), "ledger ready");

    let app = Router::new()
        .nest("/api", router(AppState::new(ledger)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(settings.bind_addr.as_str())
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_addr))?;

    tracing::info!("🚀 Server running on http://{}", settings.bind_addr);
    tracing::info!("   API: http://{}/api/summary", settings.bind_addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
