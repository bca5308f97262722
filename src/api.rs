// 🌐 JSON API - axum routes over a shared ledger
//
// One mutex per ledger: every `record` runs under the lock, so the
// accept-or-reject transition stays atomic with concurrent clients.

use crate::ledger::{FundLedger, FundSummary, Rejection, Transaction};
use crate::rates::LoadStatus;
use crate::scoring::ScoreResult;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Mutex<FundLedger>>,
}

impl AppState {
    pub fn new(ledger: FundLedger) -> Self {
        AppState {
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, FundLedger> {
        // record() mutates only after every check passes: a poisoned ledger is still consistent
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn fail(data: Option<T>, error: String) -> Self {
        Self {
            success: false,
            data,
            error: Some(error),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub amount: f64,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub submitter: String,
    pub amount: f64,
    pub category: String,
}

#[derive(Serialize)]
struct RatesResponse {
    status: LoadStatus,
    rates: BTreeMap<String, f64>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/rates - Market rate table and its load status
async fn get_rates(State(state): State<AppState>) -> impl IntoResponse {
    let ledger = state.ledger();
    let rates = ledger.rates();

    Json(ApiResponse::ok(RatesResponse {
        status: rates.status().clone(),
        rates: rates.iter().map(|(k, v)| (k.to_string(), v)).collect(),
    }))
}

/// POST /api/score - Advisory score, records nothing
async fn score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Json<ApiResponse<ScoreResult>> {
    let ledger = state.ledger();
    Json(ApiResponse::ok(ledger.score(request.amount, &request.category)))
}

/// GET /api/transactions - Recorded transactions, oldest first
async fn get_transactions(State(state): State<AppState>) -> Json<ApiResponse<Vec<Transaction>>> {
    let ledger = state.ledger();
    Json(ApiResponse::ok(ledger.transactions().to_vec()))
}

/// POST /api/transactions - Record a transaction
async fn record_transaction(
    State(state): State<AppState>,
    Json(request): Json<RecordRequest>,
) -> Response {
    let mut ledger = state.ledger();

    match ledger.record(&request.submitter, request.amount, &request.category) {
        Ok(receipt) => (StatusCode::CREATED, Json(ApiResponse::ok(receipt))).into_response(),
        Err(rejection) => {
            let message = rejection.to_string();
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::<Rejection>::fail(Some(rejection), message)),
            )
                .into_response()
        }
    }
}

/// GET /api/summary - Used vs. available totals for the fund chart
async fn get_summary(State(state): State<AppState>) -> Json<ApiResponse<FundSummary>> {
    let ledger = state.ledger();
    Json(ApiResponse::ok(ledger.summary()))
}

/// API routes, to be nested under `/api`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/rates", get(get_rates))
        .route("/score", post(score))
        .route("/transactions", get(get_transactions).post(record_transaction))
        .route("/summary", get(get_summary))
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================
