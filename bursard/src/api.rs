//! HTTP API for the bursar daemon.
//!
//! User surface: open accounts, submit deposit/withdrawal/KYC requests,
//! execute orders, open timed trades, apply for IPOs, read balances,
//! ledger history, and the portfolio projection.
//!
//! Admin surface: approve/reject requests, set timed-trade results,
//! register IPO offerings, allot/reject applications, list pending work.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use prometheus::Registry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use bursar_domain::{
    Account, DomainError, IpoApplication, IpoOffering, LedgerEntry, Side, Symbol, TimedTrade,
    TradeOutcome, WorkflowRequest,
};
use bursar_engine::{EngineError, PortfolioSummary};
use bursar_ledger::LedgerError;

use crate::core::{Brokerage, OrderExecution};
use crate::error::DaemonError;
use crate::metrics;

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    pub brokerage: Arc<Brokerage>,
    pub registry: Arc<Registry>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Account view with the derived spendable balance.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub balance: Decimal,
    pub blocked: Decimal,
    pub spendable: Decimal,
    pub verified: bool,
    pub disabled: bool,
    pub opened_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            balance: account.balance,
            blocked: account.blocked,
            spendable: account.spendable(),
            verified: account.verified,
            disabled: account.disabled,
            opened_at: account.opened_at,
        }
    }
}

/// Body for deposit and withdrawal submissions.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}

/// Body for request rejections.
#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body for buy/sell execution.
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Body for opening a timed trade.
#[derive(Debug, Deserialize)]
pub struct OpenTradeRequest {
    pub stake: Decimal,
    pub duration_secs: i64,
    pub profit_rate: Decimal,
}

/// Body for settling a timed trade.
#[derive(Debug, Deserialize)]
pub struct TradeResultRequest {
    pub result: TradeOutcome,
}

/// Body for registering an IPO offering.
#[derive(Debug, Deserialize)]
pub struct CreateIpoRequest {
    pub symbol: String,
    pub price_per_share: Decimal,
    #[serde(default)]
    pub discount_price: Option<Decimal>,
    pub lot_size: u32,
    pub min_investment: Decimal,
}

/// Body for applying to an IPO.
#[derive(Debug, Deserialize)]
pub struct ApplyIpoRequest {
    pub ipo_id: Uuid,
    pub lots: u32,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // User surface
        .route("/accounts", post(open_account_handler))
        .route("/accounts/:id", get(get_account_handler))
        .route("/accounts/:id/ledger", get(ledger_handler))
        .route("/accounts/:id/portfolio", get(portfolio_handler))
        .route("/accounts/:id/requests", get(account_requests_handler))
        .route("/accounts/:id/deposits", post(submit_deposit_handler))
        .route("/accounts/:id/withdrawals", post(submit_withdrawal_handler))
        .route("/accounts/:id/kyc", post(submit_kyc_handler))
        .route("/accounts/:id/orders", post(execute_order_handler))
        .route("/accounts/:id/trades", post(open_trade_handler))
        .route("/accounts/:id/ipo-applications", post(apply_ipo_handler))
        // Admin surface
        .route("/requests/pending", get(pending_requests_handler))
        .route("/requests/:id/approve", post(approve_request_handler))
        .route("/requests/:id/reject", post(reject_request_handler))
        .route("/trades/pending", get(pending_trades_handler))
        .route("/trades/:id/result", post(trade_result_handler))
        .route("/ipos", post(create_ipo_handler).get(list_ipos_handler))
        .route("/ipo-applications/pending", get(pending_applications_handler))
        .route("/ipo-applications/:id/allot", post(allot_ipo_handler))
        .route("/ipo-applications/:id/reject", post(reject_ipo_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Ops handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus metrics endpoint.
async fn metrics_handler(State(state): State<Arc<ApiState>>) -> String {
    metrics::render(&state.registry)
}

// =============================================================================
// User handlers
// =============================================================================

async fn open_account_handler(State(state): State<Arc<ApiState>>) -> ApiResult<AccountResponse> {
    let account = state.brokerage.open_account().await;
    Ok(Json(account.into()))
}

async fn get_account_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<AccountResponse> {
    let account = state.brokerage.account(id).await.map_err(to_error_response)?;
    Ok(Json(account.into()))
}

async fn ledger_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<LedgerEntry>> {
    let entries = state.brokerage.ledger_entries(id).await.map_err(to_error_response)?;
    Ok(Json(entries))
}

async fn portfolio_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<PortfolioSummary> {
    let summary = state.brokerage.portfolio(id).await.map_err(to_error_response)?;
    Ok(Json(summary))
}

async fn account_requests_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<WorkflowRequest>> {
    state.brokerage.account(id).await.map_err(to_error_response)?;
    Ok(Json(state.brokerage.requests_for(id)))
}

async fn submit_deposit_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AmountRequest>,
) -> ApiResult<WorkflowRequest> {
    let request = state
        .brokerage
        .submit_deposit(id, body.amount)
        .await
        .map_err(to_error_response)?;
    Ok(Json(request))
}

async fn submit_withdrawal_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AmountRequest>,
) -> ApiResult<WorkflowRequest> {
    let request = state
        .brokerage
        .submit_withdrawal(id, body.amount)
        .await
        .map_err(to_error_response)?;
    Ok(Json(request))
}

async fn submit_kyc_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<WorkflowRequest> {
    let request = state.brokerage.submit_kyc(id).await.map_err(to_error_response)?;
    Ok(Json(request))
}

async fn execute_order_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<OrderRequest>,
) -> ApiResult<OrderExecution> {
    let symbol = Symbol::new(&body.symbol)
        .map_err(|e| to_error_response(DaemonError::Domain(e)))?;
    let execution = state
        .brokerage
        .execute_order(id, symbol, body.side, body.quantity, body.price)
        .await
        .map_err(to_error_response)?;
    Ok(Json(execution))
}

async fn open_trade_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<OpenTradeRequest>,
) -> ApiResult<TimedTrade> {
    let trade = state
        .brokerage
        .open_timed_trade(
            id,
            body.stake,
            Duration::seconds(body.duration_secs),
            body.profit_rate,
        )
        .await
        .map_err(to_error_response)?;
    Ok(Json(trade))
}

async fn apply_ipo_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApplyIpoRequest>,
) -> ApiResult<IpoApplication> {
    let application = state
        .brokerage
        .apply_ipo(id, body.ipo_id, body.lots)
        .await
        .map_err(to_error_response)?;
    Ok(Json(application))
}

// =============================================================================
// Admin handlers
// =============================================================================

async fn pending_requests_handler(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Vec<WorkflowRequest>> {
    Ok(Json(state.brokerage.pending_requests()))
}

async fn approve_request_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<WorkflowRequest> {
    let request = state.brokerage.approve_request(id).await.map_err(to_error_response)?;
    Ok(Json(request))
}

async fn reject_request_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectRequest>,
) -> ApiResult<WorkflowRequest> {
    let request = state
        .brokerage
        .reject_request(id, body.reason)
        .await
        .map_err(to_error_response)?;
    Ok(Json(request))
}

async fn pending_trades_handler(State(state): State<Arc<ApiState>>) -> ApiResult<Vec<TimedTrade>> {
    Ok(Json(state.brokerage.pending_trades()))
}

async fn trade_result_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<TradeResultRequest>,
) -> ApiResult<TimedTrade> {
    let trade = state
        .brokerage
        .set_trade_result(id, body.result)
        .await
        .map_err(to_error_response)?;
    Ok(Json(trade))
}

async fn create_ipo_handler(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<CreateIpoRequest>,
) -> ApiResult<IpoOffering> {
    let symbol = Symbol::new(&body.symbol)
        .map_err(|e| to_error_response(DaemonError::Domain(e)))?;
    let offering = state
        .brokerage
        .create_offering(
            symbol,
            body.price_per_share,
            body.discount_price,
            body.lot_size,
            body.min_investment,
        )
        .map_err(to_error_response)?;
    Ok(Json(offering))
}

async fn list_ipos_handler(State(state): State<Arc<ApiState>>) -> ApiResult<Vec<IpoOffering>> {
    Ok(Json(state.brokerage.offerings()))
}

async fn pending_applications_handler(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Vec<IpoApplication>> {
    Ok(Json(state.brokerage.pending_applications()))
}

async fn allot_ipo_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<IpoApplication> {
    let application = state.brokerage.allot_ipo(id).await.map_err(to_error_response)?;
    Ok(Json(application))
}

async fn reject_ipo_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<IpoApplication> {
    let application = state.brokerage.reject_ipo(id).await.map_err(to_error_response)?;
    Ok(Json(application))
}

// =============================================================================
// Error mapping
// =============================================================================

fn to_error_response(error: DaemonError) -> ApiError {
    let status = match &error {
        DaemonError::Domain(domain) => domain_status(domain),
        DaemonError::Ledger(ledger) => ledger_status(ledger),
        DaemonError::Engine(engine) => engine_status(engine),
        DaemonError::Config(_) | DaemonError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(ErrorResponse { error: error.to_string() }))
}

fn domain_status(error: &DomainError) -> StatusCode {
    match error {
        DomainError::AlreadyDecided(_) => StatusCode::CONFLICT,
        DomainError::InsufficientPosition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::InvalidAmount(_)
        | DomainError::InvalidSymbol(_)
        | DomainError::InvalidOffering(_) => StatusCode::BAD_REQUEST,
    }
}

fn ledger_status(error: &LedgerError) -> StatusCode {
    match error {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::AccountDisabled(_) => StatusCode::FORBIDDEN,
        LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        LedgerError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn engine_status(error: &EngineError) -> StatusCode {
    match error {
        EngineError::Domain(domain) => domain_status(domain),
        EngineError::Ledger(ledger) => ledger_status(ledger),
        EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::BelowMinimumInvestment { .. } => StatusCode::BAD_REQUEST,
        EngineError::RejectionReasonRequired => StatusCode::BAD_REQUEST,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let already_decided =
            DaemonError::Domain(DomainError::AlreadyDecided("request x".to_string()));
        assert_eq!(to_error_response(already_decided).0, StatusCode::CONFLICT);

        let not_found = DaemonError::Ledger(LedgerError::NotFound(Uuid::nil()));
        assert_eq!(to_error_response(not_found).0, StatusCode::NOT_FOUND);

        let insufficient = DaemonError::Engine(EngineError::Ledger(LedgerError::InsufficientFunds {
            account_id: Uuid::nil(),
            requested: Decimal::ONE,
            spendable: Decimal::ZERO,
        }));
        assert_eq!(to_error_response(insufficient).0, StatusCode::UNPROCESSABLE_ENTITY);

        let invariant =
            DaemonError::Ledger(LedgerError::InvariantViolation("bug".to_string()));
        assert_eq!(to_error_response(invariant).0, StatusCode::INTERNAL_SERVER_ERROR);

        let no_reason = DaemonError::Engine(EngineError::RejectionReasonRequired);
        assert_eq!(to_error_response(no_reason).0, StatusCode::BAD_REQUEST);
    }
}
