//! Daily statement routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use daybook_db::entities::daily_statements;
use daybook_db::repositories::{StatementRepository, SweepReport};
use daybook_shared::error::AppError;

use crate::{AppState, error::ApiError};

/// Creates the statement routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/statements", get(list_statements))
        .route("/statements/latest", get(latest_statement))
        .route("/statements/accumulated", get(accumulated_balance))
        .route("/statements/regenerate", post(regenerate_statements))
        .route("/statements/{date}", get(get_statement))
}

/// Query parameters for listing statements.
#[derive(Debug, Deserialize)]
pub struct ListStatementsQuery {
    /// Range start, inclusive.
    pub start_date: NaiveDate,
    /// Range end, inclusive.
    pub end_date: NaiveDate,
}

/// Query parameters for the accumulated balance.
#[derive(Debug, Default, Deserialize)]
pub struct AccumulatedQuery {
    /// Last date included in the sum; defaults to today.
    pub through: Option<NaiveDate>,
}

/// Accumulated balance response.
#[derive(Debug, Serialize)]
pub struct AccumulatedResponse {
    /// Last date included in the sum.
    pub through: NaiveDate,
    /// Balance since inception through that date.
    pub accumulated_balance: Decimal,
}

/// Request body for a regeneration sweep.
#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    /// First date to rebuild.
    pub start_date: NaiveDate,
    /// Last date to rebuild.
    pub end_date: NaiveDate,
}

/// GET `/statements` - List statements in a date range.
async fn list_statements(
    State(state): State<AppState>,
    Query(query): Query<ListStatementsQuery>,
) -> Result<Json<Vec<daily_statements::Model>>, ApiError> {
    let repo = StatementRepository::new((*state.db).clone(), state.statement_locks.clone());
    let rows = repo.list_range(query.start_date, query.end_date).await?;
    Ok(Json(rows))
}

/// GET `/statements/latest` - The most recently dated statement.
async fn latest_statement(
    State(state): State<AppState>,
) -> Result<Json<daily_statements::Model>, ApiError> {
    let repo = StatementRepository::new((*state.db).clone(), state.statement_locks.clone());
    let row = repo
        .latest()
        .await?
        .ok_or_else(|| AppError::NotFound("no statements recorded yet".to_string()))?;
    Ok(Json(row))
}

/// GET `/statements/accumulated` - Balance since inception.
async fn accumulated_balance(
    State(state): State<AppState>,
    Query(query): Query<AccumulatedQuery>,
) -> Result<Json<AccumulatedResponse>, ApiError> {
    let through = query
        .through
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let repo = StatementRepository::new((*state.db).clone(), state.statement_locks.clone());
    let accumulated = repo.accumulated_as_of(through).await?;
    Ok(Json(AccumulatedResponse {
        through,
        accumulated_balance: accumulated,
    }))
}

/// GET `/statements/{date}` - One day's statement.
async fn get_statement(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<daily_statements::Model>, ApiError> {
    let repo = StatementRepository::new((*state.db).clone(), state.statement_locks.clone());
    let row = repo.find_by_date(date).await?;
    Ok(Json(row))
}

/// POST `/statements/regenerate` - Rebuild a date range, ascending.
async fn regenerate_statements(
    State(state): State<AppState>,
    Json(payload): Json<RegenerateRequest>,
) -> Result<Json<SweepReport>, ApiError> {
    let repo = StatementRepository::new((*state.db).clone(), state.statement_locks.clone());
    let report = repo
        .regenerate_range(payload.start_date, payload.end_date, &state.shutdown)
        .await?;
    Ok(Json(report))
}
