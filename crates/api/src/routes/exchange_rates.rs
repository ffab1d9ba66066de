//! Exchange rate routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use daybook_db::entities::exchange_rates;
use daybook_db::repositories::ExchangeRateRepository;
use daybook_shared::error::AppError;

use crate::{AppState, error::ApiError};

/// Creates the exchange rate routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exchange-rates", get(list_rates).put(upsert_rate))
        .route("/exchange-rates/latest", get(latest_rate))
        .route("/exchange-rates/{date}", get(get_rate).delete(delete_rate))
}

/// Request body for setting a rate.
#[derive(Debug, Deserialize)]
pub struct UpsertRateRequest {
    /// The rate's date.
    pub date: NaiveDate,
    /// Local-to-reference rate, must be positive.
    pub rate: Decimal,
}

/// Query parameters for listing rates.
#[derive(Debug, Deserialize)]
pub struct ListRatesQuery {
    /// Range start, inclusive.
    pub start_date: NaiveDate,
    /// Range end, inclusive.
    pub end_date: NaiveDate,
}

/// Query parameters for the latest-rate lookup.
#[derive(Debug, Default, Deserialize)]
pub struct LatestRateQuery {
    /// Upper date bound; unbounded when absent.
    pub on_or_before: Option<NaiveDate>,
}

/// PUT `/exchange-rates` - Create or overwrite the rate for a date.
async fn upsert_rate(
    State(state): State<AppState>,
    Json(payload): Json<UpsertRateRequest>,
) -> Result<Json<exchange_rates::Model>, ApiError> {
    let repo = ExchangeRateRepository::new((*state.db).clone());
    let rate = repo.upsert(payload.date, payload.rate).await?;
    Ok(Json(rate))
}

/// GET `/exchange-rates` - List rates in a date range.
async fn list_rates(
    State(state): State<AppState>,
    Query(query): Query<ListRatesQuery>,
) -> Result<Json<Vec<exchange_rates::Model>>, ApiError> {
    let repo = ExchangeRateRepository::new((*state.db).clone());
    let rates = repo.list_range(query.start_date, query.end_date).await?;
    Ok(Json(rates))
}

/// GET `/exchange-rates/latest` - Most recent rate, optionally bounded.
async fn latest_rate(
    State(state): State<AppState>,
    Query(query): Query<LatestRateQuery>,
) -> Result<Json<exchange_rates::Model>, ApiError> {
    let repo = ExchangeRateRepository::new((*state.db).clone());
    let rate = match query.on_or_before {
        Some(date) => repo.most_recent_on_or_before(date).await?,
        None => repo.latest().await?,
    }
    .ok_or_else(|| AppError::NotFound("no exchange rates stored".to_string()))?;
    Ok(Json(rate))
}

/// GET `/exchange-rates/{date}` - The rate stored on a date.
async fn get_rate(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<exchange_rates::Model>, ApiError> {
    let repo = ExchangeRateRepository::new((*state.db).clone());
    let rate = repo.get(date).await?;
    Ok(Json(rate))
}

/// DELETE `/exchange-rates/{date}` - Remove the rate stored on a date.
async fn delete_rate(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<StatusCode, ApiError> {
    let repo = ExchangeRateRepository::new((*state.db).clone());
    repo.delete(date).await?;
    Ok(StatusCode::NO_CONTENT)
}
