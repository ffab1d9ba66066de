//! Dashboard routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use daybook_db::repositories::{DashboardRepository, MonthSummary, YearSummary};

use crate::{AppState, error::ApiError};

/// Creates the dashboard routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/month", get(month_summary))
        .route("/dashboard/year", get(year_summary))
}

/// Query parameters for the month summary.
#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    /// Year of the period.
    pub year: i32,
    /// Month of the period, 1-12.
    pub month: u32,
}

/// Query parameters for the year summary.
#[derive(Debug, Deserialize)]
pub struct YearQuery {
    /// Year of the period.
    pub year: i32,
}

/// GET `/dashboard/month` - One month's aggregated figures.
async fn month_summary(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthSummary>, ApiError> {
    let repo = DashboardRepository::new((*state.db).clone());
    let summary = repo.month_summary(query.year, query.month).await?;
    Ok(Json(summary))
}

/// GET `/dashboard/year` - One year's aggregated figures.
async fn year_summary(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<YearSummary>, ApiError> {
    let repo = DashboardRepository::new((*state.db).clone());
    let summary = repo.year_summary(query.year).await?;
    Ok(Json(summary))
}
