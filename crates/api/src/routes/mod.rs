//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod dashboard;
pub mod exchange_rates;
pub mod health;
pub mod line_items;
pub mod statements;
pub mod transactions;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(transactions::routes())
        .merge(line_items::routes())
        .merge(statements::routes())
        .merge(exchange_rates::routes())
        .merge(dashboard::routes())
}
