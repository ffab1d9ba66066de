//! Line item routes.
//!
//! Creation and listing live under `/transactions/{id}/items`; this
//! module covers direct edits by item id.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::put,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use daybook_db::entities::line_items;
use daybook_db::repositories::{LineItemPatch, LineItemRepository};

use crate::{AppState, error::ApiError};

/// Creates the line item routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/line-items/{id}",
        put(update_line_item).delete(delete_line_item),
    )
}

/// Request body for updating a line item. Omitted fields keep their
/// current value.
#[derive(Debug, Deserialize)]
pub struct UpdateLineItemRequest {
    /// Move the item to another transaction.
    pub transaction_id: Option<Uuid>,
    /// New description.
    pub description: Option<String>,
    /// New quantity, must stay positive.
    pub quantity: Option<i32>,
    /// New unit price.
    pub unit_price: Option<Decimal>,
}

/// PUT `/line-items/{id}` - Patch a line item.
async fn update_line_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLineItemRequest>,
) -> Result<Json<line_items::Model>, ApiError> {
    let repo = LineItemRepository::new((*state.db).clone(), state.statement_locks.clone());
    let updated = repo
        .update(
            id,
            LineItemPatch {
                transaction_id: payload.transaction_id,
                description: payload.description,
                quantity: payload.quantity,
                unit_price: payload.unit_price,
            },
        )
        .await?;
    Ok(Json(updated))
}

/// DELETE `/line-items/{id}` - Delete a line item.
async fn delete_line_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = LineItemRepository::new((*state.db).clone(), state.statement_locks.clone());
    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
