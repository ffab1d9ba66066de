//! Transaction routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use daybook_core::line_items::LineItemDraft;
use daybook_core::transaction::{Direction, PaymentStatus, PaymentType};
use daybook_db::entities::{line_items, transactions};
use daybook_db::repositories::{
    CreateTransactionInput, LineItemRepository, TransactionRepository, TransactionWithItems,
    UpdateTransactionInput,
};
use daybook_shared::error::AppError;

use crate::{AppState, error::ApiError};

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/transactions/{id}",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        .route(
            "/transactions/{id}/items",
            get(list_items).post(create_item),
        )
}

/// Request body for creating a transaction.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// Calendar date the transaction belongs to.
    pub date: NaiveDate,
    /// Free-form description.
    pub description: String,
    /// Amount in the local currency; ignored when line items are given.
    pub local_amount: Option<Decimal>,
    /// Explicit rate snapshot; resolved from stored rates when absent.
    pub exchange_rate: Option<Decimal>,
    /// "credit" or "debit".
    pub direction: Direction,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Payment type.
    pub payment_type: PaymentType,
    /// Line items for itemized transactions.
    #[serde(default)]
    pub line_items: Vec<LineItemDraft>,
}

/// Request body for updating a transaction. Omitted fields keep their
/// current value.
#[derive(Debug, Deserialize)]
pub struct UpdateTransactionRequest {
    /// New date.
    pub date: Option<NaiveDate>,
    /// New description.
    pub description: Option<String>,
    /// New local amount; rejected for itemized transactions.
    pub local_amount: Option<Decimal>,
    /// New rate snapshot.
    pub exchange_rate: Option<Decimal>,
    /// New direction.
    pub direction: Option<Direction>,
    /// New payment status.
    pub payment_status: Option<PaymentStatus>,
    /// New payment type.
    pub payment_type: Option<PaymentType>,
}

/// Query parameters for listing transactions. Exactly one selector is
/// expected: a date range, a month, or a search query.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    /// Range start (with `end_date`).
    pub start_date: Option<NaiveDate>,
    /// Range end (with `start_date`).
    pub end_date: Option<NaiveDate>,
    /// Month selector year (with `month`).
    pub year: Option<i32>,
    /// Month selector month, 1-12 (with `year`).
    pub month: Option<u32>,
    /// Description search text.
    pub q: Option<String>,
    /// With a month selector, restrict to deferred debits.
    #[serde(default)]
    pub deferred_only: bool,
}

/// A transaction with its line items.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// The transaction row.
    pub transaction: transactions::Model,
    /// Its line items.
    pub items: Vec<line_items::Model>,
}

impl From<TransactionWithItems> for TransactionResponse {
    fn from(value: TransactionWithItems) -> Self {
        Self {
            transaction: value.transaction,
            items: value.items,
        }
    }
}

/// POST `/transactions` - Record a transaction.
async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = TransactionRepository::new((*state.db).clone(), state.statement_locks.clone());
    let created = repo
        .create(CreateTransactionInput {
            date: payload.date,
            description: payload.description,
            local_amount: payload.local_amount,
            exchange_rate: payload.exchange_rate,
            direction: payload.direction,
            payment_status: payload.payment_status,
            payment_type: payload.payment_type,
            line_items: payload.line_items,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(TransactionResponse::from(created))))
}

/// GET `/transactions` - List by range, month, or description search.
async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<transactions::Model>>, ApiError> {
    let repo = TransactionRepository::new((*state.db).clone(), state.statement_locks.clone());

    let rows = if let Some(q) = &query.q {
        repo.search_description(q).await?
    } else if let (Some(year), Some(month)) = (query.year, query.month) {
        if query.deferred_only {
            repo.list_deferred_debits_by_month(year, month).await?
        } else {
            repo.list_by_month(year, month).await?
        }
    } else if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        repo.list_range(start, end).await?
    } else {
        return Err(AppError::Validation(
            "provide start_date and end_date, year and month, or q".to_string(),
        )
        .into());
    };
    Ok(Json(rows))
}

/// GET `/transactions/{id}` - Fetch a transaction with its items.
async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let repo = TransactionRepository::new((*state.db).clone(), state.statement_locks.clone());
    let found = repo.find_with_items(id).await?;
    Ok(Json(TransactionResponse::from(found)))
}

/// PUT `/transactions/{id}` - Patch a transaction.
async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTransactionRequest>,
) -> Result<Json<transactions::Model>, ApiError> {
    let repo = TransactionRepository::new((*state.db).clone(), state.statement_locks.clone());
    let updated = repo
        .update(
            id,
            UpdateTransactionInput {
                date: payload.date,
                description: payload.description,
                local_amount: payload.local_amount,
                exchange_rate: payload.exchange_rate,
                direction: payload.direction,
                payment_status: payload.payment_status,
                payment_type: payload.payment_type,
            },
        )
        .await?;
    Ok(Json(updated))
}

/// DELETE `/transactions/{id}` - Delete a transaction and its items.
async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = TransactionRepository::new((*state.db).clone(), state.statement_locks.clone());
    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/transactions/{id}/items` - List a transaction's line items.
async fn list_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<line_items::Model>>, ApiError> {
    // Surface 404 for a missing parent rather than an empty list.
    let txn_repo = TransactionRepository::new((*state.db).clone(), state.statement_locks.clone());
    txn_repo.find_by_id(id).await?;

    let repo = LineItemRepository::new((*state.db).clone(), state.statement_locks.clone());
    let items = repo.list_by_transaction(id).await?;
    Ok(Json(items))
}

/// POST `/transactions/{id}/items` - Add a line item.
async fn create_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<LineItemDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = LineItemRepository::new((*state.db).clone(), state.statement_locks.clone());
    let created = repo.create(id, draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
