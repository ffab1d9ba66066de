//! Transaction repository.
//!
//! Every mutation here is the write side of the consistency contract:
//! the transaction row change and the recompute of the affected daily
//! statements commit in one database transaction, under the per-date
//! statement locks. A date change touches two statements; their locks
//! are taken in ascending date order.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use daybook_core::currency::{convert_to_reference, rescale_amount, rescale_rate};
use daybook_core::error::CoreError;
use daybook_core::line_items::{item_total, validate_item, LineItemDraft};
use daybook_core::transaction::{
    resolve_amounts, Direction, PaymentStatus, PaymentType, TransactionDraft,
};
use daybook_shared::error::AppError;

use crate::entities::{line_items, sea_orm_active_enums, transactions};
use crate::repositories::exchange_rate::most_recent_on_or_before_in;
use crate::repositories::statement::{StatementLocks, StatementRepository};
use crate::repositories::{lost_statement_race, month_bounds};

/// How many times a mutation retries after losing a statement insert race.
const MAX_MUTATION_ATTEMPTS: u32 = 3;

/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// Input failed domain validation.
    #[error("Invalid transaction: {0}")]
    Invalid(#[from] CoreError),

    /// No exchange rate given and none stored on or before the date.
    #[error("No exchange rate available on or before {0}")]
    NoExchangeRate(NaiveDate),

    /// Transaction not found.
    #[error("Transaction '{0}' not found")]
    NotFound(Uuid),

    /// Itemized transactions derive their amount from line items.
    #[error("Transaction '{0}' is itemized; its amount cannot be set directly")]
    ItemizedAmountImmutable(Uuid),

    /// Requested month or year does not exist.
    #[error("Invalid period: {year}-{month}")]
    InvalidPeriod {
        /// Requested year.
        year: i32,
        /// Requested month (1-12).
        month: u32,
    },

    /// Concurrent writers kept colliding on a statement date.
    #[error("Statement for {0} is under concurrent modification")]
    Conflict(NaiveDate),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<TransactionError> for AppError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Invalid(_)
            | TransactionError::NoExchangeRate(_)
            | TransactionError::ItemizedAmountImmutable(_)
            | TransactionError::InvalidPeriod { .. } => Self::Validation(err.to_string()),
            TransactionError::NotFound(_) => Self::NotFound(err.to_string()),
            TransactionError::Conflict(_) => Self::Conflict(err.to_string()),
            TransactionError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// Input for creating a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionInput {
    /// Calendar date the transaction belongs to.
    pub date: NaiveDate,
    /// Free-form description.
    pub description: String,
    /// Amount in the local currency; ignored when line items are present.
    pub local_amount: Option<Decimal>,
    /// Explicit rate snapshot; resolved from the rate store when absent.
    pub exchange_rate: Option<Decimal>,
    /// Credit or debit.
    pub direction: Direction,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Payment type.
    pub payment_type: PaymentType,
    /// Line items for itemized transactions.
    pub line_items: Vec<LineItemDraft>,
}

/// Patch for updating a transaction. `None` fields are left unchanged.
/// Line items are edited through their own repository.
#[derive(Debug, Clone, Default)]
pub struct UpdateTransactionInput {
    /// New date; moving a transaction recomputes both dates.
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

/// A transaction together with its line items.
#[derive(Debug, Clone)]
pub struct TransactionWithItems {
    /// The transaction row.
    pub transaction: transactions::Model,
    /// Its line items, in insertion order.
    pub items: Vec<line_items::Model>,
}

/// Transaction repository.
#[derive(Debug)]
#[cfg_attr(not(feature = "mock"), derive(Clone))]
pub struct TransactionRepository {
    db: DatabaseConnection,
    locks: StatementLocks,
}

impl TransactionRepository {
    /// Creates a new transaction repository sharing the given lock table.
    #[must_use]
    pub const fn new(db: DatabaseConnection, locks: StatementLocks) -> Self {
        Self { db, locks }
    }

    /// Creates a transaction and recomputes its date's statement, in one
    /// database transaction.
    ///
    /// Itemized input derives the local amount from the items. The rate
    /// snapshot comes from the input, or from the most recent stored rate
    /// on or before the date.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid input or a missing rate,
    /// `Conflict` if statement retries are exhausted, or a database error.
    pub async fn create(
        &self,
        input: CreateTransactionInput,
    ) -> Result<TransactionWithItems, TransactionError> {
        let draft = TransactionDraft {
            date: input.date,
            description: input.description.clone(),
            local_amount: input.local_amount,
            direction: input.direction,
            payment_status: input.payment_status,
            payment_type: input.payment_type,
            line_items: input.line_items.clone(),
        };
        let resolved = resolve_amounts(&draft)?;

        let rate = self.resolve_rate(input.exchange_rate, input.date).await?;
        let converted = convert_to_reference(resolved.local_amount, rate)?;

        let _guard = self.locks.acquire(input.date).await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let txn = self.db.begin().await?;
            let result = Self::insert_in(&txn, &input, resolved.local_amount, rate, converted).await;
            match result {
                Ok(created) => {
                    txn.commit().await?;
                    return Ok(created);
                }
                Err(err) => {
                    drop(txn);
                    if lost_statement_race(&err) && attempt < MAX_MUTATION_ATTEMPTS {
                        tracing::debug!(date = %input.date, attempt, "create raced on statement, retrying");
                        continue;
                    }
                    if lost_statement_race(&err) {
                        return Err(TransactionError::Conflict(input.date));
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Applies a patch and recomputes every affected statement date.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the transaction does not exist,
    /// `ItemizedAmountImmutable` when patching the amount of an itemized
    /// transaction, `Conflict` if statement retries are exhausted, or a
    /// database error.
    pub async fn update(
        &self,
        id: Uuid,
        patch: UpdateTransactionInput,
    ) -> Result<transactions::Model, TransactionError> {
        let existing = self.find_by_id(id).await?;
        let items = existing
            .find_related(line_items::Entity)
            .all(&self.db)
            .await?;

        if !items.is_empty() && patch.local_amount.is_some() {
            return Err(TransactionError::ItemizedAmountImmutable(id));
        }

        if let Some(description) = &patch.description {
            if description.trim().is_empty() {
                return Err(CoreError::EmptyDescription.into());
            }
        }

        let new_date = patch.date.unwrap_or(existing.date);
        let new_rate = match patch.exchange_rate {
            Some(rate) => {
                if rate <= Decimal::ZERO {
                    return Err(CoreError::NonPositiveRate.into());
                }
                rescale_rate(rate)
            }
            None => existing.exchange_rate,
        };
        let new_local = match patch.local_amount {
            Some(amount) => {
                if amount < Decimal::ZERO {
                    return Err(CoreError::NegativeAmount.into());
                }
                rescale_amount(amount)
            }
            None => existing.local_amount,
        };
        let converted = convert_to_reference(new_local, new_rate)?;

        let dates = affected_dates(existing.date, new_date);
        let mut guards = Vec::with_capacity(dates.len());
        for date in &dates {
            guards.push(self.locks.acquire(*date).await);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let txn = self.db.begin().await?;
            let result = async {
                let mut active: transactions::ActiveModel = existing.clone().into();
                active.date = Set(new_date);
                if let Some(description) = &patch.description {
                    active.description = Set(description.clone());
                }
                active.local_amount = Set(new_local);
                active.exchange_rate = Set(new_rate);
                active.converted_amount = Set(converted);
                if let Some(direction) = patch.direction {
                    active.direction = Set(direction.into());
                }
                if let Some(status) = patch.payment_status {
                    active.payment_status = Set(status.into());
                }
                if let Some(payment_type) = patch.payment_type {
                    active.payment_type = Set(payment_type.into());
                }
                active.updated_at = Set(chrono::Utc::now().into());
                let updated = active.update(&txn).await?;

                for date in &dates {
                    StatementRepository::recompute_in(&txn, *date).await?;
                }
                Ok::<_, DbErr>(updated)
            }
            .await;

            match result {
                Ok(updated) => {
                    txn.commit().await?;
                    return Ok(updated);
                }
                Err(err) => {
                    drop(txn);
                    if lost_statement_race(&err) && attempt < MAX_MUTATION_ATTEMPTS {
                        tracing::debug!(%id, attempt, "update raced on statement, retrying");
                        continue;
                    }
                    if lost_statement_race(&err) {
                        return Err(TransactionError::Conflict(new_date));
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Deletes a transaction (line items cascade) and recomputes its date.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the transaction does not exist, `Conflict`
    /// if statement retries are exhausted, or a database error.
    pub async fn delete(&self, id: Uuid) -> Result<(), TransactionError> {
        let existing = self.find_by_id(id).await?;
        let date = existing.date;

        let _guard = self.locks.acquire(date).await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let txn = self.db.begin().await?;
            let result = async {
                transactions::Entity::delete_by_id(id).exec(&txn).await?;
                StatementRepository::recompute_in(&txn, date).await?;
                Ok::<_, DbErr>(())
            }
            .await;

            match result {
                Ok(()) => {
                    txn.commit().await?;
                    return Ok(());
                }
                Err(err) => {
                    drop(txn);
                    if lost_statement_race(&err) && attempt < MAX_MUTATION_ATTEMPTS {
                        tracing::debug!(%id, attempt, "delete raced on statement, retrying");
                        continue;
                    }
                    if lost_statement_race(&err) {
                        return Err(TransactionError::Conflict(date));
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Finds a transaction by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the transaction does not exist.
    pub async fn find_by_id(&self, id: Uuid) -> Result<transactions::Model, TransactionError> {
        transactions::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(TransactionError::NotFound(id))
    }

    /// Finds a transaction together with its line items.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the transaction does not exist.
    pub async fn find_with_items(&self, id: Uuid) -> Result<TransactionWithItems, TransactionError> {
        let transaction = self.find_by_id(id).await?;
        let items = transaction
            .find_related(line_items::Entity)
            .all(&self.db)
            .await?;
        Ok(TransactionWithItems { transaction, items })
    }

    /// Lists transactions within an inclusive date range, ascending by
    /// date then creation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<transactions::Model>, TransactionError> {
        let rows = transactions::Entity::find()
            .filter(transactions::Column::Date.gte(start))
            .filter(transactions::Column::Date.lte(end))
            .order_by_asc(transactions::Column::Date)
            .order_by_asc(transactions::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Lists transactions of one calendar month.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod` for a month outside 1-12.
    pub async fn list_by_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<transactions::Model>, TransactionError> {
        let (start, end) =
            month_bounds(year, month).ok_or(TransactionError::InvalidPeriod { year, month })?;
        self.list_range(start, end).await
    }

    /// Lists the month's deferred debits, the on-account purchases still
    /// to be settled.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod` for a month outside 1-12.
    pub async fn list_deferred_debits_by_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<transactions::Model>, TransactionError> {
        let (start, end) =
            month_bounds(year, month).ok_or(TransactionError::InvalidPeriod { year, month })?;
        let rows = transactions::Entity::find()
            .filter(transactions::Column::Date.gte(start))
            .filter(transactions::Column::Date.lte(end))
            .filter(transactions::Column::Direction.eq(sea_orm_active_enums::Direction::Debit))
            .filter(
                transactions::Column::PaymentType.eq(sea_orm_active_enums::PaymentType::Deferred),
            )
            .order_by_asc(transactions::Column::Date)
            .order_by_asc(transactions::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Case-insensitive description search, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search_description(
        &self,
        query: &str,
    ) -> Result<Vec<transactions::Model>, TransactionError> {
        Ok(search_query(query).all(&self.db).await?)
    }

    /// Resolves the rate snapshot for a transaction on `date`.
    async fn resolve_rate(
        &self,
        explicit: Option<Decimal>,
        date: NaiveDate,
    ) -> Result<Decimal, TransactionError> {
        match explicit {
            Some(rate) => {
                if rate <= Decimal::ZERO {
                    return Err(CoreError::NonPositiveRate.into());
                }
                Ok(rescale_rate(rate))
            }
            None => {
                let stored = most_recent_on_or_before_in(&self.db, date)
                    .await?
                    .ok_or(TransactionError::NoExchangeRate(date))?;
                Ok(stored.rate)
            }
        }
    }

    /// Inserts the header, its items, and the statement recompute on the
    /// caller's transaction.
    async fn insert_in<C: ConnectionTrait>(
        conn: &C,
        input: &CreateTransactionInput,
        local_amount: Decimal,
        rate: Decimal,
        converted: Decimal,
    ) -> Result<TransactionWithItems, DbErr> {
        let now = chrono::Utc::now().into();
        let header = transactions::ActiveModel {
            id: Set(Uuid::new_v4()),
            date: Set(input.date),
            description: Set(input.description.clone()),
            local_amount: Set(rescale_amount(local_amount)),
            exchange_rate: Set(rate),
            converted_amount: Set(converted),
            direction: Set(input.direction.into()),
            payment_status: Set(input.payment_status.into()),
            payment_type: Set(input.payment_type.into()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let transaction = header.insert(conn).await?;

        let mut items = Vec::with_capacity(input.line_items.len());
        for draft in &input.line_items {
            // Already validated through resolve_amounts.
            let (quantity, unit_price) = validate_item(draft)
                .map_err(|e| DbErr::Custom(e.to_string()))?;
            let item = line_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                transaction_id: Set(transaction.id),
                description: Set(draft.description.clone()),
                quantity: Set(quantity),
                unit_price: Set(rescale_amount(unit_price)),
                total: Set(item_total(quantity, unit_price)),
            };
            items.push(item.insert(conn).await?);
        }

        StatementRepository::recompute_in(conn, input.date).await?;
        Ok(TransactionWithItems { transaction, items })
    }
}

/// Description search, matched without regard to case via `ILIKE`.
fn search_query(query: &str) -> Select<transactions::Entity> {
    transactions::Entity::find()
        .filter(Expr::col(transactions::Column::Description).ilike(format!("%{query}%")))
        .order_by_desc(transactions::Column::Date)
        .order_by_desc(transactions::Column::CreatedAt)
}

/// The statement dates a date change touches, ascending and deduplicated.
#[must_use]
pub(crate) fn affected_dates(old: NaiveDate, new: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = vec![old, new];
    dates.sort_unstable();
    dates.dedup();
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    #[cfg(feature = "mock")]
    use sea_orm::MockDatabase;
    use sea_orm::{DatabaseBackend, QueryTrait};

    #[cfg(feature = "mock")]
    use crate::test_utils::{connection_reset, unique_violation};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_input() -> CreateTransactionInput {
        CreateTransactionInput {
            date: d(2026, 3, 10),
            description: "mercado".to_owned(),
            local_amount: Some(dec!(100.00)),
            exchange_rate: Some(dec!(3.3333)),
            direction: Direction::Debit,
            payment_status: PaymentStatus::Paid,
            payment_type: PaymentType::Cash,
            line_items: Vec::new(),
        }
    }

    #[test]
    fn test_search_query_matches_case_insensitively() {
        let sql = search_query("Mercado")
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("ILIKE"));
        assert!(sql.contains("%Mercado%"));
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn test_create_conflicts_after_statement_race_retries() {
        // Every attempt loses the statement insert race; the bounded
        // retries run out and the create reports a conflict on the date.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors(vec![
                unique_violation(),
                unique_violation(),
                unique_violation(),
            ])
            .into_connection();
        let repo = TransactionRepository::new(db, StatementLocks::new());

        let err = repo.create(sample_input()).await.unwrap_err();
        assert!(matches!(err, TransactionError::Conflict(date) if date == d(2026, 3, 10)));
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn test_create_aborts_when_recompute_fails_mid_transaction() {
        // The header insert succeeds, then the statement recompute in
        // the same database transaction fails. The create must surface
        // the failure; the commit is never reached, so no row survives.
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();
        let header = transactions::Model {
            id: Uuid::new_v4(),
            date: d(2026, 3, 10),
            description: "mercado".to_owned(),
            local_amount: dec!(100.00),
            exchange_rate: dec!(3.3333),
            converted_amount: dec!(30.00),
            direction: sea_orm_active_enums::Direction::Debit,
            payment_status: sea_orm_active_enums::PaymentStatus::Paid,
            payment_type: sea_orm_active_enums::PaymentType::Cash,
            created_at: now,
            updated_at: now,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![header]])
            .append_query_errors(vec![connection_reset()])
            .into_connection();
        let repo = TransactionRepository::new(db, StatementLocks::new());

        let err = repo.create(sample_input()).await.unwrap_err();
        assert!(matches!(err, TransactionError::Database(_)));
    }

    #[test]
    fn test_affected_dates_same_date_collapses() {
        assert_eq!(
            affected_dates(d(2026, 3, 10), d(2026, 3, 10)),
            vec![d(2026, 3, 10)]
        );
    }

    #[test]
    fn test_affected_dates_ascending_order() {
        // Lock order never depends on the direction of the move.
        assert_eq!(
            affected_dates(d(2026, 3, 20), d(2026, 3, 10)),
            vec![d(2026, 3, 10), d(2026, 3, 20)]
        );
        assert_eq!(
            affected_dates(d(2026, 3, 10), d(2026, 3, 20)),
            vec![d(2026, 3, 10), d(2026, 3, 20)]
        );
    }

    #[test]
    fn test_validation_errors_map_to_400() {
        let err: AppError = TransactionError::NoExchangeRate(d(2026, 3, 1)).into();
        assert_eq!(err.status_code(), 400);

        let err: AppError =
            TransactionError::ItemizedAmountImmutable(Uuid::nil()).into();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err: AppError = TransactionError::NotFound(Uuid::nil()).into();
        assert_eq!(err.status_code(), 404);
    }
}
