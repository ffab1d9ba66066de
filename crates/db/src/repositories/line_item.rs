//! Line item repository.
//!
//! Line items never drift from their transaction: every mutation here
//! re-derives the parent's local amount from the surviving items,
//! re-converts it with the parent's snapshotted rate, and recomputes
//! the affected statement dates, all in one database transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use uuid::Uuid;

use daybook_core::currency::{convert_to_reference, rescale_amount};
use daybook_core::error::CoreError;
use daybook_core::line_items::{item_total, validate_item, LineItemDraft};
use daybook_shared::error::AppError;

use crate::entities::{line_items, transactions};
use crate::repositories::lost_statement_race;
use crate::repositories::statement::{StatementLocks, StatementRepository};
use crate::repositories::transaction::affected_dates;

/// How many times a mutation retries after losing a statement insert race.
const MAX_MUTATION_ATTEMPTS: u32 = 3;

/// Error types for line item operations.
#[derive(Debug, thiserror::Error)]
pub enum LineItemError {
    /// Input failed domain validation.
    #[error("Invalid line item: {0}")]
    Invalid(#[from] CoreError),

    /// Line item not found.
    #[error("Line item '{0}' not found")]
    NotFound(Uuid),

    /// The owning transaction does not exist.
    #[error("Transaction '{0}' not found")]
    TransactionNotFound(Uuid),

    /// Concurrent writers kept colliding on a statement date.
    #[error("Statement for {0} is under concurrent modification")]
    Conflict(NaiveDate),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<LineItemError> for AppError {
    fn from(err: LineItemError) -> Self {
        match err {
            LineItemError::Invalid(_) => Self::Validation(err.to_string()),
            LineItemError::NotFound(_) | LineItemError::TransactionNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            LineItemError::Conflict(_) => Self::Conflict(err.to_string()),
            LineItemError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// Patch for updating a line item. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct LineItemPatch {
    /// Move the item to another transaction; both parents are resynced.
    pub transaction_id: Option<Uuid>,
    /// New description.
    pub description: Option<String>,
    /// New quantity, must stay positive.
    pub quantity: Option<i32>,
    /// New unit price.
    pub unit_price: Option<Decimal>,
}

/// Line item repository.
#[derive(Debug)]
#[cfg_attr(not(feature = "mock"), derive(Clone))]
pub struct LineItemRepository {
    db: DatabaseConnection,
    locks: StatementLocks,
}

impl LineItemRepository {
    /// Creates a new line item repository sharing the given lock table.
    #[must_use]
    pub const fn new(db: DatabaseConnection, locks: StatementLocks) -> Self {
        Self { db, locks }
    }

    /// Adds an item to a transaction and resyncs the parent's totals.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` if the parent does not exist, a
    /// validation error for an invalid draft, `Conflict` if statement
    /// retries are exhausted, or a database error.
    pub async fn create(
        &self,
        transaction_id: Uuid,
        draft: LineItemDraft,
    ) -> Result<line_items::Model, LineItemError> {
        let parent = transactions::Entity::find_by_id(transaction_id)
            .one(&self.db)
            .await?
            .ok_or(LineItemError::TransactionNotFound(transaction_id))?;
        let (quantity, unit_price) = validate_item(&draft)?;

        let _guard = self.locks.acquire(parent.date).await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let txn = self.db.begin().await?;
            let result = async {
                let item = line_items::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    transaction_id: Set(transaction_id),
                    description: Set(draft.description.clone()),
                    quantity: Set(quantity),
                    unit_price: Set(rescale_amount(unit_price)),
                    total: Set(item_total(quantity, unit_price)),
                };
                let inserted = item.insert(&txn).await?;
                Self::resync_parent_in(&txn, transaction_id).await?;
                StatementRepository::recompute_in(&txn, parent.date).await?;
                Ok::<_, DbErr>(inserted)
            }
            .await;

            match result {
                Ok(inserted) => {
                    txn.commit().await?;
                    return Ok(inserted);
                }
                Err(err) => {
                    drop(txn);
                    if lost_statement_race(&err) && attempt < MAX_MUTATION_ATTEMPTS {
                        tracing::debug!(%transaction_id, attempt, "item create raced, retrying");
                        continue;
                    }
                    if lost_statement_race(&err) {
                        return Err(LineItemError::Conflict(parent.date));
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Applies a patch, resyncing every parent and statement it touches.
    ///
    /// Re-parenting the item to another transaction resyncs both the old
    /// and the new parent, and recomputes both dates.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the item does not exist,
    /// `TransactionNotFound` for a re-parent to a missing transaction, a
    /// validation error for an invalid patch, `Conflict` if statement
    /// retries are exhausted, or a database error.
    pub async fn update(
        &self,
        id: Uuid,
        patch: LineItemPatch,
    ) -> Result<line_items::Model, LineItemError> {
        let existing = self.find_by_id(id).await?;
        let old_parent = transactions::Entity::find_by_id(existing.transaction_id)
            .one(&self.db)
            .await?
            .ok_or(LineItemError::TransactionNotFound(existing.transaction_id))?;

        let new_parent_id = patch.transaction_id.unwrap_or(existing.transaction_id);
        let new_parent = if new_parent_id == old_parent.id {
            old_parent.clone()
        } else {
            transactions::Entity::find_by_id(new_parent_id)
                .one(&self.db)
                .await?
                .ok_or(LineItemError::TransactionNotFound(new_parent_id))?
        };

        let merged = LineItemDraft {
            description: patch
                .description
                .clone()
                .unwrap_or_else(|| existing.description.clone()),
            quantity: Some(patch.quantity.unwrap_or(existing.quantity)),
            unit_price: Some(patch.unit_price.unwrap_or(existing.unit_price)),
        };
        let (quantity, unit_price) = validate_item(&merged)?;

        let dates = affected_dates(old_parent.date, new_parent.date);
        let mut guards = Vec::with_capacity(dates.len());
        for date in &dates {
            guards.push(self.locks.acquire(*date).await);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let txn = self.db.begin().await?;
            let result = async {
                let mut active: line_items::ActiveModel = existing.clone().into();
                active.transaction_id = Set(new_parent_id);
                active.description = Set(merged.description.clone());
                active.quantity = Set(quantity);
                active.unit_price = Set(rescale_amount(unit_price));
                active.total = Set(item_total(quantity, unit_price));
                let updated = active.update(&txn).await?;

                Self::resync_parent_in(&txn, old_parent.id).await?;
                if new_parent_id != old_parent.id {
                    Self::resync_parent_in(&txn, new_parent_id).await?;
                }
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
                        tracing::debug!(%id, attempt, "item update raced, retrying");
                        continue;
                    }
                    if lost_statement_race(&err) {
                        return Err(LineItemError::Conflict(new_parent.date));
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Deletes an item and resyncs its parent's totals.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the item does not exist, `Conflict` if
    /// statement retries are exhausted, or a database error.
    pub async fn delete(&self, id: Uuid) -> Result<(), LineItemError> {
        let existing = self.find_by_id(id).await?;
        let parent = transactions::Entity::find_by_id(existing.transaction_id)
            .one(&self.db)
            .await?
            .ok_or(LineItemError::TransactionNotFound(existing.transaction_id))?;

        let _guard = self.locks.acquire(parent.date).await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let txn = self.db.begin().await?;
            let result = async {
                line_items::Entity::delete_by_id(id).exec(&txn).await?;
                Self::resync_parent_in(&txn, parent.id).await?;
                StatementRepository::recompute_in(&txn, parent.date).await?;
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
                        tracing::debug!(%id, attempt, "item delete raced, retrying");
                        continue;
                    }
                    if lost_statement_race(&err) {
                        return Err(LineItemError::Conflict(parent.date));
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Finds a line item by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the item does not exist.
    pub async fn find_by_id(&self, id: Uuid) -> Result<line_items::Model, LineItemError> {
        line_items::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(LineItemError::NotFound(id))
    }

    /// Lists the items of one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<line_items::Model>, LineItemError> {
        let items = line_items::Entity::find()
            .filter(line_items::Column::TransactionId.eq(transaction_id))
            .all(&self.db)
            .await?;
        Ok(items)
    }

    /// Re-derives a parent's local amount from its surviving items and
    /// re-converts it with the parent's own rate snapshot.
    ///
    /// A parent left with no items keeps a zero amount rather than its
    /// stale itemized total.
    async fn resync_parent_in<C: ConnectionTrait>(
        conn: &C,
        transaction_id: Uuid,
    ) -> Result<(), DbErr> {
        let parent = transactions::Entity::find_by_id(transaction_id)
            .one(conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(transaction_id.to_string()))?;
        let totals: Vec<Decimal> = line_items::Entity::find()
            .filter(line_items::Column::TransactionId.eq(transaction_id))
            .all(conn)
            .await?
            .iter()
            .map(|item| item.total)
            .collect();
        let local_amount = rescale_amount(totals.iter().copied().sum());
        let converted = convert_to_reference(local_amount, parent.exchange_rate)
            .map_err(|e| DbErr::Custom(e.to_string()))?;

        let mut active: transactions::ActiveModel = parent.into();
        active.local_amount = Set(local_amount);
        active.converted_amount = Set(converted);
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_item_maps_to_400() {
        let err: AppError = LineItemError::Invalid(CoreError::NonPositiveQuantity(0)).into();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_missing_parent_maps_to_404() {
        let err: AppError = LineItemError::TransactionNotFound(Uuid::nil()).into();
        assert_eq!(err.status_code(), 404);
    }
}
