//! Daily statement repository and recompute engine.
//!
//! Statement rows are derived artifacts. Nothing mutates them directly:
//! transaction and line item mutations call back into the recompute here,
//! inside their own database transaction, and the regeneration sweep walks
//! a date range ascending through the same single-date recompute.
//!
//! Concurrency control is two-layered. A per-date async lock serializes
//! recomputes for the same date within this process, and the unique index
//! on `daily_statements.date` turns a cross-process insert race into a
//! constraint violation that the recompute retries.

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use daybook_core::currency::rescale_amount;
use daybook_core::statement::{compute, day_totals};
use daybook_shared::error::AppError;

use crate::entities::{daily_statements, transactions};
use crate::repositories::lost_statement_race;

/// How many times a recompute retries after losing an insert race.
const MAX_RECOMPUTE_ATTEMPTS: u32 = 3;

/// Error types for statement operations.
#[derive(Debug, thiserror::Error)]
pub enum StatementError {
    /// No statement row exists for the date yet.
    #[error("No statement found for {0}")]
    NotFound(NaiveDate),

    /// Range start is after range end.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange {
        /// Requested start date.
        start: NaiveDate,
        /// Requested end date.
        end: NaiveDate,
    },

    /// Concurrent writers kept colliding on the same date.
    #[error("Statement for {0} is under concurrent modification")]
    Conflict(NaiveDate),

    /// Another regeneration sweep is already running.
    #[error("A statement regeneration sweep is already in progress")]
    SweepInProgress,

    /// The sweep stopped at the first failing date.
    #[error("Sweep halted at {failed_date}: {source}")]
    SweepHalted {
        /// The date whose recompute failed.
        failed_date: NaiveDate,
        /// The last date that was successfully recomputed, if any.
        last_completed: Option<NaiveDate>,
        /// The underlying failure.
        source: Box<StatementError>,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<StatementError> for AppError {
    fn from(err: StatementError) -> Self {
        match err {
            StatementError::NotFound(_) => Self::NotFound(err.to_string()),
            StatementError::InvalidRange { .. } => Self::Validation(err.to_string()),
            StatementError::Conflict(_) | StatementError::SweepInProgress => {
                Self::Conflict(err.to_string())
            }
            StatementError::SweepHalted { .. } => Self::Internal(err.to_string()),
            StatementError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// Outcome of a regeneration sweep that ran to a stop point.
///
/// `completed_through` is the last date whose statement was rewritten.
/// A cancelled sweep leaves every date up to and including it consistent;
/// dates after it are untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    /// First date of the requested range.
    pub start: NaiveDate,
    /// Last date of the requested range.
    pub end: NaiveDate,
    /// Last date successfully recomputed, if any.
    pub completed_through: Option<NaiveDate>,
    /// Whether the sweep stopped on a cancellation request.
    pub cancelled: bool,
}

/// Process-wide lock table serializing statement writes per date.
///
/// Cloning is cheap; all clones share the same underlying locks. One
/// instance lives in the application state and every repository that
/// recomputes statements holds a clone.
#[derive(Debug, Clone, Default)]
pub struct StatementLocks {
    dates: Arc<DashMap<NaiveDate, Arc<Mutex<()>>>>,
    sweep: Arc<Mutex<()>>,
}

impl StatementLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock guarding the given date, creating it on first use.
    pub(crate) fn for_date(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        self.dates
            .entry(date)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquires the lock guarding the given date.
    ///
    /// The returned guard evicts the date's table entry on release when
    /// no other task holds a handle to it, so the table only retains
    /// dates that are locked or contended.
    pub(crate) async fn acquire(&self, date: NaiveDate) -> DateLockGuard {
        let guard = self.for_date(date).lock_owned().await;
        DateLockGuard {
            guard: Some(guard),
            date,
            dates: Arc::clone(&self.dates),
        }
    }

    /// Claims the sweep slot, or returns `None` if a sweep is running.
    pub(crate) fn try_acquire_sweep(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.sweep).try_lock_owned().ok()
    }
}

/// Holds one date's statement lock.
#[must_use]
#[derive(Debug)]
pub(crate) struct DateLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    date: NaiveDate,
    dates: Arc<DashMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl Drop for DateLockGuard {
    fn drop(&mut self) {
        // Release the mutex first so the entry reads as idle below.
        self.guard.take();
        // The map entry accounts for one strong reference; any waiter
        // holds another, which keeps the entry alive. `remove_if` and
        // `for_date` serialize on the map shard, so the count cannot
        // change between the check and the removal.
        self.dates
            .remove_if(&self.date, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Daily statement repository.
#[derive(Debug)]
#[cfg_attr(not(feature = "mock"), derive(Clone))]
pub struct StatementRepository {
    db: DatabaseConnection,
    locks: StatementLocks,
}

impl StatementRepository {
    /// Creates a new statement repository sharing the given lock table.
    #[must_use]
    pub const fn new(db: DatabaseConnection, locks: StatementLocks) -> Self {
        Self { db, locks }
    }

    /// Fetches the statement row for a date.
    ///
    /// Statement rows exist only for dates that have seen at least one
    /// mutation or sweep, so absence is not an error state of the data.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no statement row exists for the date.
    pub async fn find_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<daily_statements::Model, StatementError> {
        daily_statements::Entity::find()
            .filter(daily_statements::Column::Date.eq(date))
            .one(&self.db)
            .await?
            .ok_or(StatementError::NotFound(date))
    }

    /// Returns the most recently dated statement row, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn latest(&self) -> Result<Option<daily_statements::Model>, StatementError> {
        let row = daily_statements::Entity::find()
            .order_by_desc(daily_statements::Column::Date)
            .one(&self.db)
            .await?;
        Ok(row)
    }

    /// Balance accumulated since inception through the given date.
    ///
    /// Summed fresh from the day balances of every statement row with a
    /// date on or before `through`. Empty history sums to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn accumulated_as_of(&self, through: NaiveDate) -> Result<Decimal, StatementError> {
        Ok(Self::sum_day_balances_through(&self.db, through).await?)
    }

    /// Lists statement rows within an inclusive date range, ascending.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if `start` is after `end`.
    pub async fn list_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<daily_statements::Model>, StatementError> {
        if start > end {
            return Err(StatementError::InvalidRange { start, end });
        }
        let statements = daily_statements::Entity::find()
            .filter(daily_statements::Column::Date.gte(start))
            .filter(daily_statements::Column::Date.lte(end))
            .order_by_asc(daily_statements::Column::Date)
            .all(&self.db)
            .await?;
        Ok(statements)
    }

    /// Recomputes the statement for a single date from its transactions.
    ///
    /// Takes the per-date lock, then runs the recompute in its own
    /// database transaction, retrying a bounded number of times if a
    /// concurrent writer wins the first-insert race for the date.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the retries are exhausted, or a database
    /// error.
    pub async fn recompute(
        &self,
        date: NaiveDate,
    ) -> Result<daily_statements::Model, StatementError> {
        let _guard = self.locks.acquire(date).await;
        self.recompute_unlocked(date).await
    }

    /// Recompute without taking the date lock. The caller must hold it.
    async fn recompute_unlocked(
        &self,
        date: NaiveDate,
    ) -> Result<daily_statements::Model, StatementError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let txn = self.db.begin().await?;
            match Self::recompute_in(&txn, date).await {
                Ok(model) => {
                    txn.commit().await?;
                    return Ok(model);
                }
                Err(err) => {
                    // Dropping the transaction rolls it back.
                    drop(txn);
                    if lost_statement_race(&err) {
                        if attempt < MAX_RECOMPUTE_ATTEMPTS {
                            tracing::debug!(%date, attempt, "statement insert raced, retrying");
                            continue;
                        }
                        return Err(StatementError::Conflict(date));
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Rebuilds one date's statement inside the caller's transaction.
    ///
    /// Every figure is summed fresh from the source rows: credits and
    /// debits from the day's transactions, the accumulated balance from
    /// the day balances of all earlier statements plus this day. No
    /// other date's row is read as a cached total or written.
    pub(crate) async fn recompute_in<C: ConnectionTrait>(
        conn: &C,
        date: NaiveDate,
    ) -> Result<daily_statements::Model, DbErr> {
        let day_txns = transactions::Entity::find()
            .filter(transactions::Column::Date.eq(date))
            .all(conn)
            .await?;
        let (credits, debits) = day_totals(
            day_txns
                .iter()
                .map(|t| (t.direction.into(), t.converted_amount)),
        );

        let accumulated_before = match date.pred_opt() {
            Some(prev) => Self::sum_day_balances_through(conn, prev).await?,
            None => Decimal::ZERO,
        };

        let totals = compute(
            rescale_amount(credits),
            rescale_amount(debits),
            accumulated_before,
        );

        let existing = daily_statements::Entity::find()
            .filter(daily_statements::Column::Date.eq(date))
            .one(conn)
            .await?;

        let now = chrono::Utc::now().into();
        if let Some(row) = existing {
            let mut active: daily_statements::ActiveModel = row.into();
            active.total_credits = Set(totals.total_credits);
            active.total_debits = Set(totals.total_debits);
            active.day_balance = Set(totals.day_balance);
            active.accumulated_balance = Set(totals.accumulated_balance);
            active.updated_at = Set(now);
            active.update(conn).await
        } else {
            let model = daily_statements::ActiveModel {
                id: Set(Uuid::new_v4()),
                date: Set(date),
                total_credits: Set(totals.total_credits),
                total_debits: Set(totals.total_debits),
                day_balance: Set(totals.day_balance),
                accumulated_balance: Set(totals.accumulated_balance),
                created_at: Set(now),
                updated_at: Set(now),
            };
            model.insert(conn).await
        }
    }

    /// Sums stored day balances over dates on or before `through`.
    pub(crate) async fn sum_day_balances_through<C: ConnectionTrait>(
        conn: &C,
        through: NaiveDate,
    ) -> Result<Decimal, DbErr> {
        let balances: Vec<Decimal> = daily_statements::Entity::find()
            .filter(daily_statements::Column::Date.lte(through))
            .select_only()
            .column(daily_statements::Column::DayBalance)
            .into_tuple()
            .all(conn)
            .await?;
        Ok(rescale_amount(balances.iter().copied().sum()))
    }

    /// Regenerates statements over an inclusive date range, ascending.
    ///
    /// Each date runs as its own recompute transaction; a failure halts
    /// the sweep at that date and reports how far it got. Cancellation
    /// is observed only between dates, so a cancelled sweep still leaves
    /// every completed date consistent.
    ///
    /// At most one sweep runs at a time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` for a backwards range, `SweepInProgress`
    /// when another sweep holds the slot, or `SweepHalted` wrapping the
    /// first per-date failure.
    pub async fn regenerate_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, StatementError> {
        if start > end {
            return Err(StatementError::InvalidRange { start, end });
        }
        let _sweep_guard = self
            .locks
            .try_acquire_sweep()
            .ok_or(StatementError::SweepInProgress)?;

        tracing::info!(%start, %end, "starting statement regeneration sweep");
        let mut completed_through = None;
        let mut date = start;
        loop {
            if cancel.is_cancelled() {
                tracing::info!(?completed_through, "sweep cancelled at date boundary");
                return Ok(SweepReport {
                    start,
                    end,
                    completed_through,
                    cancelled: true,
                });
            }

            let _guard = self.locks.acquire(date).await;
            match self.recompute_unlocked(date).await {
                Ok(_) => completed_through = Some(date),
                Err(err) => {
                    tracing::warn!(%date, error = %err, "sweep halted");
                    return Err(StatementError::SweepHalted {
                        failed_date: date,
                        last_completed: completed_through,
                        source: Box::new(err),
                    });
                }
            }

            match date.succ_opt() {
                Some(next) if next <= end => date = next,
                _ => break,
            }
        }

        tracing::info!(%start, %end, "sweep completed");
        Ok(SweepReport {
            start,
            end,
            completed_through,
            cancelled: false,
        })
    }
}
