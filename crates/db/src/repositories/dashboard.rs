//! Dashboard read-side repository.
//!
//! Thin aggregation over the daily statements, plus two figures read
//! straight from the transactions: the month's settled credits and its
//! on-account debits. Period boundaries are computed here rather than
//! with SQL date-part extraction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect,
};

use daybook_core::currency::rescale_amount;
use daybook_shared::error::AppError;

use crate::entities::{daily_statements, sea_orm_active_enums, transactions};
use crate::repositories::statement::StatementRepository;
use crate::repositories::{month_bounds, year_bounds};

/// Error types for dashboard queries.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// Requested month does not exist.
    #[error("Invalid period: {year}-{month}")]
    InvalidMonth {
        /// Requested year.
        year: i32,
        /// Requested month (1-12).
        month: u32,
    },

    /// Requested year does not exist.
    #[error("Invalid year: {0}")]
    InvalidYear(i32),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::InvalidMonth { .. } | DashboardError::InvalidYear(_) => {
                Self::Validation(err.to_string())
            }
            DashboardError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// One month's aggregated figures, in the reference currency.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MonthSummary {
    /// Year of the period.
    pub year: i32,
    /// Month of the period (1-12).
    pub month: u32,
    /// Credits over the month.
    pub total_credits: Decimal,
    /// Debits over the month.
    pub total_debits: Decimal,
    /// Credits minus debits over the month.
    pub period_balance: Decimal,
    /// Balance since inception through the month's last day.
    pub accumulated_balance: Decimal,
    /// Credits already settled (payment status paid).
    pub paid_credits: Decimal,
    /// On-account debits (payment type deferred).
    pub deferred_debits: Decimal,
}

/// One year's aggregated figures, in the reference currency.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct YearSummary {
    /// Year of the period.
    pub year: i32,
    /// Credits over the year.
    pub total_credits: Decimal,
    /// Debits over the year.
    pub total_debits: Decimal,
    /// Credits minus debits over the year.
    pub period_balance: Decimal,
    /// Balance since inception through December 31.
    pub accumulated_balance: Decimal,
}

/// Dashboard repository.
#[derive(Debug)]
#[cfg_attr(not(feature = "mock"), derive(Clone))]
pub struct DashboardRepository {
    db: DatabaseConnection,
}

impl DashboardRepository {
    /// Creates a new dashboard repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Aggregates one calendar month.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMonth` for a month outside 1-12, or a database
    /// error.
    pub async fn month_summary(
        &self,
        year: i32,
        month: u32,
    ) -> Result<MonthSummary, DashboardError> {
        let (start, end) =
            month_bounds(year, month).ok_or(DashboardError::InvalidMonth { year, month })?;

        let (total_credits, total_debits, period_balance) =
            self.period_totals(start, end).await?;
        let accumulated_balance =
            StatementRepository::sum_day_balances_through(&self.db, end).await?;

        let paid_credits = self
            .sum_converted(
                start,
                end,
                sea_orm_active_enums::Direction::Credit,
                Some(sea_orm_active_enums::PaymentStatus::Paid),
                None,
            )
            .await?;
        let deferred_debits = self
            .sum_converted(
                start,
                end,
                sea_orm_active_enums::Direction::Debit,
                None,
                Some(sea_orm_active_enums::PaymentType::Deferred),
            )
            .await?;

        Ok(MonthSummary {
            year,
            month,
            total_credits,
            total_debits,
            period_balance,
            accumulated_balance,
            paid_credits,
            deferred_debits,
        })
    }

    /// Aggregates one calendar year.
    ///
    /// # Errors
    ///
    /// Returns `InvalidYear` for a year outside the supported calendar,
    /// or a database error.
    pub async fn year_summary(&self, year: i32) -> Result<YearSummary, DashboardError> {
        let (start, end) = year_bounds(year).ok_or(DashboardError::InvalidYear(year))?;

        let (total_credits, total_debits, period_balance) =
            self.period_totals(start, end).await?;
        let accumulated_balance =
            StatementRepository::sum_day_balances_through(&self.db, end).await?;

        Ok(YearSummary {
            year,
            total_credits,
            total_debits,
            period_balance,
            accumulated_balance,
        })
    }

    /// Sums statement figures over an inclusive date range.
    async fn period_totals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(Decimal, Decimal, Decimal), DbErr> {
        let rows: Vec<(Decimal, Decimal, Decimal)> = daily_statements::Entity::find()
            .filter(daily_statements::Column::Date.gte(start))
            .filter(daily_statements::Column::Date.lte(end))
            .select_only()
            .column(daily_statements::Column::TotalCredits)
            .column(daily_statements::Column::TotalDebits)
            .column(daily_statements::Column::DayBalance)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(sum_period_rows(&rows))
    }

    /// Sums converted amounts of the period's transactions matching the
    /// given direction and optional status or type filters.
    async fn sum_converted(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        direction: sea_orm_active_enums::Direction,
        status: Option<sea_orm_active_enums::PaymentStatus>,
        payment_type: Option<sea_orm_active_enums::PaymentType>,
    ) -> Result<Decimal, DbErr> {
        let mut query = transactions::Entity::find()
            .filter(transactions::Column::Date.gte(start))
            .filter(transactions::Column::Date.lte(end))
            .filter(transactions::Column::Direction.eq(direction));
        if let Some(status) = status {
            query = query.filter(transactions::Column::PaymentStatus.eq(status));
        }
        if let Some(payment_type) = payment_type {
            query = query.filter(transactions::Column::PaymentType.eq(payment_type));
        }

        let amounts: Vec<Decimal> = query
            .select_only()
            .column(transactions::Column::ConvertedAmount)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(rescale_amount(amounts.iter().copied().sum()))
    }
}

/// Sums (credits, debits, day balance) rows into period totals.
#[must_use]
fn sum_period_rows(rows: &[(Decimal, Decimal, Decimal)]) -> (Decimal, Decimal, Decimal) {
    let credits = rescale_amount(rows.iter().map(|(c, _, _)| *c).sum());
    let debits = rescale_amount(rows.iter().map(|(_, d, _)| *d).sum());
    let balance = rescale_amount(rows.iter().map(|(_, _, b)| *b).sum());
    (credits, debits, balance)
}
