//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the
//! application. Every mutating operation recomputes the affected daily
//! statements inside the same database transaction as the mutation.

pub mod dashboard;
pub mod exchange_rate;
pub mod line_item;
pub mod statement;
pub mod transaction;

pub use dashboard::{DashboardError, DashboardRepository, MonthSummary, YearSummary};
pub use exchange_rate::{ExchangeRateError, ExchangeRateRepository};
pub use line_item::{LineItemError, LineItemPatch, LineItemRepository};
pub use statement::{StatementError, StatementLocks, StatementRepository, SweepReport};
pub use transaction::{
    CreateTransactionInput, TransactionError, TransactionRepository, TransactionWithItems,
    UpdateTransactionInput,
};

use chrono::NaiveDate;
use sea_orm::{DbErr, RuntimeErr};

/// True when a database error is a lost statement insert race: two
/// writers both saw no row for a date and the unique index on
/// `daily_statements.date` rejected the loser's insert. The mutation
/// retries these a bounded number of times before surfacing a conflict.
pub(crate) fn lost_statement_race(err: &DbErr) -> bool {
    let (DbErr::Conn(RuntimeErr::SqlxError(source))
    | DbErr::Exec(RuntimeErr::SqlxError(source))
    | DbErr::Query(RuntimeErr::SqlxError(source))) = err
    else {
        return false;
    };
    match source {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// First and last day of the given month, or `None` for an invalid period.
pub(crate) fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first
        .checked_add_months(chrono::Months::new(1))?
        .pred_opt()?;
    Some((first, last))
}

/// First and last day of the given year, or `None` for an invalid year.
pub(crate) fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{connection_reset, unique_violation};

    #[test]
    fn test_unique_violation_is_a_lost_race() {
        assert!(lost_statement_race(&unique_violation()));
    }

    #[test]
    fn test_other_failures_are_not_races() {
        assert!(!lost_statement_race(&connection_reset()));
        assert!(!lost_statement_race(&DbErr::Custom("boom".to_owned())));
    }

    #[test]
    fn test_month_bounds() {
        let (first, last) = month_bounds(2026, 2).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());

        let (_, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, last) = month_bounds(2026, 12).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());

        assert!(month_bounds(2026, 0).is_none());
        assert!(month_bounds(2026, 13).is_none());
    }

    #[test]
    fn test_year_bounds() {
        let (first, last) = year_bounds(2026).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }
}
