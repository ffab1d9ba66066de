//! Exchange rate repository.
//!
//! One local-to-reference rate per calendar date. Transactions snapshot
//! the rate at write time, so editing a stored rate never rewrites
//! existing transactions.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Insert, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use daybook_core::currency::rescale_rate;
use daybook_shared::error::AppError;

use crate::entities::exchange_rates;

/// Error types for exchange rate operations.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeRateError {
    /// Rate must be positive.
    #[error("Exchange rate must be positive")]
    NonPositiveRate,

    /// No rate stored for the requested date.
    #[error("No exchange rate found for {0}")]
    NotFound(NaiveDate),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<ExchangeRateError> for AppError {
    fn from(err: ExchangeRateError) -> Self {
        match err {
            ExchangeRateError::NonPositiveRate => Self::Validation(err.to_string()),
            ExchangeRateError::NotFound(_) => Self::NotFound(err.to_string()),
            ExchangeRateError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// Exchange rate repository for CRUD operations.
#[derive(Debug)]
#[cfg_attr(not(feature = "mock"), derive(Clone))]
pub struct ExchangeRateRepository {
    db: DatabaseConnection,
}

impl ExchangeRateRepository {
    /// Creates a new exchange rate repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates or updates the rate for a date (upsert behavior).
    ///
    /// The insert lands `ON CONFLICT (date) DO UPDATE`, so concurrent
    /// saves of the same date resolve in the database with the last
    /// writer winning, and a date that already has a rate keeps its
    /// original `created_at`. Already-stored transactions are not
    /// touched; they carry their own snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate is not positive or the database
    /// operation fails.
    pub async fn upsert(
        &self,
        date: NaiveDate,
        rate: Decimal,
    ) -> Result<exchange_rates::Model, ExchangeRateError> {
        if rate <= Decimal::ZERO {
            return Err(ExchangeRateError::NonPositiveRate);
        }
        let saved = upsert_query(date, rescale_rate(rate))
            .exec_with_returning(&self.db)
            .await?;
        Ok(saved)
    }

    /// Finds the rate stored exactly on the given date.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no rate is stored for that date.
    pub async fn get(&self, date: NaiveDate) -> Result<exchange_rates::Model, ExchangeRateError> {
        exchange_rates::Entity::find()
            .filter(exchange_rates::Column::Date.eq(date))
            .one(&self.db)
            .await?
            .ok_or(ExchangeRateError::NotFound(date))
    }

    /// Finds the most recent rate on or before the given date.
    ///
    /// This is the rate a transaction on `date` snapshots when the
    /// caller does not provide one explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn most_recent_on_or_before(
        &self,
        date: NaiveDate,
    ) -> Result<Option<exchange_rates::Model>, ExchangeRateError> {
        Ok(most_recent_on_or_before_in(&self.db, date).await?)
    }

    /// Returns the most recently dated rate, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn latest(&self) -> Result<Option<exchange_rates::Model>, ExchangeRateError> {
        let rate = exchange_rates::Entity::find()
            .order_by_desc(exchange_rates::Column::Date)
            .one(&self.db)
            .await?;
        Ok(rate)
    }

    /// Lists rates within an inclusive date range, ascending by date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<exchange_rates::Model>, ExchangeRateError> {
        let rates = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::Date.gte(start))
            .filter(exchange_rates::Column::Date.lte(end))
            .order_by_asc(exchange_rates::Column::Date)
            .all(&self.db)
            .await?;
        Ok(rates)
    }

    /// Deletes the rate stored on the given date.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no rate is stored for that date.
    pub async fn delete(&self, date: NaiveDate) -> Result<(), ExchangeRateError> {
        let existing = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::Date.eq(date))
            .one(&self.db)
            .await?
            .ok_or(ExchangeRateError::NotFound(date))?;
        existing.delete(&self.db).await?;
        Ok(())
    }
}

/// Insert-or-update statement for one date's rate.
fn upsert_query(date: NaiveDate, rate: Decimal) -> Insert<exchange_rates::ActiveModel> {
    let model = exchange_rates::ActiveModel {
        id: Set(Uuid::new_v4()),
        date: Set(date),
        rate: Set(rate),
        created_at: Set(chrono::Utc::now().into()),
    };
    exchange_rates::Entity::insert(model).on_conflict(
        OnConflict::column(exchange_rates::Column::Date)
            .update_column(exchange_rates::Column::Rate)
            .to_owned(),
    )
}

/// Finds the most recent rate on or before a date on any connection.
///
/// Shared with the transaction mutation path, which resolves the
/// snapshot rate when the caller does not provide one.
pub(crate) async fn most_recent_on_or_before_in<C: ConnectionTrait>(
    conn: &C,
    date: NaiveDate,
) -> Result<Option<exchange_rates::Model>, DbErr> {
    exchange_rates::Entity::find()
        .filter(exchange_rates::Column::Date.lte(date))
        .order_by_desc(exchange_rates::Column::Date)
        .one(conn)
        .await
}

// ============================================================================
// Pure lookup functions for property testing
// ============================================================================

/// Simulates the on-or-before rate resolution (pure function for testing).
#[must_use]
pub fn simulate_rate_resolution(
    stored_rates: &[(NaiveDate, Decimal)],
    date: NaiveDate,
) -> Option<Decimal> {
    stored_rates
        .iter()
        .filter(|(d, _)| *d <= date)
        .max_by_key(|(d, _)| *d)
        .map(|(_, r)| *r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_upsert_resolves_date_conflicts_in_the_database() {
        use sea_orm::{DatabaseBackend, QueryTrait};

        let sql = upsert_query(d(2026, 1, 10), dec!(3.3333))
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("ON CONFLICT (\"date\")"));
        assert!(sql.contains("\"rate\" = \"excluded\".\"rate\""));
    }

    #[test]
    fn test_most_recent_rate_wins() {
        let stored = vec![
            (d(2026, 1, 1), dec!(3.2000)),
            (d(2026, 1, 10), dec!(3.3333)),
            (d(2026, 1, 20), dec!(3.5000)),
        ];

        // Jan 15 resolves to the Jan 10 rate, not the future Jan 20 one.
        assert_eq!(
            simulate_rate_resolution(&stored, d(2026, 1, 15)),
            Some(dec!(3.3333))
        );
    }

    #[test]
    fn test_exact_date_match() {
        let stored = vec![(d(2026, 1, 10), dec!(3.3333))];
        assert_eq!(
            simulate_rate_resolution(&stored, d(2026, 1, 10)),
            Some(dec!(3.3333))
        );
    }

    #[test]
    fn test_no_rate_before_date() {
        let stored = vec![(d(2026, 1, 10), dec!(3.3333))];
        assert_eq!(simulate_rate_resolution(&stored, d(2026, 1, 9)), None);
        assert_eq!(simulate_rate_resolution(&[], d(2026, 1, 9)), None);
    }

    proptest! {
        /// The resolved rate always comes from a stored date on or
        /// before the lookup date, and no stored date in that window is
        /// more recent than the chosen one.
        #[test]
        fn prop_resolution_picks_latest_eligible(
            days in prop::collection::vec(0i64..3650, 0..20),
            lookup_offset in 0i64..3650,
        ) {
            let epoch = d(2020, 1, 1);
            let stored: Vec<(NaiveDate, Decimal)> = days
                .iter()
                .map(|&n| (epoch + chrono::Days::new(u64::try_from(n).unwrap()), Decimal::new(n + 1, 4)))
                .collect();
            let lookup = epoch + chrono::Days::new(u64::try_from(lookup_offset).unwrap());

            let resolved = simulate_rate_resolution(&stored, lookup);
            let best = stored.iter().filter(|(sd, _)| *sd <= lookup).map(|(sd, _)| *sd).max();

            match (resolved, best) {
                (None, None) => {}
                (Some(rate), Some(best_date)) => {
                    let expected = stored
                        .iter()
                        .find(|(sd, _)| *sd == best_date)
                        .map(|(_, r)| *r)
                        .unwrap();
                    prop_assert_eq!(rate, expected);
                }
                (resolved, best) => {
                    prop_assert!(false, "mismatch: resolved={resolved:?} best={best:?}");
                }
            }
        }
    }
}
