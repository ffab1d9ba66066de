//! Shared helpers for repository tests.
//!
//! The repositories classify database failures to drive their retry
//! behavior; these constructors build the same error shapes the
//! Postgres driver produces, so the classification and the retry loops
//! can be exercised against a mock connection.

use sea_orm::{DbErr, RuntimeErr};

/// The driver-level error for a rejected duplicate insert.
#[derive(Debug)]
struct DuplicateKey;

impl std::fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("duplicate key value violates unique constraint \"daily_statements_date_key\"")
    }
}

impl std::error::Error for DuplicateKey {}

impl sqlx::error::DatabaseError for DuplicateKey {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint \"daily_statements_date_key\""
    }

    fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
        Some("23505".into())
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }
}

/// A unique constraint violation, the loser's side of an insert race.
pub(crate) fn unique_violation() -> DbErr {
    DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(Box::new(
        DuplicateKey,
    ))))
}

/// An ordinary database failure unrelated to any constraint.
pub(crate) fn connection_reset() -> DbErr {
    DbErr::Query(RuntimeErr::Internal("connection reset by peer".to_owned()))
}
