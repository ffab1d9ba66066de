//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions for data access
//! - Database migrations
//! - The per-date statement lock table

pub mod entities;
pub mod migration;
pub mod repositories;
#[cfg(test)]
mod test_utils;

pub use repositories::{
    DashboardRepository, ExchangeRateRepository, LineItemRepository, StatementLocks,
    StatementRepository, TransactionRepository,
};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use daybook_shared::config::DatabaseConfig;

/// Establishes a connection pool to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections);
    Database::connect(options).await
}
