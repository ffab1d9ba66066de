//! `SeaORM` Entity for the daily_statements table.
//!
//! Statement rows are derived artifacts: only the statement aggregator
//! writes them, lazily, one per date.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The aggregated statement of one calendar day.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_statements")]
pub struct Model {
    /// Primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// The statement's date; unique.
    #[sea_orm(unique)]
    pub date: Date,
    /// Sum of converted amounts over the day's credit transactions.
    pub total_credits: Decimal,
    /// Sum of converted amounts over the day's debit transactions.
    pub total_debits: Decimal,
    /// Derived: `total_credits - total_debits`.
    pub day_balance: Decimal,
    /// Balance accumulated since inception, as of this date.
    pub accumulated_balance: Decimal,
    /// Row creation time.
    pub created_at: DateTimeWithTimeZone,
    /// Last recompute time.
    pub updated_at: DateTimeWithTimeZone,
}

/// Entity relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
