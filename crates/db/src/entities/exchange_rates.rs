//! `SeaORM` Entity for the exchange_rates table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One local-to-reference exchange rate per calendar date.
/// Saving an existing date overwrites the rate in place.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    /// Primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// The rate's date; unique.
    #[sea_orm(unique)]
    pub date: Date,
    /// Local-to-reference rate, 4 fractional digits.
    pub rate: Decimal,
    /// Row creation time.
    pub created_at: DateTimeWithTimeZone,
}

/// Entity relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
