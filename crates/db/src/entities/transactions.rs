//! `SeaORM` Entity for the transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{Direction, PaymentStatus, PaymentType};

/// A monetary transaction in the local currency with its snapshotted
/// conversion to the reference currency.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Calendar date the transaction belongs to.
    pub date: Date,
    /// Free-form description.
    pub description: String,
    /// Amount in the local currency, 2 fractional digits.
    pub local_amount: Decimal,
    /// Snapshot of the exchange rate at write time, 4 fractional digits.
    pub exchange_rate: Decimal,
    /// Derived: `round_half_up(local_amount / exchange_rate, 2)`.
    pub converted_amount: Decimal,
    /// Credit or debit.
    pub direction: Direction,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Payment type.
    pub payment_type: PaymentType,
    /// Row creation time.
    pub created_at: DateTimeWithTimeZone,
    /// Last update time.
    pub updated_at: DateTimeWithTimeZone,
}

/// Entity relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Line items owned by this transaction.
    #[sea_orm(has_many = "super::line_items::Entity")]
    LineItems,
}

impl Related<super::line_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
