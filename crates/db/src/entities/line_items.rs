//! `SeaORM` Entity for the line_items table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One itemized line of a transaction. Cannot exist without its owning
/// transaction; deleted with it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "line_items")]
pub struct Model {
    /// Primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// The owning transaction.
    pub transaction_id: Uuid,
    /// What the item is.
    pub description: String,
    /// How many units, always positive.
    pub quantity: i32,
    /// Price per unit, 2 fractional digits.
    pub unit_price: Decimal,
    /// Derived: `quantity * unit_price`, 2 fractional digits.
    pub total: Decimal,
}

/// Entity relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The owning transaction.
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id"
    )]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
