//! `SeaORM` entity definitions.

pub mod daily_statements;
pub mod exchange_rates;
pub mod line_items;
pub mod sea_orm_active_enums;
pub mod transactions;
