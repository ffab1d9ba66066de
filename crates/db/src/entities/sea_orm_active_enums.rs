//! Active enums backing the Postgres enum columns.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Credit or debit, as stored in the `direction` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "direction")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money in.
    #[sea_orm(string_value = "credit")]
    Credit,
    /// Money out.
    #[sea_orm(string_value = "debit")]
    Debit,
}

/// Payment status, as stored in the `payment_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_status")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not yet settled.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Settled.
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Cancelled; kept for the record.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Past its due date.
    #[sea_orm(string_value = "overdue")]
    Overdue,
}

/// Payment type, as stored in the `payment_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_type")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Paid up front.
    #[sea_orm(string_value = "cash")]
    Cash,
    /// On account, usually itemized.
    #[sea_orm(string_value = "deferred")]
    Deferred,
    /// Paid in installments.
    #[sea_orm(string_value = "installment")]
    Installment,
}

impl From<daybook_core::transaction::Direction> for Direction {
    fn from(value: daybook_core::transaction::Direction) -> Self {
        match value {
            daybook_core::transaction::Direction::Credit => Self::Credit,
            daybook_core::transaction::Direction::Debit => Self::Debit,
        }
    }
}

impl From<Direction> for daybook_core::transaction::Direction {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Credit => Self::Credit,
            Direction::Debit => Self::Debit,
        }
    }
}

impl From<daybook_core::transaction::PaymentStatus> for PaymentStatus {
    fn from(value: daybook_core::transaction::PaymentStatus) -> Self {
        match value {
            daybook_core::transaction::PaymentStatus::Pending => Self::Pending,
            daybook_core::transaction::PaymentStatus::Paid => Self::Paid,
            daybook_core::transaction::PaymentStatus::Cancelled => Self::Cancelled,
            daybook_core::transaction::PaymentStatus::Overdue => Self::Overdue,
        }
    }
}

impl From<PaymentStatus> for daybook_core::transaction::PaymentStatus {
    fn from(value: PaymentStatus) -> Self {
        match value {
            PaymentStatus::Pending => Self::Pending,
            PaymentStatus::Paid => Self::Paid,
            PaymentStatus::Cancelled => Self::Cancelled,
            PaymentStatus::Overdue => Self::Overdue,
        }
    }
}

impl From<daybook_core::transaction::PaymentType> for PaymentType {
    fn from(value: daybook_core::transaction::PaymentType) -> Self {
        match value {
            daybook_core::transaction::PaymentType::Cash => Self::Cash,
            daybook_core::transaction::PaymentType::Deferred => Self::Deferred,
            daybook_core::transaction::PaymentType::Installment => Self::Installment,
        }
    }
}

impl From<PaymentType> for daybook_core::transaction::PaymentType {
    fn from(value: PaymentType) -> Self {
        match value {
            PaymentType::Cash => Self::Cash,
            PaymentType::Deferred => Self::Deferred,
            PaymentType::Installment => Self::Installment,
        }
    }
}
