//! Transaction domain types and draft validation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::line_items::{self, LineItemDraft};

/// Whether a transaction adds to or subtracts from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money in.
    Credit,
    /// Money out.
    Debit,
}

/// Payment status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not yet settled.
    Pending,
    /// Settled.
    Paid,
    /// Cancelled; kept for the record.
    Cancelled,
    /// Past its due date.
    Overdue,
}

/// How the transaction is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Paid up front.
    Cash,
    /// On account, usually itemized.
    Deferred,
    /// Paid in installments.
    Installment,
}

impl Direction {
    /// Stable string form used in storage and API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(CoreError::UnknownEnumValue {
                kind: "direction",
                value: other.to_string(),
            }),
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            "overdue" => Ok(Self::Overdue),
            other => Err(CoreError::UnknownEnumValue {
                kind: "payment_status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "deferred" => Ok(Self::Deferred),
            "installment" => Ok(Self::Installment),
            other => Err(CoreError::UnknownEnumValue {
                kind: "payment_type",
                value: other.to_string(),
            }),
        }
    }
}

/// A new transaction before validation and persistence.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    /// Calendar date the transaction belongs to.
    pub date: NaiveDate,
    /// Free-form description.
    pub description: String,
    /// Amount in the local currency; ignored when line items are present.
    pub local_amount: Option<Decimal>,
    /// Credit or debit.
    pub direction: Direction,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Payment type.
    pub payment_type: PaymentType,
    /// Line items for itemized (on-account) transactions.
    pub line_items: Vec<LineItemDraft>,
}

/// Amounts resolved from a validated draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAmounts {
    /// The transaction-level local amount (entered, or derived from items).
    pub local_amount: Decimal,
    /// Derived per-item totals, empty for non-itemized transactions.
    pub item_totals: Vec<Decimal>,
}

/// Validates a draft and resolves its local amount.
///
/// Itemized drafts derive the local amount from their items (the entered
/// amount, if any, is ignored). Plain drafts require a non-negative amount.
///
/// # Errors
///
/// Returns a `CoreError` describing the first validation failure.
pub fn resolve_amounts(draft: &TransactionDraft) -> Result<ResolvedAmounts, CoreError> {
    if draft.description.trim().is_empty() {
        return Err(CoreError::EmptyDescription);
    }

    if draft.line_items.is_empty() {
        let local_amount = draft.local_amount.ok_or(CoreError::MissingAmount)?;
        if local_amount < Decimal::ZERO {
            return Err(CoreError::NegativeAmount);
        }
        Ok(ResolvedAmounts {
            local_amount,
            item_totals: Vec::new(),
        })
    } else {
        let itemized = line_items::aggregate(&draft.line_items)?;
        Ok(ResolvedAmounts {
            local_amount: itemized.transaction_total,
            item_totals: itemized.item_totals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn base_draft() -> TransactionDraft {
        TransactionDraft {
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            description: "Office supplies".to_string(),
            local_amount: Some(dec!(100.00)),
            direction: Direction::Debit,
            payment_status: PaymentStatus::Paid,
            payment_type: PaymentType::Cash,
            line_items: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_plain_amount() {
        let resolved = resolve_amounts(&base_draft()).unwrap();
        assert_eq!(resolved.local_amount, dec!(100.00));
        assert!(resolved.item_totals.is_empty());
    }

    #[test]
    fn test_resolve_itemized_derives_amount() {
        let mut draft = base_draft();
        draft.local_amount = None;
        draft.payment_type = PaymentType::Deferred;
        draft.line_items = vec![
            LineItemDraft {
                description: "widget".to_string(),
                quantity: Some(2),
                unit_price: Some(dec!(5.00)),
            },
            LineItemDraft {
                description: "gadget".to_string(),
                quantity: Some(1),
                unit_price: Some(dec!(3.00)),
            },
        ];

        let resolved = resolve_amounts(&draft).unwrap();
        assert_eq!(resolved.local_amount, dec!(13.00));
        assert_eq!(resolved.item_totals, vec![dec!(10.00), dec!(3.00)]);
    }

    #[test]
    fn test_itemized_ignores_entered_amount() {
        let mut draft = base_draft();
        draft.local_amount = Some(dec!(999.99));
        draft.line_items = vec![LineItemDraft {
            description: "widget".to_string(),
            quantity: Some(3),
            unit_price: Some(dec!(12.50)),
        }];

        let resolved = resolve_amounts(&draft).unwrap();
        assert_eq!(resolved.local_amount, dec!(37.50));
    }

    #[test]
    fn test_missing_amount_rejected() {
        let mut draft = base_draft();
        draft.local_amount = None;
        assert_eq!(resolve_amounts(&draft), Err(CoreError::MissingAmount));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut draft = base_draft();
        draft.local_amount = Some(dec!(-1.00));
        assert_eq!(resolve_amounts(&draft), Err(CoreError::NegativeAmount));
    }

    #[test]
    fn test_blank_description_rejected() {
        let mut draft = base_draft();
        draft.description = " ".to_string();
        assert_eq!(resolve_amounts(&draft), Err(CoreError::EmptyDescription));
    }

    #[test]
    fn test_invalid_item_rejected() {
        let mut draft = base_draft();
        draft.line_items = vec![LineItemDraft {
            description: "widget".to_string(),
            quantity: None,
            unit_price: Some(dec!(5.00)),
        }];
        assert_eq!(resolve_amounts(&draft), Err(CoreError::MissingQuantity));
    }

    #[test]
    fn test_enum_round_trips() {
        assert_eq!(Direction::from_str("credit").unwrap(), Direction::Credit);
        assert_eq!(Direction::from_str("DEBIT").unwrap(), Direction::Debit);
        assert!(Direction::from_str("transfer").is_err());

        assert_eq!(
            PaymentStatus::from_str("overdue").unwrap(),
            PaymentStatus::Overdue
        );
        assert!(PaymentStatus::from_str("unknown").is_err());

        assert_eq!(
            PaymentType::from_str("installment").unwrap(),
            PaymentType::Installment
        );
        assert!(PaymentType::from_str("credit_card").is_err());
    }
}
