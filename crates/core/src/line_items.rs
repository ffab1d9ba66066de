//! Itemized transaction totals.
//!
//! Deferred ("on-account") transactions are composed of line items; the
//! transaction-level local amount is always derived from the items, never
//! entered directly.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::currency::AMOUNT_SCALE;
use crate::error::CoreError;

/// Incoming line item data, before validation.
///
/// Quantity and unit price are optional at the boundary so a missing field
/// is reported as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemDraft {
    /// What the item is.
    pub description: String,
    /// How many units.
    pub quantity: Option<i32>,
    /// Price per unit, 2 fractional digits.
    pub unit_price: Option<Decimal>,
}

/// Totals derived from a set of line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemizedTotal {
    /// Per-item totals, in input order.
    pub item_totals: Vec<Decimal>,
    /// Sum of all item totals; becomes the transaction's local amount.
    pub transaction_total: Decimal,
}

/// Computes a single item's total: `quantity * unit_price`, rounded
/// half-up to 2 decimals when the multiplication carries excess precision.
#[must_use]
pub fn item_total(quantity: i32, unit_price: Decimal) -> Decimal {
    (Decimal::from(quantity) * unit_price)
        .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Validates a single draft, returning its (quantity, unit price) pair.
///
/// # Errors
///
/// Returns a `CoreError` if the description is blank, quantity or unit
/// price is missing, or quantity is not positive.
pub fn validate_item(item: &LineItemDraft) -> Result<(i32, Decimal), CoreError> {
    if item.description.trim().is_empty() {
        return Err(CoreError::EmptyDescription);
    }
    let quantity = item.quantity.ok_or(CoreError::MissingQuantity)?;
    if quantity <= 0 {
        return Err(CoreError::NonPositiveQuantity(quantity));
    }
    let unit_price = item.unit_price.ok_or(CoreError::MissingUnitPrice)?;
    Ok((quantity, unit_price))
}

/// Validates every draft and computes per-item totals plus the
/// transaction-level sum.
///
/// # Errors
///
/// Returns the first item's validation error; no partial result is produced.
pub fn aggregate(items: &[LineItemDraft]) -> Result<ItemizedTotal, CoreError> {
    let mut item_totals = Vec::with_capacity(items.len());
    let mut transaction_total = Decimal::ZERO;

    for item in items {
        let (quantity, unit_price) = validate_item(item)?;
        let total = item_total(quantity, unit_price);
        transaction_total += total;
        item_totals.push(total);
    }

    Ok(ItemizedTotal {
        item_totals,
        transaction_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(description: &str, quantity: Option<i32>, unit_price: Option<Decimal>) -> LineItemDraft {
        LineItemDraft {
            description: description.to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn test_item_total() {
        assert_eq!(item_total(3, dec!(12.50)), dec!(37.50));
        assert_eq!(item_total(1, dec!(0.00)), dec!(0.00));
    }

    #[test]
    fn test_aggregate_sums_items() {
        let items = vec![
            draft("widget", Some(2), Some(dec!(5.00))),
            draft("gadget", Some(1), Some(dec!(3.00))),
        ];
        let result = aggregate(&items).unwrap();
        assert_eq!(result.item_totals, vec![dec!(10.00), dec!(3.00)]);
        assert_eq!(result.transaction_total, dec!(13.00));
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        let result = aggregate(&[]).unwrap();
        assert!(result.item_totals.is_empty());
        assert_eq!(result.transaction_total, Decimal::ZERO);
    }

    #[test]
    fn test_missing_quantity_rejected() {
        let items = vec![draft("widget", None, Some(dec!(5.00)))];
        assert_eq!(aggregate(&items), Err(CoreError::MissingQuantity));
    }

    #[test]
    fn test_missing_unit_price_rejected() {
        let items = vec![draft("widget", Some(2), None)];
        assert_eq!(aggregate(&items), Err(CoreError::MissingUnitPrice));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let items = vec![draft("widget", Some(0), Some(dec!(5.00)))];
        assert_eq!(aggregate(&items), Err(CoreError::NonPositiveQuantity(0)));

        let items = vec![draft("widget", Some(-3), Some(dec!(5.00)))];
        assert_eq!(aggregate(&items), Err(CoreError::NonPositiveQuantity(-3)));
    }

    #[test]
    fn test_blank_description_rejected() {
        let items = vec![draft("  ", Some(1), Some(dec!(5.00)))];
        assert_eq!(aggregate(&items), Err(CoreError::EmptyDescription));
    }

    #[test]
    fn test_validation_stops_before_any_total() {
        // Second item is invalid: the whole aggregation fails.
        let items = vec![
            draft("ok", Some(1), Some(dec!(1.00))),
            draft("bad", Some(-1), Some(dec!(1.00))),
        ];
        assert!(aggregate(&items).is_err());
    }
}
