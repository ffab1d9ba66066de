//! Validation and calculation errors for the core domain.

use thiserror::Error;

/// Errors that can occur during draft validation or currency math.
///
/// All of these are detected before anything is persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Description is required.
    #[error("Description must not be empty")]
    EmptyDescription,

    /// Local amount is required for non-itemized transactions.
    #[error("Local amount is required")]
    MissingAmount,

    /// Amounts must not be negative.
    #[error("Local amount must not be negative")]
    NegativeAmount,

    /// Line item quantity is required.
    #[error("Line item quantity is required")]
    MissingQuantity,

    /// Line item unit price is required.
    #[error("Line item unit price is required")]
    MissingUnitPrice,

    /// Line item quantity must be positive.
    #[error("Line item quantity must be positive, got {0}")]
    NonPositiveQuantity(i32),

    /// Exchange rate must be positive.
    #[error("Exchange rate must be positive")]
    NonPositiveRate,

    /// Unknown enum value received at the boundary.
    #[error("Unknown {kind} value: {value}")]
    UnknownEnumValue {
        /// Which enum was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}
