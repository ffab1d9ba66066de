//! Core business logic for Daybook.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `currency` - Local-to-reference currency conversion with fixed rounding
//! - `line_items` - Itemized transaction totals (quantity x unit price)
//! - `transaction` - Transaction domain types and draft validation
//! - `statement` - Daily statement math and the in-memory aggregation model

pub mod currency;
pub mod error;
pub mod line_items;
pub mod statement;
pub mod transaction;

pub use error::CoreError;
