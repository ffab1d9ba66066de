//! Daily statement math and the in-memory aggregation model.
//!
//! A statement is a derived, day-indexed row: total credits, total debits,
//! the day's balance and the balance accumulated since inception. The
//! accumulated balance is always recomputed by summing persisted day
//! balances up to the previous day - never read from a cached running total
//! on a neighboring row - so recomputing any single date never requires
//! writing any other date's statement. Mutations arriving out of
//! chronological order therefore stay cheap and correct.
//!
//! The `StatementBook` model in this module is the exact in-memory
//! counterpart of the persistence-layer aggregator and is what the unit and
//! property tests exercise.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::transaction::Direction;

/// The derived totals of one day's statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementTotals {
    /// Sum of converted amounts over the day's credit transactions.
    pub total_credits: Decimal,
    /// Sum of converted amounts over the day's debit transactions.
    pub total_debits: Decimal,
    /// `total_credits - total_debits`.
    pub day_balance: Decimal,
    /// Accumulated balance as of this date (inclusive).
    pub accumulated_balance: Decimal,
}

impl StatementTotals {
    /// An all-zero statement, as produced for a day with no transactions
    /// and no prior history.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            total_credits: Decimal::ZERO,
            total_debits: Decimal::ZERO,
            day_balance: Decimal::ZERO,
            accumulated_balance: Decimal::ZERO,
        }
    }
}

/// Splits a day's converted amounts into credit and debit totals.
#[must_use]
pub fn day_totals<I>(amounts: I) -> (Decimal, Decimal)
where
    I: IntoIterator<Item = (Direction, Decimal)>,
{
    let mut credits = Decimal::ZERO;
    let mut debits = Decimal::ZERO;
    for (direction, converted) in amounts {
        match direction {
            Direction::Credit => credits += converted,
            Direction::Debit => debits += converted,
        }
    }
    (credits, debits)
}

/// Assembles a statement from the day's totals and the accumulated balance
/// of the previous day.
#[must_use]
pub fn compute(
    total_credits: Decimal,
    total_debits: Decimal,
    accumulated_before: Decimal,
) -> StatementTotals {
    let day_balance = total_credits - total_debits;
    StatementTotals {
        total_credits,
        total_debits,
        day_balance,
        accumulated_balance: accumulated_before + day_balance,
    }
}

/// One persisted transaction, reduced to the facts the aggregator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionFact {
    /// The date the transaction belongs to.
    pub date: NaiveDate,
    /// Credit or debit.
    pub direction: Direction,
    /// Converted (reference-currency) amount, 2 fractional digits.
    pub converted_amount: Decimal,
}

/// The in-memory statement store: one row per date, ordered by date.
pub type StatementBook = BTreeMap<NaiveDate, StatementTotals>;

/// Sum of `day_balance` over all statements with date <= `through`.
///
/// This is computed freshly on each call; stale rows for other dates do not
/// get repaired here, exactly as in the persistence layer.
#[must_use]
pub fn accumulated_as_of(book: &StatementBook, through: NaiveDate) -> Decimal {
    book.range(..=through).map(|(_, s)| s.day_balance).sum()
}

/// Recomputes the statement for a single date from the fact list and the
/// book's prior-day balances, then stores it.
///
/// Idempotent: calling twice with unchanged facts yields identical output.
/// Safe for a date with zero transactions (produces zero totals that still
/// participate in later accumulated balances).
pub fn recompute_day(
    facts: &[TransactionFact],
    book: &mut StatementBook,
    date: NaiveDate,
) -> StatementTotals {
    let (total_credits, total_debits) = day_totals(
        facts
            .iter()
            .filter(|f| f.date == date)
            .map(|f| (f.direction, f.converted_amount)),
    );

    let accumulated_before = date
        .pred_opt()
        .map_or(Decimal::ZERO, |prev| accumulated_as_of(book, prev));

    let statement = compute(total_credits, total_debits, accumulated_before);
    book.insert(date, statement);
    statement
}

/// Regenerates statements for every date in `[start, end]`, ascending.
///
/// Ascending order matters: the accumulated balance of date N reads the
/// stored day balances of dates < N, which this walk may itself be fixing.
pub fn regenerate_range(
    facts: &[TransactionFact],
    book: &mut StatementBook,
    start: NaiveDate,
    end: NaiveDate,
) {
    let mut date = start;
    while date <= end {
        recompute_day(facts, book, date);
        let Some(next) = date.succ_opt() else { break };
        date = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn credit(day: u32, amount: Decimal) -> TransactionFact {
        TransactionFact {
            date: d(day),
            direction: Direction::Credit,
            converted_amount: amount,
        }
    }

    fn debit(day: u32, amount: Decimal) -> TransactionFact {
        TransactionFact {
            date: d(day),
            direction: Direction::Debit,
            converted_amount: amount,
        }
    }

    #[test]
    fn test_day_totals_split_by_direction() {
        let (credits, debits) = day_totals(vec![
            (Direction::Credit, dec!(100.00)),
            (Direction::Debit, dec!(40.00)),
            (Direction::Credit, dec!(10.50)),
        ]);
        assert_eq!(credits, dec!(110.50));
        assert_eq!(debits, dec!(40.00));
    }

    #[test]
    fn test_compute_statement() {
        let s = compute(dec!(100.00), dec!(30.00), dec!(5.00));
        assert_eq!(s.day_balance, dec!(70.00));
        assert_eq!(s.accumulated_balance, dec!(75.00));
    }

    #[test]
    fn test_recompute_single_credit_day() {
        let facts = vec![credit(10, dec!(100.00))];
        let mut book = StatementBook::new();

        let s = recompute_day(&facts, &mut book, d(10));
        assert_eq!(s.total_credits, dec!(100.00));
        assert_eq!(s.total_debits, Decimal::ZERO);
        assert_eq!(s.day_balance, dec!(100.00));
        assert_eq!(s.accumulated_balance, dec!(100.00));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let facts = vec![credit(10, dec!(100.00)), debit(10, dec!(25.50))];
        let mut book = StatementBook::new();

        let first = recompute_day(&facts, &mut book, d(10));
        let second = recompute_day(&facts, &mut book, d(10));
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_transaction_day_carries_balance_forward() {
        let facts = vec![credit(10, dec!(100.00))];
        let mut book = StatementBook::new();
        recompute_day(&facts, &mut book, d(10));

        let s = recompute_day(&facts, &mut book, d(11));
        assert_eq!(s.total_credits, Decimal::ZERO);
        assert_eq!(s.total_debits, Decimal::ZERO);
        assert_eq!(s.day_balance, Decimal::ZERO);
        assert_eq!(s.accumulated_balance, dec!(100.00));
    }

    #[test]
    fn test_delete_returns_day_to_zero() {
        let facts = vec![credit(9, dec!(40.00)), credit(10, dec!(100.00))];
        let mut book = StatementBook::new();
        recompute_day(&facts, &mut book, d(9));
        recompute_day(&facts, &mut book, d(10));

        // The day-10 transaction goes away; recompute brings the statement
        // back to zero totals and the prior day's accumulated balance.
        let remaining = vec![credit(9, dec!(40.00))];
        let s = recompute_day(&remaining, &mut book, d(10));
        assert_eq!(s.total_credits, Decimal::ZERO);
        assert_eq!(s.day_balance, Decimal::ZERO);
        assert_eq!(s.accumulated_balance, dec!(40.00));
    }

    #[test]
    fn test_date_move_affects_exactly_one_of_each() {
        let mut facts = vec![credit(5, dec!(100.00)), debit(12, dec!(20.00))];
        let mut book = StatementBook::new();
        regenerate_range(&facts, &mut book, d(5), d(12));

        // Move the credit from day 5 to day 8: recompute both dates,
        // then regenerate everything at or after the earlier date.
        facts[0].date = d(8);
        recompute_day(&facts, &mut book, d(5));
        recompute_day(&facts, &mut book, d(8));
        regenerate_range(&facts, &mut book, d(5), d(12));

        assert_eq!(book[&d(5)].total_credits, Decimal::ZERO);
        assert_eq!(book[&d(8)].total_credits, dec!(100.00));
        assert_eq!(book[&d(8)].accumulated_balance, dec!(100.00));
        assert_eq!(book[&d(12)].accumulated_balance, dec!(80.00));
    }

    #[test]
    fn test_out_of_order_correction_then_sweep() {
        // Statements exist for days 1..=4, then a correction lands on day 2.
        let mut facts = vec![
            credit(1, dec!(10.00)),
            credit(2, dec!(10.00)),
            credit(3, dec!(10.00)),
            credit(4, dec!(10.00)),
        ];
        let mut book = StatementBook::new();
        regenerate_range(&facts, &mut book, d(1), d(4));
        assert_eq!(book[&d(4)].accumulated_balance, dec!(40.00));

        facts[1].converted_amount = dec!(50.00);
        recompute_day(&facts, &mut book, d(2));
        // Later rows are stale until the sweep runs.
        assert_eq!(book[&d(2)].accumulated_balance, dec!(60.00));
        regenerate_range(&facts, &mut book, d(3), d(4));
        assert_eq!(book[&d(4)].accumulated_balance, dec!(80.00));
    }

    #[test]
    fn test_regenerate_matches_manual_ascending_calls() {
        let facts = vec![
            credit(1, dec!(10.00)),
            debit(2, dec!(3.00)),
            credit(4, dec!(7.25)),
        ];

        let mut swept = StatementBook::new();
        regenerate_range(&facts, &mut swept, d(1), d(5));

        let mut manual = StatementBook::new();
        for day in 1..=5 {
            recompute_day(&facts, &mut manual, d(day));
        }

        assert_eq!(swept, manual);
    }

    // ========================================================================
    // Property tests over the aggregation model
    // ========================================================================

    fn fact_strategy() -> impl Strategy<Value = TransactionFact> {
        (1u32..29u32, any::<bool>(), 0i64..1_000_000i64).prop_map(|(day, is_credit, cents)| {
            TransactionFact {
                date: d(day),
                direction: if is_credit {
                    Direction::Credit
                } else {
                    Direction::Debit
                },
                converted_amount: Decimal::new(cents, 2),
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Recomputing any date twice with unchanged facts is a no-op.
        #[test]
        fn prop_recompute_idempotent(
            facts in prop::collection::vec(fact_strategy(), 0..20),
            day in 1u32..29u32,
        ) {
            let mut book = StatementBook::new();
            regenerate_range(&facts, &mut book, d(1), d(28));

            let first = recompute_day(&facts, &mut book, d(day));
            let second = recompute_day(&facts, &mut book, d(day));
            prop_assert_eq!(first, second);
        }

        /// Over a contiguous regenerated range, the sum of day balances
        /// equals the accumulated-balance difference across the range.
        #[test]
        fn prop_additivity_over_range(
            facts in prop::collection::vec(fact_strategy(), 0..20),
            bounds in (1u32..29u32, 1u32..29u32),
        ) {
            let (a, b) = (bounds.0.min(bounds.1), bounds.0.max(bounds.1));
            let mut book = StatementBook::new();
            regenerate_range(&facts, &mut book, d(1), d(28));

            let sum: Decimal = book
                .range(d(a)..=d(b))
                .map(|(_, s)| s.day_balance)
                .sum();

            let acc_b = accumulated_as_of(&book, d(b));
            let acc_before_a = d(a)
                .pred_opt()
                .map_or(Decimal::ZERO, |prev| accumulated_as_of(&book, prev));

            prop_assert_eq!(sum, acc_b - acc_before_a);
        }

        /// A full sweep produces the same book as manual ascending calls,
        /// regardless of what stale state was in the book beforehand.
        #[test]
        fn prop_sweep_equals_manual(
            facts in prop::collection::vec(fact_strategy(), 0..20),
            stale in prop::collection::vec(fact_strategy(), 0..20),
        ) {
            // Seed both books with statements derived from different facts,
            // simulating a history of corrections.
            let mut swept = StatementBook::new();
            regenerate_range(&stale, &mut swept, d(1), d(28));
            let mut manual = swept.clone();

            regenerate_range(&facts, &mut swept, d(1), d(28));
            for day in 1..=28 {
                recompute_day(&facts, &mut manual, d(day));
            }

            prop_assert_eq!(swept, manual);
        }

        /// Accumulated balance at the final date equals the plain sum of
        /// all converted credits minus debits.
        #[test]
        fn prop_accumulated_equals_net_of_facts(
            facts in prop::collection::vec(fact_strategy(), 0..20),
        ) {
            let mut book = StatementBook::new();
            regenerate_range(&facts, &mut book, d(1), d(28));

            let net: Decimal = facts
                .iter()
                .map(|f| match f.direction {
                    Direction::Credit => f.converted_amount,
                    Direction::Debit => -f.converted_amount,
                })
                .sum();

            prop_assert_eq!(accumulated_as_of(&book, d(28)), net);
        }
    }
}
