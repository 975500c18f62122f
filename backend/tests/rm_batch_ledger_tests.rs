//! Raw-material ledger tests
//!
//! Tests for the RMBatch transaction ledger including:
//! - Property 10: The cached quantity always equals the fold of the log
//! - Property 11: The cached quantity never goes negative

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    ledger_balance, plan_posting, DomainError, LedgerCheck, RmBatchStatus, RmBatchTransaction,
    RmTransactionType,
};
use uuid::Uuid;

fn entry(transaction_type: RmTransactionType, delta: Decimal) -> RmBatchTransaction {
    RmBatchTransaction {
        id: Uuid::new_v4(),
        rm_batch_id: Uuid::nil(),
        transaction_type,
        quantity: delta,
        notes: None,
        product_id: Uuid::nil(),
        created_at: Utc::now(),
    }
}

fn posting_strategy() -> impl Strategy<Value = (RmTransactionType, Decimal)> {
    prop_oneof![
        (1i64..500).prop_map(|q| (RmTransactionType::In, Decimal::new(q, 1))),
        (1i64..500).prop_map(|q| (RmTransactionType::Out, Decimal::new(q, 1))),
        (-200i64..200)
            .prop_filter("adjustments are non-zero", |q| *q != 0)
            .prop_map(|q| (RmTransactionType::Adjustment, Decimal::new(q, 1))),
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 10 and 11: Ledger Fold and Non-Negativity
    /// Applying postings the way the service does (rejecting any that would go
    /// negative) keeps the cache equal to the sum of the appended log.
    #[test]
    fn test_cache_matches_fold(postings in prop::collection::vec(posting_strategy(), 0..50)) {
        let mut cached = Decimal::ZERO;
        let mut log = Vec::new();

        for (transaction_type, quantity) in postings {
            match plan_posting(cached, transaction_type, quantity) {
                Ok(posting) => {
                    log.push(entry(transaction_type, posting.delta));
                    cached = posting.new_quantity;
                    prop_assert_eq!(posting.status, RmBatchStatus::for_quantity(cached));
                }
                Err(DomainError::Conflict { .. }) => {
                    let delta = transaction_type.signed_delta(quantity).unwrap();
                    prop_assert!(cached + delta < Decimal::ZERO);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
            prop_assert!(cached >= Decimal::ZERO);
            prop_assert_eq!(ledger_balance(&log), cached);
        }

        prop_assert!(LedgerCheck::new(cached, ledger_balance(&log)).consistent);
    }

    /// Out postings are stored as negative deltas
    #[test]
    fn test_out_is_negative_delta(q in 1i64..10_000) {
        let quantity = Decimal::from(q);
        let delta = RmTransactionType::Out.signed_delta(quantity).unwrap();
        prop_assert_eq!(delta, -quantity);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_opening_balance_then_issue() {
        let opened =
            plan_posting(Decimal::ZERO, RmTransactionType::In, Decimal::from(100)).unwrap();
        assert_eq!(opened.new_quantity, Decimal::from(100));
        assert_eq!(opened.status, RmBatchStatus::Active);

        let issued =
            plan_posting(opened.new_quantity, RmTransactionType::Out, Decimal::from(100)).unwrap();
        assert_eq!(issued.new_quantity, Decimal::ZERO);
        assert_eq!(issued.status, RmBatchStatus::Depleted);
    }

    #[test]
    fn test_overdraw_is_conflict() {
        let result = plan_posting(Decimal::from(10), RmTransactionType::Out, Decimal::from(11));
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[test]
    fn test_in_and_out_need_positive_magnitudes() {
        assert!(RmTransactionType::In.signed_delta(Decimal::ZERO).is_err());
        assert!(RmTransactionType::Out.signed_delta(Decimal::from(-5)).is_err());
    }

    #[test]
    fn test_adjustment_is_signed() {
        assert_eq!(
            RmTransactionType::Adjustment.signed_delta(Decimal::from(-3)).unwrap(),
            Decimal::from(-3)
        );
        assert!(RmTransactionType::Adjustment.signed_delta(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_verify_detects_drift() {
        let log = vec![
            entry(RmTransactionType::In, Decimal::from(50)),
            entry(RmTransactionType::Out, Decimal::from(-20)),
        ];
        let check = LedgerCheck::new(Decimal::from(35), ledger_balance(&log));
        assert_eq!(check.computed, Decimal::from(30));
        assert!(!check.consistent);
    }
}
