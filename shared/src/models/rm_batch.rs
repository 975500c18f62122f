//! Raw-material batch ledger
//!
//! `RmBatch.quantity` is a cache of the fold of its transaction log. Every change is
//! an appended transaction; the cache is updated by the same signed delta in the
//! same database transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::validation::{validate_positive_quantity, validate_quantity_storage, MAX_QUANTITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RmTransactionType {
    In,
    Out,
    Adjustment,
}

impl RmTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RmTransactionType::In => "in",
            RmTransactionType::Out => "out",
            RmTransactionType::Adjustment => "adjustment",
        }
    }

    /// Signed delta for a submitted quantity
    ///
    /// IN and OUT take positive magnitudes; ADJUSTMENT is already signed and must be non-zero.
    pub fn signed_delta(&self, quantity: Decimal) -> DomainResult<Decimal> {
        match self {
            RmTransactionType::In => {
                validate_positive_quantity("quantity", quantity)?;
                Ok(quantity)
            }
            RmTransactionType::Out => {
                validate_positive_quantity("quantity", quantity)?;
                Ok(-quantity)
            }
            RmTransactionType::Adjustment if quantity.is_zero() => Err(
                DomainError::validation("quantity", "adjustment must not be zero", quantity),
            ),
            RmTransactionType::Adjustment => {
                validate_quantity_storage("quantity", quantity)?;
                Ok(quantity)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum RmBatchStatus {
    #[default]
    Active,
    Depleted,
}

impl RmBatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RmBatchStatus::Active => "active",
            RmBatchStatus::Depleted => "depleted",
        }
    }

    pub fn for_quantity(quantity: Decimal) -> Self {
        if quantity.is_zero() {
            RmBatchStatus::Depleted
        } else {
            RmBatchStatus::Active
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RmBatch {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub batch_number: String,
    /// Cached fold of the transaction log
    pub quantity: Decimal,
    pub unit: String,
    pub container_id: Option<Uuid>,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub status: RmBatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only ledger row; `quantity` is the signed delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RmBatchTransaction {
    pub id: Uuid,
    pub rm_batch_id: Uuid,
    pub transaction_type: RmTransactionType,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RmBatchWithTransactions {
    #[serde(flatten)]
    pub batch: RmBatch,
    pub transactions: Vec<RmBatchTransaction>,
}

/// Sum of signed deltas
pub fn ledger_balance<'a>(
    transactions: impl IntoIterator<Item = &'a RmBatchTransaction>,
) -> Decimal {
    transactions.into_iter().map(|t| t.quantity).sum()
}

/// Check that a raw-material receipt may post to the batch found (or opened) under lock
pub fn check_receipt_batch(batch: &RmBatch, product_id: Uuid) -> DomainResult<()> {
    if batch.product_id != product_id {
        return Err(DomainError::validation(
            "batch_no",
            "batch belongs to another product",
            &batch.batch_number,
        ));
    }
    Ok(())
}

/// A validated ledger posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPosting {
    pub delta: Decimal,
    pub new_quantity: Decimal,
    pub status: RmBatchStatus,
}

/// Validate a posting against the cached quantity
///
/// The balance may not go negative, nor grow past what the quantity column holds.
pub fn plan_posting(
    current: Decimal,
    transaction_type: RmTransactionType,
    quantity: Decimal,
) -> DomainResult<LedgerPosting> {
    let delta = transaction_type.signed_delta(quantity)?;
    let new_quantity = current + delta;
    if new_quantity < Decimal::ZERO {
        return Err(DomainError::conflict(
            "rm_batch",
            format!(
                "insufficient quantity: {} on hand, {} requested",
                current,
                -delta
            ),
        ));
    }
    if new_quantity > MAX_QUANTITY {
        return Err(DomainError::validation(
            "quantity",
            format!("balance would exceed {}", MAX_QUANTITY),
            quantity,
        ));
    }
    Ok(LedgerPosting {
        delta,
        new_quantity,
        status: RmBatchStatus::for_quantity(new_quantity),
    })
}

/// Cached vs recomputed balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerCheck {
    pub cached: Decimal,
    pub computed: Decimal,
    pub consistent: bool,
}

impl LedgerCheck {
    pub fn new(cached: Decimal, computed: Decimal) -> Self {
        Self {
            cached,
            computed,
            consistent: cached == computed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(kind: RmTransactionType, delta: i64) -> RmBatchTransaction {
        RmBatchTransaction {
            id: Uuid::new_v4(),
            rm_batch_id: Uuid::nil(),
            transaction_type: kind,
            quantity: Decimal::from(delta),
            notes: None,
            product_id: Uuid::nil(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_signed_delta() {
        let five = Decimal::from(5);
        assert_eq!(RmTransactionType::In.signed_delta(five).unwrap(), five);
        assert_eq!(RmTransactionType::Out.signed_delta(five).unwrap(), -five);
        assert_eq!(
            RmTransactionType::Adjustment.signed_delta(Decimal::from(-2)).unwrap(),
            Decimal::from(-2)
        );
        assert!(RmTransactionType::Out.signed_delta(Decimal::from(-5)).is_err());
        assert!(RmTransactionType::Adjustment.signed_delta(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_ledger_balance_folds_deltas() {
        let log = vec![
            tx(RmTransactionType::In, 100),
            tx(RmTransactionType::Out, -30),
            tx(RmTransactionType::Adjustment, -5),
        ];
        assert_eq!(ledger_balance(&log), Decimal::from(65));
        assert_eq!(ledger_balance(Vec::<RmBatchTransaction>::new().iter()), Decimal::ZERO);
    }

    #[test]
    fn test_posting_cannot_go_negative() {
        let err =
            plan_posting(Decimal::from(10), RmTransactionType::Out, Decimal::from(11)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[test]
    fn test_posting_to_zero_depletes() {
        let posting =
            plan_posting(Decimal::from(10), RmTransactionType::Out, Decimal::from(10)).unwrap();
        assert_eq!(posting.new_quantity, Decimal::ZERO);
        assert_eq!(posting.status, RmBatchStatus::Depleted);
    }

    #[test]
    fn test_posting_rejects_unstorable_quantities() {
        let too_fine: Decimal = "0.0004".parse().unwrap();
        let err = plan_posting(Decimal::ZERO, RmTransactionType::In, too_fine).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "quantity"));

        let adjust: Decimal = "-1.0005".parse().unwrap();
        assert!(plan_posting(Decimal::from(10), RmTransactionType::Adjustment, adjust).is_err());
    }

    #[test]
    fn test_posting_balance_bounded_by_column() {
        let err = plan_posting(MAX_QUANTITY, RmTransactionType::In, Decimal::ONE).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation { ref reason, .. } if reason.starts_with("balance")
        ));
        let below_max = MAX_QUANTITY - Decimal::ONE;
        assert!(plan_posting(below_max, RmTransactionType::In, Decimal::ONE).is_ok());
    }

    #[test]
    fn test_ledger_check() {
        assert!(LedgerCheck::new(Decimal::from(3), Decimal::from(3)).consistent);
        assert!(!LedgerCheck::new(Decimal::from(3), Decimal::from(4)).consistent);
    }
}
