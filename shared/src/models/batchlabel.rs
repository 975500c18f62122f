//! Batchlabel (production run) models and sticker accounting

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Production status of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    #[default]
    Planned,
    InProduction,
    Completed,
    Cancelled,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Planned => "planned",
            ProcessStatus::InProduction => "in_production",
            ProcessStatus::Completed => "completed",
            ProcessStatus::Cancelled => "cancelled",
        }
    }
}

/// A production run from which stickers are issued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Batchlabel {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub batch_no: String,
    pub batch_date: NaiveDate,
    pub po_category: String,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub machine_id: Uuid,
    pub job_order_id: Option<Uuid>,
    pub job_order_item_id: Option<Uuid>,
    pub unit: String,
    pub unit_weight: Option<Decimal>,
    pub target_quantity: Decimal,
    pub package_quantity: Decimal,
    pub process_status: ProcessStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batchlabel {
    pub fn required_sticker_count(&self) -> i64 {
        required_sticker_count(self.target_quantity, self.package_quantity)
    }
}

/// `floor(target / package)`, or 0 when the package quantity is not positive
pub fn required_sticker_count(target_quantity: Decimal, package_quantity: Decimal) -> i64 {
    if package_quantity <= Decimal::ZERO || target_quantity <= Decimal::ZERO {
        return 0;
    }
    (target_quantity / package_quantity)
        .floor()
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Printed vs required sticker counts for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerIssuance {
    pub labels_to_print: i64,
    pub total_printed: i64,
    pub used: i64,
    pub remaining: i64,
    pub over_issued: bool,
}

impl StickerIssuance {
    pub fn new(labels_to_print: i64, total_printed: i64, used: i64) -> Self {
        Self {
            labels_to_print,
            total_printed,
            used,
            remaining: (labels_to_print - total_printed).max(0),
            over_issued: total_printed > labels_to_print,
        }
    }

    /// Issuance after `count` more stickers are printed
    pub fn after_issuing(&self, count: i64) -> Self {
        Self::new(self.labels_to_print, self.total_printed + count, self.used)
    }
}

/// Sticker over-issuance rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IssuancePolicy {
    /// Reject over-issuance unless the request explicitly allows it
    pub strict: bool,
}

impl IssuancePolicy {
    /// Check a request for `count` new stickers against the current issuance
    pub fn check(
        &self,
        current: &StickerIssuance,
        count: i64,
        allow_over_issue: bool,
    ) -> DomainResult<StickerIssuance> {
        if count <= 0 {
            return Err(DomainError::validation("count", "must be greater than zero", count));
        }
        let next = current.after_issuing(count);
        if next.over_issued && self.strict && !allow_over_issue {
            return Err(DomainError::conflict(
                "batchlabel",
                format!(
                    "issuing {} stickers would exceed the {} required (already printed {})",
                    count, current.labels_to_print, current.total_printed
                ),
            ));
        }
        Ok(next)
    }
}
