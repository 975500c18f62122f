//! Requisition models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::validation::validate_positive_quantity;

/// Approval gate state of a requisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    #[default]
    Waiting,
    Approved,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Waiting => "waiting",
            ApprovalState::Approved => "approved",
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalState::Approved)
    }
}

/// Fulfilment status of a requisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum RequisitionStatus {
    #[default]
    Open,
    Processing,
    Completed,
    Cancelled,
}

impl RequisitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequisitionStatus::Open => "open",
            RequisitionStatus::Processing => "processing",
            RequisitionStatus::Completed => "completed",
            RequisitionStatus::Cancelled => "cancelled",
        }
    }
}

/// A request to issue stock from a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Requisition {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub order_no: String,
    pub issued_date: NaiveDate,
    pub department: String,
    pub store_id: Uuid,
    pub status: RequisitionStatus,
    pub approved: ApprovalState,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Requisition {
    /// Approved requisitions are frozen
    pub fn ensure_mutable(&self) -> DomainResult<()> {
        if self.approved.is_approved() {
            return Err(DomainError::invalid_state(format!(
                "requisition {} is already approved",
                self.order_no
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RequisitionItem {
    pub id: Uuid,
    pub requisition_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
}

/// Requisition with its item lines
#[derive(Debug, Clone, Serialize)]
pub struct RequisitionWithItems {
    #[serde(flatten)]
    pub requisition: Requisition,
    pub items: Vec<RequisitionItem>,
}

/// Item line as submitted by a client, before it has an id
#[derive(Debug, Clone, PartialEq)]
pub struct RequisitionLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
}

/// Check a replacement item set: non-empty, every quantity positive and storable
pub fn validate_requisition_lines(lines: &[RequisitionLine]) -> DomainResult<()> {
    if lines.is_empty() {
        return Err(DomainError::missing("items", "at least one item is required"));
    }
    for (i, line) in lines.iter().enumerate() {
        validate_positive_quantity(&format!("items[{}].quantity", i), line.quantity)?;
    }
    Ok(())
}
