//! Container and container content models
//!
//! A container (pallet or bin) moves through `EMPTY -> FULL -> PARTIAL -> EMPTY`
//! as stock is received and released. Any stock-changing transition leaves the
//! container pending approval; an empty container is always approved.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreLocation;
use crate::error::{DomainError, DomainResult};
use crate::validation::validate_positive_quantity;

/// Physical container kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerType {
    Pallet,
    Bin,
}

impl ContainerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Pallet => "pallet",
            ContainerType::Bin => "bin",
        }
    }
}

/// How much stock a container currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockLevel {
    Empty,
    Partial,
    Full,
}

impl StockLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockLevel::Empty => "empty",
            StockLevel::Partial => "partial",
            StockLevel::Full => "full",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, StockLevel::Empty)
    }
}

impl std::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pallet or bin tracked within a plant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Container {
    pub id: Uuid,
    pub plant_id: Uuid,
    #[serde(rename = "type")]
    pub container_type: ContainerType,
    /// Unique per plant
    pub code: String,
    /// Unique per plant
    pub name: String,
    pub address: Option<String>,
    pub enabled: bool,
    pub stock_level: StockLevel,
    pub approved: bool,
    pub product_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Container {
    pub fn state(&self) -> ContainerState {
        ContainerState {
            stock_level: self.stock_level,
            approved: self.approved,
        }
    }

    /// Stock-in is only accepted by an enabled, empty container
    pub fn ensure_accepts_stock_in(&self) -> DomainResult<()> {
        if !self.enabled {
            return Err(DomainError::invalid_state(format!(
                "container {} is disabled",
                self.code
            )));
        }
        if !self.stock_level.is_empty() {
            return Err(DomainError::conflict("container", "container not empty"));
        }
        Ok(())
    }
}

/// One product line held by a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ContainerContent {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub container_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub barcode: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Container with its contents and current location
#[derive(Debug, Clone, Serialize)]
pub struct ContainerDetail {
    #[serde(flatten)]
    pub container: Container,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<ContainerContent>>,
    pub location: Option<StoreLocation>,
}

/// The two fields the stock lifecycle state machine governs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub stock_level: StockLevel,
    pub approved: bool,
}

/// Events that move a container between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerTransition {
    /// Content recorded by a stock-in
    StockIn,
    /// Verification by an approver
    Approve,
    /// Close a partially loaded container
    MarkFull,
    /// Content released; carries how many content rows remain afterwards
    Unload { remaining_rows: usize },
}

impl ContainerState {
    /// State of a freshly created container
    pub const fn initial() -> Self {
        Self {
            stock_level: StockLevel::Empty,
            approved: true,
        }
    }

    /// `EMPTY` implies approved
    pub fn is_consistent(&self) -> bool {
        !self.stock_level.is_empty() || self.approved
    }

    pub fn apply(self, transition: ContainerTransition) -> DomainResult<ContainerState> {
        match transition {
            ContainerTransition::StockIn => {
                if !self.stock_level.is_empty() {
                    return Err(DomainError::conflict("container", "container not empty"));
                }
                Ok(ContainerState {
                    stock_level: StockLevel::Full,
                    approved: false,
                })
            }
            // Approving is idempotent; an empty container is already approved.
            ContainerTransition::Approve => Ok(ContainerState {
                stock_level: self.stock_level,
                approved: true,
            }),
            ContainerTransition::MarkFull => {
                if self.stock_level.is_empty() {
                    return Err(DomainError::invalid_state(
                        "cannot mark an empty container full",
                    ));
                }
                Ok(ContainerState {
                    stock_level: StockLevel::Full,
                    approved: self.approved,
                })
            }
            ContainerTransition::Unload { remaining_rows } => {
                if self.stock_level.is_empty() {
                    return Err(DomainError::invalid_state(
                        "cannot unload an empty container",
                    ));
                }
                if remaining_rows == 0 {
                    Ok(ContainerState::initial())
                } else {
                    Ok(ContainerState {
                        stock_level: StockLevel::Partial,
                        approved: false,
                    })
                }
            }
        }
    }
}

/// Outcome of releasing stock from one content row
#[derive(Debug, Clone, PartialEq)]
pub struct UnloadPlan {
    pub content_id: Uuid,
    /// Quantity left on the row; zero means the row is deleted
    pub remaining_quantity: Decimal,
    pub next_state: ContainerState,
}

impl UnloadPlan {
    pub fn deletes_row(&self) -> bool {
        self.remaining_quantity.is_zero()
    }

    /// Whether the container loses its product/store association
    pub fn clears_container(&self) -> bool {
        self.next_state.stock_level.is_empty()
    }
}

/// Plan the release of `quantity` from `content`, given every content row of the container
pub fn plan_unload(
    container: &Container,
    contents: &[ContainerContent],
    content_id: Uuid,
    quantity: Decimal,
) -> DomainResult<UnloadPlan> {
    if container.stock_level.is_empty() {
        return Err(DomainError::invalid_state("cannot unload an empty container"));
    }
    validate_positive_quantity("quantity", quantity)?;
    let content = contents
        .iter()
        .find(|c| c.id == content_id && c.container_id == container.id)
        .ok_or_else(|| DomainError::not_found("container content", content_id))?;

    if quantity > content.quantity {
        return Err(DomainError::validation(
            "quantity",
            format!("exceeds the {} held by the content row", content.quantity),
            quantity,
        ));
    }

    let remaining_quantity = content.quantity - quantity;
    let remaining_rows = contents.len() - usize::from(remaining_quantity.is_zero());
    let next_state = container
        .state()
        .apply(ContainerTransition::Unload { remaining_rows })?;

    Ok(UnloadPlan {
        content_id,
        remaining_quantity,
        next_state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(stock_level: StockLevel, approved: bool) -> Container {
        Container {
            id: Uuid::new_v4(),
            plant_id: Uuid::new_v4(),
            container_type: ContainerType::Pallet,
            code: "PAL-001".into(),
            name: "PAL-001".into(),
            address: None,
            enabled: true,
            stock_level,
            approved,
            product_id: None,
            store_id: None,
            location_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn content(container: &Container, quantity: i64) -> ContainerContent {
        ContainerContent {
            id: Uuid::new_v4(),
            plant_id: container.plant_id,
            container_id: container.id,
            product_id: Uuid::new_v4(),
            quantity: Decimal::from(quantity),
            barcode: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_initial_state_is_empty_and_approved() {
        let s = ContainerState::initial();
        assert_eq!(s.stock_level, StockLevel::Empty);
        assert!(s.approved);
        assert!(s.is_consistent());
    }

    #[test]
    fn test_stock_in_fills_and_unapproves() {
        let s = ContainerState::initial().apply(ContainerTransition::StockIn).unwrap();
        assert_eq!(s.stock_level, StockLevel::Full);
        assert!(!s.approved);
    }

    #[test]
    fn test_stock_in_rejected_when_not_empty() {
        let full = ContainerState { stock_level: StockLevel::Full, approved: true };
        let err = full.apply(ContainerTransition::StockIn).unwrap_err();
        assert_eq!(err, DomainError::conflict("container", "container not empty"));
    }

    #[test]
    fn test_approve_is_idempotent() {
        let pending = ContainerState { stock_level: StockLevel::Full, approved: false };
        let once = pending.apply(ContainerTransition::Approve).unwrap();
        let twice = once.apply(ContainerTransition::Approve).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.stock_level, StockLevel::Full);
    }

    #[test]
    fn test_mark_full_on_empty_fails() {
        let err = ContainerState::initial()
            .apply(ContainerTransition::MarkFull)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn test_mark_full_keeps_approval() {
        let partial = ContainerState { stock_level: StockLevel::Partial, approved: false };
        let s = partial.apply(ContainerTransition::MarkFull).unwrap();
        assert_eq!(s, ContainerState { stock_level: StockLevel::Full, approved: false });
    }

    #[test]
    fn test_disabled_container_rejects_stock_in() {
        let mut c = container(StockLevel::Empty, true);
        c.enabled = false;
        assert!(matches!(c.ensure_accepts_stock_in(), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_unload_partial_then_empty() {
        let c = container(StockLevel::Full, true);
        let rows = vec![content(&c, 50)];

        let plan = plan_unload(&c, &rows, rows[0].id, Decimal::from(20)).unwrap();
        assert_eq!(plan.remaining_quantity, Decimal::from(30));
        assert_eq!(plan.next_state.stock_level, StockLevel::Partial);
        assert!(!plan.deletes_row());

        let plan = plan_unload(&c, &rows, rows[0].id, Decimal::from(50)).unwrap();
        assert!(plan.deletes_row());
        assert!(plan.clears_container());
        assert_eq!(plan.next_state, ContainerState::initial());
    }

    #[test]
    fn test_unload_more_than_held_fails() {
        let c = container(StockLevel::Full, false);
        let rows = vec![content(&c, 5)];
        let err = plan_unload(&c, &rows, rows[0].id, Decimal::from(6)).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "quantity"));
    }

    #[test]
    fn test_unload_empty_container_is_invalid_state() {
        let c = container(StockLevel::Empty, true);
        let err = plan_unload(&c, &[], Uuid::new_v4(), Decimal::ONE).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn test_unload_unknown_row() {
        let c = container(StockLevel::Full, false);
        let rows = vec![content(&c, 5)];
        let err = plan_unload(&c, &rows, Uuid::new_v4(), Decimal::ONE).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
