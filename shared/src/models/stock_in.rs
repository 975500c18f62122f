//! Stock-in planning
//!
//! Every business rule of a stock-in is checked here, against rows the caller has
//! already read under lock, before anything is written. The backend then applies
//! the resulting plan inside the same database transaction.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Container, ContainerState, ContainerTransition, ContainerType, Sticker};
use crate::error::{DomainError, DomainResult};
use crate::validation::{validate_barcode_list, validate_code, validate_positive_quantity};

/// Where the content goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetContainer {
    /// An existing, locked, empty container
    Existing(Uuid),
    /// No container with this code yet; create it empty, then load it
    Create {
        code: String,
        name: String,
        container_type: ContainerType,
    },
}

/// One content row to insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub barcode: Option<String>,
}

/// Validated stock-in, ready to apply
#[derive(Debug, Clone, PartialEq)]
pub struct StockInPlan {
    pub target: TargetContainer,
    pub lines: Vec<ContentLine>,
    /// Product recorded on the container
    pub product_id: Uuid,
    /// Stickers to mark used
    pub consumed_stickers: Vec<Uuid>,
    pub next_state: ContainerState,
}

fn resolve_target(
    existing: Option<&Container>,
    code: &str,
    default_type: ContainerType,
) -> DomainResult<(TargetContainer, ContainerState)> {
    validate_code("container_code", code)?;
    match existing {
        Some(container) => {
            if container.code != code {
                return Err(DomainError::not_found("container", code));
            }
            container.ensure_accepts_stock_in()?;
            let next = container.state().apply(ContainerTransition::StockIn)?;
            Ok((TargetContainer::Existing(container.id), next))
        }
        None => {
            let next = ContainerState::initial().apply(ContainerTransition::StockIn)?;
            Ok((
                TargetContainer::Create {
                    code: code.to_string(),
                    name: code.to_string(),
                    container_type: default_type,
                },
                next,
            ))
        }
    }
}

/// Adopt the container a concurrent stock-in created first
///
/// `locked` is the row read under lock after the insert found the code taken. It
/// must still accept stock-in; the other request may already have loaded it.
pub fn adopt_raced_container(code: &str, locked: Option<Container>) -> DomainResult<Container> {
    let container = locked.ok_or_else(|| DomainError::not_found("container", code))?;
    container.ensure_accepts_stock_in()?;
    Ok(container)
}

/// Check that a container auto-created under `code` can also take `name`
///
/// `name_holder` is the code of the container already using that name, if any.
pub fn check_auto_create_name(
    code: &str,
    name: &str,
    name_holder: Option<&str>,
) -> DomainResult<()> {
    match name_holder {
        Some(holder) if holder != code => Err(DomainError::conflict(
            "container",
            format!("container name {} is already used by container {}", name, holder),
        )),
        _ => Ok(()),
    }
}

/// Raw material: one product line into an empty (or new) container
pub fn plan_raw_material(
    existing: Option<&Container>,
    container_code: &str,
    default_type: ContainerType,
    product_id: Uuid,
    quantity: Decimal,
    batch_no: &str,
) -> DomainResult<StockInPlan> {
    validate_positive_quantity("quantity", quantity)?;
    validate_code("batch_no", batch_no)?;
    let (target, next_state) = resolve_target(existing, container_code, default_type)?;

    Ok(StockInPlan {
        target,
        lines: vec![ContentLine {
            product_id,
            quantity,
            barcode: Some(batch_no.to_string()),
        }],
        product_id,
        consumed_stickers: Vec::new(),
        next_state,
    })
}

/// Finished goods: consume every sticker or none
///
/// `stickers` are the plant's rows matching `barcodes`, read under lock. A barcode
/// with no row is `NotFound`; a used sticker is a `Conflict`. Either fails the
/// whole plan.
pub fn plan_finished_goods(
    existing: Option<&Container>,
    container_code: &str,
    default_type: ContainerType,
    barcodes: &[String],
    stickers: &[Sticker],
) -> DomainResult<StockInPlan> {
    validate_barcode_list("barcodes", barcodes)?;

    let by_barcode: HashMap<&str, &Sticker> =
        stickers.iter().map(|s| (s.barcode.as_str(), s)).collect();

    let mut lines = Vec::with_capacity(barcodes.len());
    let mut consumed = Vec::with_capacity(barcodes.len());
    for barcode in barcodes {
        let sticker = by_barcode
            .get(barcode.as_str())
            .ok_or_else(|| DomainError::not_found("sticker", barcode))?;
        sticker.ensure_consumable()?;
        lines.push(ContentLine {
            product_id: sticker.product_id,
            quantity: sticker.quantity,
            barcode: Some(sticker.barcode.clone()),
        });
        consumed.push(sticker.id);
    }

    let (target, next_state) = resolve_target(existing, container_code, default_type)?;

    Ok(StockInPlan {
        target,
        product_id: lines[0].product_id,
        lines,
        consumed_stickers: consumed,
        next_state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{format_barcode, StockLevel};
    use chrono::Utc;

    fn empty_container(code: &str) -> Container {
        Container {
            id: Uuid::new_v4(),
            plant_id: Uuid::new_v4(),
            container_type: ContainerType::Bin,
            code: code.into(),
            name: code.into(),
            address: None,
            enabled: true,
            stock_level: StockLevel::Empty,
            approved: true,
            product_id: None,
            store_id: None,
            location_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sticker(packet_no: i32, is_used: bool) -> Sticker {
        Sticker {
            id: Uuid::new_v4(),
            plant_id: Uuid::nil(),
            batchlabel_id: Uuid::nil(),
            barcode: format_barcode("B1", packet_no),
            packet_no,
            shift: "A".into(),
            supervisor: None,
            product_line: None,
            batch_no: "B1".into(),
            machine_no: "M1".into(),
            quantity: Decimal::from(25),
            print_count: 1,
            is_used,
            product_id: Uuid::nil(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_raw_material_creates_missing_container() {
        let product = Uuid::new_v4();
        let plan = plan_raw_material(
            None,
            "PAL-001",
            ContainerType::Pallet,
            product,
            Decimal::from(50),
            "RM-1",
        )
        .unwrap();
        assert_eq!(
            plan.target,
            TargetContainer::Create {
                code: "PAL-001".into(),
                name: "PAL-001".into(),
                container_type: ContainerType::Pallet,
            }
        );
        assert_eq!(plan.next_state.stock_level, StockLevel::Full);
        assert!(!plan.next_state.approved);
        assert_eq!(plan.lines.len(), 1);
    }

    #[test]
    fn test_raw_material_rejects_loaded_container() {
        let mut c = empty_container("PAL-001");
        c.stock_level = StockLevel::Full;
        let err = plan_raw_material(
            Some(&c),
            "PAL-001",
            ContainerType::Pallet,
            Uuid::new_v4(),
            Decimal::ONE,
            "RM-1",
        )
        .unwrap_err();
        assert_eq!(err, DomainError::conflict("container", "container not empty"));
    }

    #[test]
    fn test_raw_material_rejects_zero_quantity() {
        let c = empty_container("PAL-001");
        let result = plan_raw_material(
            Some(&c),
            "PAL-001",
            ContainerType::Pallet,
            Uuid::new_v4(),
            Decimal::ZERO,
            "RM-1",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_finished_goods_all_or_nothing() {
        let stickers = vec![sticker(1, false), sticker(2, false), sticker(3, true)];
        let barcodes: Vec<String> = stickers.iter().map(|s| s.barcode.clone()).collect();
        let c = empty_container("BIN-1");
        let err = plan_finished_goods(Some(&c), "BIN-1", ContainerType::Bin, &barcodes, &stickers)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[test]
    fn test_finished_goods_unknown_barcode() {
        let stickers = vec![sticker(1, false)];
        let barcodes = vec![stickers[0].barcode.clone(), "B1-00099".to_string()];
        let err = plan_finished_goods(None, "BIN-1", ContainerType::Bin, &barcodes, &stickers)
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("sticker", "B1-00099"));
    }

    #[test]
    fn test_finished_goods_consumes_each_sticker() {
        let stickers = vec![sticker(1, false), sticker(2, false)];
        let barcodes: Vec<String> = stickers.iter().map(|s| s.barcode.clone()).collect();
        let plan =
            plan_finished_goods(None, "BIN-1", ContainerType::Bin, &barcodes, &stickers).unwrap();
        assert_eq!(plan.consumed_stickers, vec![stickers[0].id, stickers[1].id]);
        assert_eq!(plan.lines[1].barcode.as_deref(), Some("B1-00002"));
        assert!(matches!(
            plan.target,
            TargetContainer::Create { container_type: ContainerType::Bin, .. }
        ));
    }
}
