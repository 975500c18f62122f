//! Sticker models, numbering and consumption rules
//!
//! Packet numbers form one sequence per batchlabel starting at 1. The barcode is
//! derived from the plant-unique batch number and the packet number, which keeps
//! barcodes unique within the plant without retrying on collision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Batchlabel;
use crate::error::{DomainError, DomainResult};
use crate::validation::validate_positive_quantity;

/// One printable label / packed unit of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sticker {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub batchlabel_id: Uuid,
    pub barcode: String,
    pub packet_no: i32,
    pub shift: String,
    pub supervisor: Option<String>,
    pub product_line: Option<String>,
    pub batch_no: String,
    pub machine_no: String,
    pub quantity: Decimal,
    pub print_count: i32,
    pub is_used: bool,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Sticker {
    /// A sticker is consumed into stock at most once
    pub fn ensure_consumable(&self) -> DomainResult<()> {
        if self.is_used {
            return Err(DomainError::conflict(
                "sticker",
                format!("sticker already consumed: {}", self.barcode),
            ));
        }
        Ok(())
    }
}

/// `{batch_no}-{packet_no:05}`
pub fn format_barcode(batch_no: &str, packet_no: i32) -> String {
    format!("{}-{:05}", batch_no, packet_no)
}

/// A sticker row ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewSticker {
    pub barcode: String,
    pub packet_no: i32,
    pub quantity: Decimal,
}

/// Lay out `count` new stickers after the batch's last packet number
///
/// `quantities` optionally overrides the per-sticker quantity; when non-empty it must
/// hold exactly `count` positive values. Otherwise each sticker carries the batch's
/// package quantity.
pub fn plan_stickers(
    batch: &Batchlabel,
    last_packet_no: Option<i32>,
    count: u32,
    quantities: &[Decimal],
) -> DomainResult<Vec<NewSticker>> {
    if count == 0 {
        return Err(DomainError::validation("count", "must be greater than zero", count));
    }
    if !quantities.is_empty() && quantities.len() != count as usize {
        return Err(DomainError::validation(
            "items",
            format!("expected {} items, got {}", count, quantities.len()),
            quantities.len(),
        ));
    }
    if quantities.is_empty() && batch.package_quantity <= Decimal::ZERO {
        return Err(DomainError::validation(
            "package_quantity",
            "batch has no package quantity; supply per-sticker quantities",
            batch.package_quantity,
        ));
    }

    let start = last_packet_no.unwrap_or(0);
    if start < 0 {
        return Err(DomainError::invalid_state(format!(
            "batch {} has a negative packet number",
            batch.batch_no
        )));
    }

    let mut planned = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let packet_no = start
            .checked_add(i as i32 + 1)
            .ok_or_else(|| DomainError::invalid_state("packet number overflow"))?;
        let quantity = quantities.get(i).copied().unwrap_or(batch.package_quantity);
        validate_positive_quantity(&format!("items[{}].quantity", i), quantity)?;
        planned.push(NewSticker {
            barcode: format_barcode(&batch.batch_no, packet_no),
            packet_no,
            quantity,
        });
    }
    Ok(planned)
}
