//! Inventory read models built from containers and their contents

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContainerType, StockLevel};

/// A content row seen together with its container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockEntry {
    pub content_id: Uuid,
    pub container_id: Uuid,
    pub container_code: String,
    pub container_type: ContainerType,
    pub stock_level: StockLevel,
    pub approved: bool,
    pub store_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub barcode: Option<String>,
    pub stocked_at: DateTime<Utc>,
}

/// Quantity of one product, split by approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductStock {
    pub product_id: Uuid,
    pub approved_quantity: Decimal,
    pub pending_quantity: Decimal,
}

impl ProductStock {
    pub fn on_hand(&self) -> Decimal {
        self.approved_quantity + self.pending_quantity
    }
}

/// Plant-wide container statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStatistics {
    pub empty: i64,
    pub partial: i64,
    pub full: i64,
    pub pending_approval: i64,
    pub products: Vec<ProductStock>,
}

impl InventoryStatistics {
    pub fn total_containers(&self) -> i64 {
        self.empty + self.partial + self.full
    }

    /// Fold a `(stock_level, approved, count)` breakdown into the counters
    pub fn add_level_count(&mut self, level: StockLevel, approved: bool, count: i64) {
        match level {
            StockLevel::Empty => self.empty += count,
            StockLevel::Partial => self.partial += count,
            StockLevel::Full => self.full += count,
        }
        if !approved {
            self.pending_approval += count;
        }
    }
}
