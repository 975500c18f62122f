//! Snapshots of master data the stock engine reads but does not own

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named place inside a store where containers are parked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StoreLocation {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub store_id: Uuid,
    pub code: String,
    pub name: String,
}

/// Production machine; its code is printed on stickers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Machine {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub code: String,
    pub name: String,
}
