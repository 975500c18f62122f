//! Inventory read models over containers and their contents

use serde::Deserialize;
use shared::{InventoryStatistics, ProductStock, StockEntry, StockLevel};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppResult;

/// Inventory service
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Filter for stock listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockFilter {
    pub product_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub container_code: Option<String>,
    #[serde(default)]
    pub approved_only: bool,
}

#[derive(Debug, FromRow)]
struct LevelCount {
    stock_level: StockLevel,
    approved: bool,
    count: i64,
}

fn stock_query<'args>(plant_id: Uuid, filter: &StockFilter) -> QueryBuilder<'args, Postgres> {
    let mut qb = QueryBuilder::new(
        r#"
        SELECT cc.id AS content_id, c.id AS container_id, c.code AS container_code,
               c.container_type, c.stock_level, c.approved, c.store_id, c.location_id,
               cc.product_id, cc.quantity, cc.barcode, cc.created_at AS stocked_at
        FROM container_contents cc
        JOIN containers c ON c.id = cc.container_id
        WHERE cc.plant_id = "#,
    );
    qb.push_bind(plant_id);

    if let Some(product_id) = filter.product_id {
        qb.push(" AND cc.product_id = ").push_bind(product_id);
    }
    if let Some(store_id) = filter.store_id {
        qb.push(" AND c.store_id = ").push_bind(store_id);
    }
    if let Some(code) = &filter.container_code {
        qb.push(" AND c.code = ").push_bind(code.clone());
    }
    if filter.approved_only {
        qb.push(" AND c.approved");
    }
    qb.push(" ORDER BY c.code, cc.created_at");
    qb
}

impl InventoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Content rows with their container's state
    pub async fn stock(&self, plant_id: Uuid, filter: StockFilter) -> AppResult<Vec<StockEntry>> {
        let mut qb = stock_query(plant_id, &filter);
        let entries = qb.build_query_as::<StockEntry>().fetch_all(&self.db).await?;
        Ok(entries)
    }

    /// Container counts per stock level and quantity on hand per product
    pub async fn statistics(&self, plant_id: Uuid) -> AppResult<InventoryStatistics> {
        let counts = sqlx::query_as::<_, LevelCount>(
            r#"
            SELECT stock_level, approved, COUNT(*) AS count
            FROM containers
            WHERE plant_id = $1
            GROUP BY stock_level, approved
            "#,
        )
        .bind(plant_id)
        .fetch_all(&self.db)
        .await?;

        let products = sqlx::query_as::<_, ProductStock>(
            r#"
            SELECT cc.product_id,
                   COALESCE(SUM(cc.quantity) FILTER (WHERE c.approved), 0) AS approved_quantity,
                   COALESCE(SUM(cc.quantity) FILTER (WHERE NOT c.approved), 0) AS pending_quantity
            FROM container_contents cc
            JOIN containers c ON c.id = cc.container_id
            WHERE cc.plant_id = $1
            GROUP BY cc.product_id
            ORDER BY cc.product_id
            "#,
        )
        .bind(plant_id)
        .fetch_all(&self.db)
        .await?;

        let mut stats = InventoryStatistics {
            products,
            ..Default::default()
        };
        for row in counts {
            stats.add_level_count(row.stock_level, row.approved, row.count);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_query_is_plant_scoped() {
        let qb = stock_query(Uuid::nil(), &StockFilter::default());
        assert!(qb.sql().contains("WHERE cc.plant_id = $1 ORDER BY"));
    }

    #[test]
    fn test_stock_query_approved_only() {
        let filter = StockFilter {
            product_id: Some(Uuid::new_v4()),
            approved_only: true,
            ..Default::default()
        };
        let qb = stock_query(Uuid::nil(), &filter);
        assert!(qb
            .sql()
            .contains("AND cc.product_id = $2 AND c.approved ORDER BY"));
    }
}
