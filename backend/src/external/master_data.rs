//! Master-data lookups
//!
//! Products, stores, customers, machines, job orders and store locations are owned
//! by the administrative CRUD layer. The stock engine only needs to know whether a
//! reference exists inside the caller's plant, so every lookup here is a narrow,
//! plant-scoped read.

use shared::{DomainError, Machine, StoreLocation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Clone)]
pub struct MasterDataResolver {
    db: PgPool,
}

impl MasterDataResolver {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn exists(&self, sql: &str, plant_id: Uuid, id: Uuid) -> AppResult<bool> {
        let found = sqlx::query_scalar::<_, bool>(sql)
            .bind(id)
            .bind(plant_id)
            .fetch_one(&self.db)
            .await?;
        Ok(found)
    }

    pub async fn product_exists(&self, plant_id: Uuid, id: Uuid) -> AppResult<bool> {
        self.exists(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND plant_id = $2)",
            plant_id,
            id,
        )
        .await
    }

    pub async fn store_exists(&self, plant_id: Uuid, id: Uuid) -> AppResult<bool> {
        self.exists(
            "SELECT EXISTS(SELECT 1 FROM stores WHERE id = $1 AND plant_id = $2)",
            plant_id,
            id,
        )
        .await
    }

    pub async fn customer_exists(&self, plant_id: Uuid, id: Uuid) -> AppResult<bool> {
        self.exists(
            "SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1 AND plant_id = $2)",
            plant_id,
            id,
        )
        .await
    }

    pub async fn job_order_exists(&self, plant_id: Uuid, id: Uuid) -> AppResult<bool> {
        self.exists(
            "SELECT EXISTS(SELECT 1 FROM job_orders WHERE id = $1 AND plant_id = $2)",
            plant_id,
            id,
        )
        .await
    }

    /// Whether the line item exists and belongs to the given job order
    pub async fn job_order_item_exists(
        &self,
        plant_id: Uuid,
        job_order_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<bool> {
        let found = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM job_order_items joi
                JOIN job_orders jo ON jo.id = joi.job_order_id
                WHERE joi.id = $1 AND joi.job_order_id = $2 AND jo.plant_id = $3
            )
            "#,
        )
        .bind(item_id)
        .bind(job_order_id)
        .bind(plant_id)
        .fetch_one(&self.db)
        .await?;
        Ok(found)
    }

    pub async fn machine(&self, plant_id: Uuid, id: Uuid) -> AppResult<Option<Machine>> {
        let machine = sqlx::query_as::<_, Machine>(
            "SELECT id, plant_id, code, name FROM machines WHERE id = $1 AND plant_id = $2",
        )
        .bind(id)
        .bind(plant_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(machine)
    }

    pub async fn store_location_by_code(
        &self,
        plant_id: Uuid,
        code: &str,
    ) -> AppResult<Option<StoreLocation>> {
        let location = sqlx::query_as::<_, StoreLocation>(
            r#"
            SELECT id, plant_id, store_id, code, name FROM store_locations
            WHERE code = $1 AND plant_id = $2
            "#,
        )
        .bind(code)
        .bind(plant_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(location)
    }

    pub async fn store_location(
        &self,
        plant_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<StoreLocation>> {
        let location = sqlx::query_as::<_, StoreLocation>(
            r#"
            SELECT id, plant_id, store_id, code, name FROM store_locations
            WHERE id = $1 AND plant_id = $2
            "#,
        )
        .bind(id)
        .bind(plant_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(location)
    }

    /// Stores in the plant for which `user_id` is a registered approver
    pub async fn stores_approvable_by(
        &self,
        plant_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        let stores = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT sa.store_id FROM store_approvers sa
            JOIN stores s ON s.id = sa.store_id
            WHERE sa.user_id = $1 AND s.plant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(plant_id)
        .fetch_all(&self.db)
        .await?;
        Ok(stores)
    }
}

/// Reference checks run before a write, each failing with a validation error naming the field
///
/// Built explicitly by each service that needs it rather than shared through global state.
#[derive(Clone)]
pub struct ReferenceValidator {
    resolver: MasterDataResolver,
    plant_id: Uuid,
}

impl ReferenceValidator {
    pub fn new(resolver: MasterDataResolver, plant_id: Uuid) -> Self {
        Self { resolver, plant_id }
    }

    fn check(found: bool, field: &str, what: &str, id: Uuid) -> AppResult<()> {
        if found {
            Ok(())
        } else {
            Err(DomainError::validation(field, format!("{} not exists", what), id).into())
        }
    }

    pub async fn product(&self, field: &str, id: Uuid) -> AppResult<()> {
        let found = self.resolver.product_exists(self.plant_id, id).await?;
        Self::check(found, field, "product", id)
    }

    pub async fn store(&self, field: &str, id: Uuid) -> AppResult<()> {
        let found = self.resolver.store_exists(self.plant_id, id).await?;
        Self::check(found, field, "store", id)
    }

    pub async fn customer(&self, field: &str, id: Uuid) -> AppResult<()> {
        let found = self.resolver.customer_exists(self.plant_id, id).await?;
        Self::check(found, field, "customer", id)
    }

    pub async fn machine(&self, field: &str, id: Uuid) -> AppResult<Machine> {
        self.resolver
            .machine(self.plant_id, id)
            .await?
            .ok_or_else(|| DomainError::validation(field, "machine not exists", id).into())
    }

    /// Job order, and when given, that the line item belongs to it
    pub async fn job_order(&self, job_order_id: Uuid, item_id: Option<Uuid>) -> AppResult<()> {
        let found = self.resolver.job_order_exists(self.plant_id, job_order_id).await?;
        Self::check(found, "job_order_id", "job order", job_order_id)?;

        if let Some(item_id) = item_id {
            let found = self
                .resolver
                .job_order_item_exists(self.plant_id, job_order_id, item_id)
                .await?;
            Self::check(found, "job_order_item_id", "job order item", item_id)?;
        }
        Ok(())
    }
}
