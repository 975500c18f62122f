//! Requisition service
//!
//! Items are a replace-set: an update deletes every existing item and inserts the new
//! list inside one transaction. There is no partial merge.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_code, validate_requisition_lines, DomainError, PaginatedResponse, Pagination,
    Requisition, RequisitionItem, RequisitionLine, RequisitionStatus, RequisitionWithItems,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::external::{MasterDataResolver, ReferenceValidator};
use crate::services::query::{fetch_page, RequisitionFilter, RequisitionSort, Sort};

pub(crate) const REQUISITION_COLUMNS: &str = "\
    id, plant_id, order_no, issued_date, department, store_id, status, approved, created_by, \
    created_at, updated_at";

/// Requisition service
#[derive(Clone)]
pub struct RequisitionService {
    db: PgPool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequisitionItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
}

/// Input for creating or fully updating a requisition
#[derive(Debug, Deserialize, Validate)]
pub struct RequisitionInput {
    #[validate(length(min = 1, max = 50))]
    pub order_no: String,
    pub issued_date: NaiveDate,
    #[validate(length(min = 1, max = 255))]
    pub department: String,
    pub store_id: Uuid,
    #[serde(default)]
    pub status: RequisitionStatus,
    pub items: Vec<RequisitionItemInput>,
}

impl RequisitionInput {
    fn lines(&self) -> Vec<RequisitionLine> {
        self.items
            .iter()
            .map(|item| RequisitionLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect()
    }
}

async fn replace_items(
    conn: &mut PgConnection,
    requisition_id: Uuid,
    lines: &[RequisitionLine],
) -> AppResult<Vec<RequisitionItem>> {
    sqlx::query("DELETE FROM requisition_items WHERE requisition_id = $1")
        .bind(requisition_id)
        .execute(&mut *conn)
        .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = sqlx::query_as::<_, RequisitionItem>(
            r#"
            INSERT INTO requisition_items (requisition_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, requisition_id, product_id, quantity
            "#,
        )
        .bind(requisition_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    Ok(items)
}

impl RequisitionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn validate_input(
        &self,
        plant_id: Uuid,
        input: &RequisitionInput,
    ) -> AppResult<Vec<RequisitionLine>> {
        input.validate()?;
        validate_code("order_no", &input.order_no)?;

        let lines = input.lines();
        validate_requisition_lines(&lines)?;

        let references =
            ReferenceValidator::new(MasterDataResolver::new(self.db.clone()), plant_id);
        references.store("store_id", input.store_id).await?;
        for (i, line) in lines.iter().enumerate() {
            references
                .product(&format!("items[{}].product_id", i), line.product_id)
                .await?;
        }
        Ok(lines)
    }

    async fn ensure_order_no_free(
        &self,
        plant_id: Uuid,
        order_no: &str,
        except: Option<Uuid>,
    ) -> AppResult<()> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM requisitions
                WHERE plant_id = $1 AND order_no = $2 AND id IS DISTINCT FROM $3
            )
            "#,
        )
        .bind(plant_id)
        .bind(order_no)
        .bind(except)
        .fetch_one(&self.db)
        .await?;

        if taken {
            return Err(DomainError::conflict(
                "requisition",
                format!("order number '{}' already exists", order_no),
            )
            .into());
        }
        Ok(())
    }

    /// Create a requisition waiting for approval
    pub async fn create(
        &self,
        plant_id: Uuid,
        user_id: Uuid,
        input: RequisitionInput,
    ) -> AppResult<RequisitionWithItems> {
        let lines = self.validate_input(plant_id, &input).await?;
        self.ensure_order_no_free(plant_id, &input.order_no, None).await?;

        let mut tx = self.db.begin().await?;

        let requisition = sqlx::query_as::<_, Requisition>(&format!(
            r#"
            INSERT INTO requisitions
                (plant_id, order_no, issued_date, department, store_id, status, approved,
                 created_by)
            VALUES ($1, $2, $3, $4, $5, $6, 'waiting', $7)
            RETURNING {}
            "#,
            REQUISITION_COLUMNS
        ))
        .bind(plant_id)
        .bind(&input.order_no)
        .bind(input.issued_date)
        .bind(&input.department)
        .bind(input.store_id)
        .bind(input.status.as_str())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let items = replace_items(&mut tx, requisition.id, &lines).await?;

        tx.commit().await?;

        tracing::info!(
            plant_id = %plant_id,
            order_no = %requisition.order_no,
            items = items.len(),
            "requisition created"
        );

        Ok(RequisitionWithItems { requisition, items })
    }

    /// Patch the header and replace the item set
    pub async fn update(
        &self,
        plant_id: Uuid,
        id: Uuid,
        input: RequisitionInput,
    ) -> AppResult<RequisitionWithItems> {
        let lines = self.validate_input(plant_id, &input).await?;
        self.ensure_order_no_free(plant_id, &input.order_no, Some(id)).await?;

        let mut tx = self.db.begin().await?;

        let existing = lock(&mut tx, plant_id, id).await?;
        existing.ensure_mutable()?;

        let requisition = sqlx::query_as::<_, Requisition>(&format!(
            r#"
            UPDATE requisitions
            SET order_no = $2, issued_date = $3, department = $4, store_id = $5, status = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            REQUISITION_COLUMNS
        ))
        .bind(existing.id)
        .bind(&input.order_no)
        .bind(input.issued_date)
        .bind(&input.department)
        .bind(input.store_id)
        .bind(input.status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let items = replace_items(&mut tx, requisition.id, &lines).await?;

        tx.commit().await?;

        Ok(RequisitionWithItems { requisition, items })
    }

    pub async fn get(&self, plant_id: Uuid, id: Uuid) -> AppResult<RequisitionWithItems> {
        let requisition = sqlx::query_as::<_, Requisition>(&format!(
            "SELECT {} FROM requisitions WHERE plant_id = $1 AND id = $2",
            REQUISITION_COLUMNS
        ))
        .bind(plant_id)
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("requisition", id))?;

        let items = sqlx::query_as::<_, RequisitionItem>(
            r#"
            SELECT id, requisition_id, product_id, quantity FROM requisition_items
            WHERE requisition_id = $1
            ORDER BY id
            "#,
        )
        .bind(requisition.id)
        .fetch_all(&self.db)
        .await?;

        Ok(RequisitionWithItems { requisition, items })
    }

    pub async fn list(
        &self,
        plant_id: Uuid,
        filter: RequisitionFilter,
        sort: Sort<RequisitionSort>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Requisition>> {
        let (data, total) =
            fetch_page(&self.db, "requisitions", plant_id, &filter, sort, &pagination).await?;
        Ok(PaginatedResponse::new(data, &pagination, total))
    }

    /// Delete a requisition and its items; approved requisitions are kept
    pub async fn delete(&self, plant_id: Uuid, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let existing = lock(&mut tx, plant_id, id).await?;
        existing.ensure_mutable()?;

        sqlx::query("DELETE FROM requisition_items WHERE requisition_id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM requisitions WHERE id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(plant_id = %plant_id, order_no = %existing.order_no, "requisition deleted");
        Ok(())
    }
}

async fn lock(conn: &mut PgConnection, plant_id: Uuid, id: Uuid) -> AppResult<Requisition> {
    sqlx::query_as::<_, Requisition>(&format!(
        "SELECT {} FROM requisitions WHERE plant_id = $1 AND id = $2 FOR UPDATE",
        REQUISITION_COLUMNS
    ))
    .bind(plant_id)
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DomainError::not_found("requisition", id).into())
}
